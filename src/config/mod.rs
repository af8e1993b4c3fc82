use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

/// Application configuration, built once at process start and shared through
/// `AppState`. Nothing below the binary reads the process environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub providers: ProviderConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Externally reachable origin, used to build OAuth redirect URIs
    pub public_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection URL; `None` selects the in-memory store
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    /// Marks the session cookie `Secure`
    pub require_https: bool,
    #[serde(skip_serializing)]
    pub session_secret: String,
    pub session_max_age_days: i64,
    pub oauth_state_ttl_secs: i64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Applied to every outbound provider request
    pub timeout_secs: u64,
    pub aggregate_post_limit: u32,
    pub facebook: FacebookConfig,
    pub azure_ad: AzureAdConfig,
    pub powerbi: PowerBiConfig,
    pub ads: AdsConfig,
    pub archive: ArchiveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub graph_url: String,
    pub auth_url: String,
    pub scope: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureAdConfig {
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub tenant_id: String,
    pub login_url: String,
    pub graph_url: String,
    pub scope: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerBiConfig {
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub tenant_id: String,
    pub login_url: String,
    pub scope: String,
    pub api_url: String,
    pub group_id: String,
    pub report_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdsConfig {
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub container_url: Option<String>,
    #[serde(skip_serializing)]
    pub sas_token: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an explicit key/value map (tests, embedded use)
    pub fn from_map(values: &HashMap<String, String>) -> Self {
        Self::from_lookup(|key| values.get(key).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(&lookup)
    }

    fn with_overrides<F>(mut self, lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(v) = lookup("APP_PORT").or_else(|| lookup("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Some(v) = lookup("PUBLIC_BASE_URL") {
            self.server.public_base_url = v.trim_end_matches('/').to_string();
        }

        // Database overrides
        if let Some(v) = lookup("DATABASE_URL") {
            self.database.url = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Security overrides
        if let Some(v) = lookup("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Some(v) = lookup("SECURITY_REQUIRE_HTTPS") {
            self.security.require_https = v.parse().unwrap_or(self.security.require_https);
        }
        if let Some(v) = lookup("SESSION_SECRET") {
            self.security.session_secret = v;
        }
        if let Some(v) = lookup("SESSION_MAX_AGE_DAYS") {
            self.security.session_max_age_days = v.parse().unwrap_or(self.security.session_max_age_days);
        }
        if let Some(v) = lookup("BCRYPT_COST") {
            // Never go below cost 10
            self.security.bcrypt_cost = v.parse().unwrap_or(self.security.bcrypt_cost).max(10);
        }

        // Provider overrides
        let p = &mut self.providers;
        if let Some(v) = lookup("PROVIDER_TIMEOUT_SECS") {
            p.timeout_secs = v.parse().unwrap_or(p.timeout_secs);
        }
        if let Some(v) = lookup("AGGREGATE_POST_LIMIT") {
            p.aggregate_post_limit = v.parse().unwrap_or(p.aggregate_post_limit);
        }

        set_string(lookup, "FACEBOOK_CLIENT_ID", &mut p.facebook.client_id);
        set_string(lookup, "FACEBOOK_CLIENT_SECRET", &mut p.facebook.client_secret);
        set_url(lookup, "FACEBOOK_GRAPH_URL", &mut p.facebook.graph_url);
        set_url(lookup, "FACEBOOK_AUTH_URL", &mut p.facebook.auth_url);

        set_string(lookup, "AZURE_AD_CLIENT_ID", &mut p.azure_ad.client_id);
        set_string(lookup, "AZURE_AD_CLIENT_SECRET", &mut p.azure_ad.client_secret);
        set_string(lookup, "AZURE_AD_TENANT_ID", &mut p.azure_ad.tenant_id);
        set_url(lookup, "AZURE_AD_LOGIN_URL", &mut p.azure_ad.login_url);
        set_url(lookup, "AZURE_AD_GRAPH_URL", &mut p.azure_ad.graph_url);

        set_string(lookup, "POWERBI_CLIENT_ID", &mut p.powerbi.client_id);
        set_string(lookup, "POWERBI_CLIENT_SECRET", &mut p.powerbi.client_secret);
        set_string(lookup, "POWERBI_TENANT_ID", &mut p.powerbi.tenant_id);
        set_string(lookup, "POWERBI_SCOPE", &mut p.powerbi.scope);
        set_string(lookup, "POWERBI_GROUP_ID", &mut p.powerbi.group_id);
        set_string(lookup, "POWERBI_REPORT_ID", &mut p.powerbi.report_id);
        set_url(lookup, "POWERBI_API_URL", &mut p.powerbi.api_url);
        // Service tokens come from the same AAD authority unless told otherwise
        p.powerbi.login_url = p.azure_ad.login_url.clone();
        set_url(lookup, "POWERBI_LOGIN_URL", &mut p.powerbi.login_url);

        if let Some(v) = lookup("FACEBOOK_ADS_ACCESS_TOKEN") {
            p.ads.access_token = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("ARCHIVE_CONTAINER_URL") {
            p.archive.container_url = Some(v.trim_end_matches('/').to_string()).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("ARCHIVE_SAS_TOKEN") {
            p.archive.sas_token = Some(v.trim_start_matches('?').to_string()).filter(|s| !s.is_empty());
        }

        self
    }

    /// Reject configurations that must not reach a running server
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.session_secret.is_empty() {
            return Err(ConfigError::Missing("SESSION_SECRET"));
        }
        if self.security.session_secret.len() < 32 && self.environment == Environment::Production {
            return Err(ConfigError::Invalid {
                key: "SESSION_SECRET",
                reason: "must be at least 32 bytes in production".to_string(),
            });
        }
        if self.security.session_max_age_days <= 0 {
            return Err(ConfigError::Invalid {
                key: "SESSION_MAX_AGE_DAYS",
                reason: "must be positive".to_string(),
            });
        }
        if self.providers.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "PROVIDER_TIMEOUT_SECS",
                reason: "must be at least 1 second".to_string(),
            });
        }
        // The in-memory store is a development convenience only
        if self.database.url.is_none() && !self.is_development() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                public_base_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                require_https: false,
                session_secret: "development-only-session-secret-change-me".to_string(),
                session_max_age_days: 30,
                oauth_state_ttl_secs: 600,
                bcrypt_cost: 10,
            },
            providers: ProviderConfig::defaults(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                public_base_url: "https://staging.example.com".to_string(),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                require_https: true,
                session_secret: String::new(),
                session_max_age_days: 30,
                oauth_state_ttl_secs: 600,
                bcrypt_cost: 12,
            },
            providers: ProviderConfig::defaults(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 3000,
                public_base_url: "https://app.example.com".to_string(),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                require_https: true,
                session_secret: String::new(),
                session_max_age_days: 30,
                oauth_state_ttl_secs: 300,
                bcrypt_cost: 12,
            },
            providers: ProviderConfig::defaults(),
        }
    }
}

impl ProviderConfig {
    fn defaults() -> Self {
        Self {
            timeout_secs: 10,
            aggregate_post_limit: 5,
            facebook: FacebookConfig {
                client_id: String::new(),
                client_secret: String::new(),
                graph_url: "https://graph.facebook.com/v22.0".to_string(),
                auth_url: "https://www.facebook.com/v22.0/dialog/oauth".to_string(),
                scope: "public_profile,email,pages_show_list,pages_read_engagement,read_insights".to_string(),
            },
            azure_ad: AzureAdConfig {
                client_id: String::new(),
                client_secret: String::new(),
                tenant_id: "common".to_string(),
                login_url: "https://login.microsoftonline.com".to_string(),
                graph_url: "https://graph.microsoft.com/v1.0".to_string(),
                scope: "openid profile email offline_access https://analysis.windows.net/powerbi/api/Report.Read.All".to_string(),
            },
            powerbi: PowerBiConfig {
                client_id: String::new(),
                client_secret: String::new(),
                tenant_id: String::new(),
                login_url: "https://login.microsoftonline.com".to_string(),
                scope: "https://analysis.windows.net/powerbi/api/.default".to_string(),
                api_url: "https://api.powerbi.com/v1.0/myorg".to_string(),
                group_id: String::new(),
                report_id: String::new(),
            },
            ads: AdsConfig { access_token: None },
            archive: ArchiveConfig {
                container_url: None,
                sas_token: None,
            },
        }
    }
}

fn set_string<F>(lookup: &F, key: &str, target: &mut String)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup(key) {
        *target = v;
    }
}

fn set_url<F>(lookup: &F, key: &str, target: &mut String)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup(key) {
        *target = v.trim_end_matches('/').to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_map(&map)
    }

    #[test]
    fn test_default_development_config() {
        let config = config_from(&[]);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.security.session_max_age_days, 30);
        assert!(config.database.url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_requires_secret_and_database() {
        let config = config_from(&[("APP_ENV", "production")]);
        assert!(matches!(config.validate(), Err(ConfigError::Missing("SESSION_SECRET"))));

        let config = config_from(&[
            ("APP_ENV", "production"),
            ("SESSION_SECRET", "0123456789abcdef0123456789abcdef"),
        ]);
        assert!(matches!(config.validate(), Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn test_staging_requires_database() {
        let config = config_from(&[("APP_ENV", "staging"), ("SESSION_SECRET", "staging-secret")]);
        assert!(matches!(config.validate(), Err(ConfigError::Missing("DATABASE_URL"))));

        let config = config_from(&[
            ("APP_ENV", "staging"),
            ("SESSION_SECRET", "staging-secret"),
            ("DATABASE_URL", "postgres://localhost/bi"),
        ]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_provider_timeout_is_rejected() {
        let config = config_from(&[("PROVIDER_TIMEOUT_SECS", "0")]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "PROVIDER_TIMEOUT_SECS",
                ..
            })
        ));

        let config = config_from(&[("PROVIDER_TIMEOUT_SECS", "-3")]);
        assert_eq!(config.providers.timeout_secs, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_apply() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("BCRYPT_COST", "4"),
            ("FACEBOOK_GRAPH_URL", "http://127.0.0.1:9000/"),
            ("ARCHIVE_SAS_TOKEN", "?sv=2022&sig=abc"),
        ]);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.security.bcrypt_cost, 10);
        assert_eq!(config.providers.facebook.graph_url, "http://127.0.0.1:9000");
        assert_eq!(config.providers.archive.sas_token.as_deref(), Some("sv=2022&sig=abc"));
    }

    #[test]
    fn test_powerbi_login_follows_azure_authority() {
        let config = config_from(&[("AZURE_AD_LOGIN_URL", "http://127.0.0.1:7000")]);
        assert_eq!(config.providers.powerbi.login_url, "http://127.0.0.1:7000");

        let config = config_from(&[
            ("AZURE_AD_LOGIN_URL", "http://127.0.0.1:7000"),
            ("POWERBI_LOGIN_URL", "http://127.0.0.1:7001"),
        ]);
        assert_eq!(config.providers.powerbi.login_url, "http://127.0.0.1:7001");
    }
}
