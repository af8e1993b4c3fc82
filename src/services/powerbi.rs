use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::config::PowerBiConfig;
use crate::providers::{send_json, ProviderError, ServiceTokenClient};

/// What the browser-side embedding widget needs to render one report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmbedConfig {
    pub access_token: String,
    pub embed_url: String,
    pub report_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportMetadata {
    embed_url: String,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedToken {
    token: String,
    #[serde(default)]
    expiration: Option<String>,
}

/// Token used against the Power BI REST API for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Delegated token carried by the caller's session
    Session,
    /// Freshly exchanged app-only token
    Service,
}

/// Power BI REST client: report metadata plus view-only embed tokens
#[derive(Clone)]
pub struct PowerBiClient {
    http: reqwest::Client,
    config: PowerBiConfig,
    service_tokens: ServiceTokenClient,
}

impl PowerBiClient {
    pub fn new(http: reqwest::Client, config: PowerBiConfig) -> Self {
        let service_tokens = ServiceTokenClient::new(http.clone(), config.login_url.clone());
        Self {
            http,
            config,
            service_tokens,
        }
    }

    /// Build an embed configuration for the configured report.
    ///
    /// Uses `session_token` when the caller signed in through Azure AD;
    /// otherwise performs a client-credentials exchange for this call only.
    pub async fn embed_config(&self, session_token: Option<&str>) -> Result<EmbedConfig, ProviderError> {
        let (token, source) = match session_token {
            Some(token) => (token.to_string(), TokenSource::Session),
            None => {
                let service = self
                    .service_tokens
                    .acquire_service_token(
                        &self.config.tenant_id,
                        &self.config.client_id,
                        &self.config.client_secret,
                        &self.config.scope,
                    )
                    .await?;
                (service.token, TokenSource::Service)
            }
        };
        debug!("Generating Power BI embed token ({:?} token)", source);

        let report_url = format!(
            "{}/groups/{}/reports/{}",
            self.config.api_url, self.config.group_id, self.config.report_id
        );

        let report: ReportMetadata = send_json(self.http.get(&report_url).bearer_auth(&token)).await?;

        let generated: GeneratedToken = send_json(
            self.http
                .post(format!("{}/GenerateToken", report_url))
                .bearer_auth(&token)
                .json(&json!({ "accessLevel": "View", "allowSaveAs": false })),
        )
        .await?;

        info!("Issued Power BI embed token for report {}", self.config.report_id);
        Ok(EmbedConfig {
            access_token: generated.token,
            embed_url: report.embed_url,
            report_id: report.id.unwrap_or_else(|| self.config.report_id.clone()),
            expiration: generated.expiration,
        })
    }
}
