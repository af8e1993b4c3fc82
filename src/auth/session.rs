use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthError;
use crate::config::SecurityConfig;
use crate::database::models::{Identity, Role};

const SESSION_AUDIENCE: &str = "session";

/// Provider tokens obtained during the sign-in event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTokens {
    /// Delegated Facebook token used for Graph API calls
    pub facebook: Option<String>,
    /// Token accepted by the Power BI REST API
    pub powerbi: Option<String>,
}

/// Signed session payload. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub powerbi_token: Option<String>,
    pub jti: Uuid,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_else(Utc::now)
    }

    pub fn tokens(&self) -> SessionTokens {
        SessionTokens {
            facebook: self.access_token.clone(),
            powerbi: self.powerbi_token.clone(),
        }
    }

    /// Externally visible session: tokens surface when present in the
    /// payload, role surfaces when the identity had one.
    pub fn to_session(&self) -> Session {
        Session {
            id: self.jti,
            user: SessionUser {
                id: self.sub,
                email: self.email.clone(),
                name: self.name.clone(),
                role: self.role,
            },
            access_token: self.access_token.clone(),
            powerbi_token: self.powerbi_token.clone(),
            expires: self.expires_at(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(skip)]
    pub id: Uuid,
    pub user: SessionUser,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub powerbi_token: Option<String>,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub claims: SessionClaims,
}

/// Issues, reads and re-signs session tokens (HS256)
pub struct SessionStore {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
}

impl SessionStore {
    pub fn new(secret: &str, lifetime: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }

    pub fn from_config(security: &SecurityConfig) -> Self {
        Self::new(&security.session_secret, Duration::days(security.session_max_age_days))
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Sign a new session for `identity`, expiring an absolute lifetime from now
    pub fn issue(&self, identity: &Identity, tokens: SessionTokens) -> Result<IssuedSession, AuthError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: identity.id,
            email: identity.email.clone(),
            name: identity.name.clone(),
            role: Some(identity.role),
            access_token: tokens.facebook,
            powerbi_token: tokens.powerbi,
            jti: Uuid::new_v4(),
            aud: SESSION_AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };
        let token = self.sign(&claims)?;
        Ok(IssuedSession { token, claims })
    }

    /// Verify signature, audience and expiry and return the payload
    pub fn read(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[SESSION_AUDIENCE]);
        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }

    /// Re-sign an existing session. The expiry is kept, so the lifetime stays
    /// absolute from the original sign-in.
    pub fn refresh(&self, token: &str) -> Result<String, AuthError> {
        let claims = self.read(token)?;
        self.resign(claims)
    }

    pub(crate) fn resign(&self, mut claims: SessionClaims) -> Result<String, AuthError> {
        claims.iat = Utc::now().timestamp();
        self.sign(&claims)
    }

    fn sign(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Token(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewIdentity;

    fn store() -> SessionStore {
        SessionStore::new("test-secret-test-secret-test-secret", Duration::days(30))
    }

    fn identity(role: Role) -> Identity {
        NewIdentity {
            email: "a@x.com".to_string(),
            password_hash: Some("$2b$10$hash".to_string()),
            name: Some("Alice".to_string()),
            role,
        }
        .into_identity()
    }

    #[test]
    fn issue_then_read_round_trips_every_token_combination() {
        let store = store();
        let combos = [
            SessionTokens::default(),
            SessionTokens { facebook: Some("fb".into()), powerbi: None },
            SessionTokens { facebook: None, powerbi: Some("pbi".into()) },
            SessionTokens { facebook: Some("fb".into()), powerbi: Some("pbi".into()) },
        ];

        for role in [Role::User, Role::Admin] {
            let identity = identity(role);
            for tokens in combos.iter().cloned() {
                let issued = store.issue(&identity, tokens.clone()).unwrap();
                let claims = store.read(&issued.token).unwrap();
                assert_eq!(claims.role, Some(role));
                assert_eq!(claims.tokens(), tokens);
                assert_eq!(claims.sub, identity.id);
            }
        }
    }

    #[test]
    fn payload_never_contains_password_hash() {
        let issued = store().issue(&identity(Role::User), SessionTokens::default()).unwrap();
        let payload = serde_json::to_string(&issued.claims).unwrap();
        assert!(!payload.contains("$2b$10$hash"));
    }

    #[test]
    fn lifetime_is_thirty_days_and_survives_refresh() {
        let store = store();
        let issued = store.issue(&identity(Role::User), SessionTokens::default()).unwrap();
        assert_eq!(issued.claims.exp - issued.claims.iat, 30 * 24 * 60 * 60);

        let refreshed = store.refresh(&issued.token).unwrap();
        let claims = store.read(&refreshed).unwrap();
        assert_eq!(claims.exp, issued.claims.exp);
        assert_eq!(claims.jti, issued.claims.jti);
    }

    #[test]
    fn rejects_foreign_signature_and_expired_tokens() {
        let issued = store().issue(&identity(Role::User), SessionTokens::default()).unwrap();
        let other = SessionStore::new("another-secret-another-secret-xx", Duration::days(30));
        assert!(matches!(other.read(&issued.token), Err(AuthError::Unauthorized(_))));

        let expired = SessionStore::new("test-secret-test-secret-test-secret", Duration::days(-1));
        let stale = expired.issue(&identity(Role::User), SessionTokens::default()).unwrap();
        assert!(matches!(store().read(&stale.token), Err(AuthError::Unauthorized(_))));
    }

    #[test]
    fn session_view_surfaces_role_and_present_tokens() {
        let tokens = SessionTokens { facebook: Some("fb".into()), powerbi: None };
        let issued = store().issue(&identity(Role::Admin), tokens).unwrap();
        let view = serde_json::to_value(issued.claims.to_session()).unwrap();
        assert_eq!(view["user"]["role"], "ADMIN");
        assert_eq!(view["accessToken"], "fb");
        assert!(view.get("powerbiToken").is_none());
    }
}
