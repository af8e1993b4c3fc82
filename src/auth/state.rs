use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthError;
use crate::database::models::Provider;

const STATE_AUDIENCE: &str = "oauth-state";

/// Payload of the `state` parameter round-tripped through the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthState {
    pub provider: Provider,
    pub nonce: Uuid,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs short-lived OAuth `state` values so callbacks can be checked
/// without server-side storage. Each state carries a nonce that must also
/// come back in the browser's `oauth-nonce` cookie, so a state minted for
/// one browser is useless in another.
pub struct StateSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl StateSigner {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the signed state and the nonce to hand to the browser
    pub fn sign(&self, provider: Provider) -> Result<(String, Uuid), AuthError> {
        let now = Utc::now();
        let nonce = Uuid::new_v4();
        let state = OAuthState {
            provider,
            nonce,
            aud: STATE_AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let signed = encode(&Header::new(Algorithm::HS256), &state, &self.encoding_key)
            .map_err(|e| AuthError::Token(e.to_string()))?;
        Ok((signed, nonce))
    }

    /// Accept only an unexpired state minted for `provider` whose nonce
    /// matches the one the browser presents
    pub fn verify(&self, state: &str, provider: Provider, browser_nonce: Option<&str>) -> Result<OAuthState, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[STATE_AUDIENCE]);
        let data = decode::<OAuthState>(state, &self.decoding_key, &validation)
            .map_err(|_| AuthError::Unauthorized("Invalid OAuth state".to_string()))?;
        if data.claims.provider != provider {
            return Err(AuthError::Unauthorized("OAuth state was issued for another provider".to_string()));
        }
        let presented = browser_nonce.and_then(|n| Uuid::parse_str(n.trim()).ok());
        if presented != Some(data.claims.nonce) {
            return Err(AuthError::Unauthorized("OAuth state does not belong to this browser".to_string()));
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_bound_to_provider() {
        let signer = StateSigner::new("state-secret", Duration::minutes(10));
        let (state, nonce) = signer.sign(Provider::Facebook).unwrap();
        let nonce = nonce.to_string();
        assert!(signer.verify(&state, Provider::Facebook, Some(&nonce)).is_ok());
        assert!(signer.verify(&state, Provider::AzureAd, Some(&nonce)).is_err());
    }

    #[test]
    fn state_is_bound_to_the_browser_nonce() {
        let signer = StateSigner::new("state-secret", Duration::minutes(10));
        let (state, _) = signer.sign(Provider::Facebook).unwrap();
        let (_, other_nonce) = signer.sign(Provider::Facebook).unwrap();

        assert!(signer.verify(&state, Provider::Facebook, None).is_err());
        assert!(signer
            .verify(&state, Provider::Facebook, Some(&other_nonce.to_string()))
            .is_err());
        assert!(signer.verify(&state, Provider::Facebook, Some("not-a-uuid")).is_err());
    }

    #[test]
    fn session_tokens_are_not_valid_state() {
        use crate::auth::{SessionStore, SessionTokens};
        use crate::database::models::{NewIdentity, Role};

        let sessions = SessionStore::new("state-secret", Duration::days(1));
        let identity = NewIdentity {
            email: "a@x.com".into(),
            password_hash: None,
            name: None,
            role: Role::User,
        }
        .into_identity();
        let issued = sessions.issue(&identity, SessionTokens::default()).unwrap();

        let signer = StateSigner::new("state-secret", Duration::minutes(10));
        assert!(signer.verify(&issued.token, Provider::Facebook, None).is_err());
    }
}
