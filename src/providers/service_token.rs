use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{send_json, AccessToken, ProviderError};

/// App-only bearer token from a client-credentials exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceToken {
    pub token: String,
    /// Seconds until expiry as stated by the token endpoint
    pub expires_in: i64,
}

/// Client-credentials exchange against an Azure AD authority.
///
/// Tokens are not cached: every call performs a fresh exchange and the token
/// is only good for the request that fetched it.
#[derive(Clone)]
pub struct ServiceTokenClient {
    http: reqwest::Client,
    authority: String,
}

impl ServiceTokenClient {
    pub fn new(http: reqwest::Client, authority: impl Into<String>) -> Self {
        Self {
            http,
            authority: authority.into(),
        }
    }

    pub async fn acquire_service_token(
        &self,
        tenant: &str,
        client_id: &str,
        client_secret: &str,
        scope: &str,
    ) -> Result<ServiceToken, ProviderError> {
        let url = format!("{}/{}/oauth2/v2.0/token", self.authority, tenant);
        debug!("Requesting service token from {}", url);

        let request = self.http.post(&url).form(&[
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("scope", scope),
        ]);

        let token: AccessToken = send_json(request).await.map_err(|e| {
            error!("Service token exchange failed: {}", e);
            e
        })?;

        Ok(ServiceToken {
            token: token.access_token,
            expires_in: token.expires_in.unwrap_or(0),
        })
    }
}
