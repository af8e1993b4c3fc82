use serde::{Deserialize, Serialize};
use url::Url;

use super::{send_json, ProviderError};
use crate::config::ProviderConfig;
use crate::database::models::Provider;

/// Query parameters the provider appends to the redirect URI
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackPayload {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Token endpoint response (authorization-code or client-credentials grant)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Who the delegated token belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacebookMe {
    id: String,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzureMe {
    id: String,
    display_name: Option<String>,
    mail: Option<String>,
    user_principal_name: Option<String>,
}

/// Delegated (redirect-based) OAuth against Facebook and Azure AD.
/// Delegated tokens are never refreshed; expiry means a new sign-in.
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl OAuthClient {
    pub fn new(http: reqwest::Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }

    /// Where to send the browser to start sign-in
    pub fn authorize_url(&self, provider: Provider, state: &str, redirect_uri: &str) -> Result<Url, ProviderError> {
        let url = match provider {
            Provider::Facebook => {
                let fb = &self.config.facebook;
                Url::parse_with_params(
                    &fb.auth_url,
                    &[
                        ("client_id", fb.client_id.as_str()),
                        ("redirect_uri", redirect_uri),
                        ("state", state),
                        ("response_type", "code"),
                        ("scope", fb.scope.as_str()),
                        ("display", "popup"),
                    ],
                )
            }
            Provider::AzureAd => {
                let aad = &self.config.azure_ad;
                let base = format!("{}/{}/oauth2/v2.0/authorize", aad.login_url, aad.tenant_id);
                Url::parse_with_params(
                    &base,
                    &[
                        ("client_id", aad.client_id.as_str()),
                        ("redirect_uri", redirect_uri),
                        ("state", state),
                        ("response_type", "code"),
                        ("response_mode", "query"),
                        ("scope", aad.scope.as_str()),
                        ("prompt", "select_account"),
                    ],
                )
            }
        };
        url.map_err(|e| ProviderError::Decode(format!("Invalid authorize URL: {}", e)))
    }

    /// Exchange the callback's authorization code for an access token
    pub async fn acquire_delegated_token(
        &self,
        provider: Provider,
        callback: &CallbackPayload,
        redirect_uri: &str,
    ) -> Result<AccessToken, ProviderError> {
        if let Some(error) = &callback.error {
            return Err(ProviderError::Status {
                status: 400,
                body: serde_json::json!({
                    "error": error,
                    "error_description": callback.error_description,
                }),
            });
        }
        let code = callback.code.as_deref().ok_or_else(|| ProviderError::Status {
            status: 400,
            body: serde_json::json!({ "error": "missing_code" }),
        })?;

        match provider {
            Provider::Facebook => {
                let fb = &self.config.facebook;
                let request = self.http.get(format!("{}/oauth/access_token", fb.graph_url)).query(&[
                    ("client_id", fb.client_id.as_str()),
                    ("client_secret", fb.client_secret.as_str()),
                    ("redirect_uri", redirect_uri),
                    ("code", code),
                ]);
                send_json(request).await
            }
            Provider::AzureAd => {
                let aad = &self.config.azure_ad;
                let request = self
                    .http
                    .post(format!("{}/{}/oauth2/v2.0/token", aad.login_url, aad.tenant_id))
                    .form(&[
                        ("grant_type", "authorization_code"),
                        ("client_id", aad.client_id.as_str()),
                        ("client_secret", aad.client_secret.as_str()),
                        ("redirect_uri", redirect_uri),
                        ("scope", aad.scope.as_str()),
                        ("code", code),
                    ]);
                send_json(request).await
            }
        }
    }

    /// Look up the signed-in user's profile with the delegated token
    pub async fn fetch_profile(&self, provider: Provider, token: &str) -> Result<ProviderProfile, ProviderError> {
        match provider {
            Provider::Facebook => {
                let request = self
                    .http
                    .get(format!("{}/me", self.config.facebook.graph_url))
                    .query(&[("fields", "id,name,email")])
                    .bearer_auth(token);
                let me: FacebookMe = send_json(request).await?;
                Ok(ProviderProfile {
                    id: me.id,
                    name: me.name,
                    email: me.email,
                })
            }
            Provider::AzureAd => {
                let request = self
                    .http
                    .get(format!("{}/me", self.config.azure_ad.graph_url))
                    .bearer_auth(token);
                let me: AzureMe = send_json(request).await?;
                Ok(ProviderProfile {
                    id: me.id,
                    name: me.display_name,
                    email: me.mail.or(me.user_principal_name),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use std::collections::HashMap;

    fn client() -> OAuthClient {
        let mut values = HashMap::new();
        values.insert("FACEBOOK_CLIENT_ID".to_string(), "fb-app".to_string());
        values.insert("AZURE_AD_CLIENT_ID".to_string(), "aad-app".to_string());
        values.insert("AZURE_AD_TENANT_ID".to_string(), "contoso".to_string());
        let config = AppConfig::from_map(&values);
        OAuthClient::new(reqwest::Client::new(), config.providers)
    }

    #[test]
    fn facebook_authorize_url_carries_state_and_scope() {
        let url = client()
            .authorize_url(Provider::Facebook, "st", "http://localhost:3000/auth/callback/facebook")
            .unwrap();
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "fb-app");
        assert_eq!(params["state"], "st");
        assert!(params["scope"].contains("read_insights"));
        assert!(url.as_str().starts_with("https://www.facebook.com/"));
    }

    #[test]
    fn azure_authorize_url_targets_tenant() {
        let url = client()
            .authorize_url(Provider::AzureAd, "st", "http://localhost:3000/auth/callback/azure-ad")
            .unwrap();
        assert_eq!(url.path(), "/contoso/oauth2/v2.0/authorize");
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert!(params["scope"].contains("Report.Read.All"));
    }

    #[tokio::test]
    async fn callback_error_is_reported_without_network() {
        let callback = CallbackPayload {
            error: Some("access_denied".into()),
            ..Default::default()
        };
        let err = client()
            .acquire_delegated_token(Provider::Facebook, &callback, "http://localhost/cb")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
    }
}
