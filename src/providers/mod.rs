pub mod oauth;
pub mod service_token;

pub use oauth::{AccessToken, CallbackPayload, OAuthClient, ProviderProfile};
pub use service_token::{ServiceToken, ServiceTokenClient};

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Failure talking to an external provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-2xx response; `body` is the provider's payload (JSON when it parses)
    #[error("Provider responded with status {status}")]
    Status { status: u16, body: Value },

    #[error("Provider request timed out")]
    Timeout,

    #[error("Provider request failed: {0}")]
    Transport(String),

    #[error("Unexpected provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// Send a request and decode a 2xx JSON body; anything else becomes
/// `ProviderError::Status` carrying the provider's body.
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ProviderError> {
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&text).map_err(|e| ProviderError::Decode(e.to_string()))
}
