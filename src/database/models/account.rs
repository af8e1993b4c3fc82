use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// OAuth providers an identity can link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "facebook")]
    Facebook,
    #[serde(rename = "azure-ad")]
    AzureAd,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Facebook => "facebook",
            Provider::AzureAd => "azure-ad",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "facebook" => Ok(Provider::Facebook),
            "azure-ad" => Ok(Provider::AzureAd),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Provider credential attached to an identity; at most one per provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccount {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub provider: Provider,
    pub provider_account_id: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLinkedAccount {
    pub identity_id: Uuid,
    pub provider: Provider,
    pub provider_account_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewLinkedAccount {
    pub fn into_account(self) -> LinkedAccount {
        LinkedAccount {
            id: Uuid::new_v4(),
            identity_id: self.identity_id,
            provider: self.provider,
            provider_account_id: self.provider_account_id,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at,
            created_at: Utc::now(),
        }
    }
}
