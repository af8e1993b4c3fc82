use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// A registered user. The password hash is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub role: Role,
    pub email_verified: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn has_password(&self) -> bool {
        self.password_hash.as_deref().is_some_and(|h| !h.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub role: Role,
}

impl NewIdentity {
    pub fn into_identity(self) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: self.email,
            password_hash: self.password_hash,
            name: self.name,
            role: self.role,
            email_verified: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_text() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::User.to_string(), "USER");
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let identity = NewIdentity {
            email: "a@x.com".to_string(),
            password_hash: Some("$2b$10$secret".to_string()),
            name: Some("A".to_string()),
            role: Role::User,
        }
        .into_identity();

        let value = serde_json::to_value(&identity).unwrap();
        assert!(value.get("passwordHash").is_none());
        assert_eq!(value["role"], "USER");
        assert_eq!(value["email"], "a@x.com");
    }
}
