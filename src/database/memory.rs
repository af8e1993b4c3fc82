use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{Identity, LinkedAccount, NewIdentity, NewLinkedAccount, Provider, Role, SessionRecord};
use super::store::IdentityStore;

#[derive(Default)]
struct Tables {
    identities: HashMap<Uuid, Identity>,
    accounts: HashMap<Uuid, LinkedAccount>,
    sessions: HashMap<Uuid, SessionRecord>,
}

/// In-process identity store. A single lock guards all three tables, so every
/// operation (including the cascading delete) is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found() -> DatabaseError {
    DatabaseError::NotFound("User not found".to_string())
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, DatabaseError> {
        Ok(self.tables.read().await.identities.get(&id).cloned())
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.identities.values().find(|i| i.email == email).cloned())
    }

    async fn list_identities(&self) -> Result<Vec<Identity>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut all: Vec<Identity> = tables.identities.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn create_identity(&self, new: NewIdentity) -> Result<Identity, DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.identities.values().any(|i| i.email == new.email) {
            return Err(DatabaseError::Conflict(format!("Email '{}' is already registered", new.email)));
        }
        let identity = new.into_identity();
        tables.identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn set_role_by_email(&self, email: &str, role: Role) -> Result<Identity, DatabaseError> {
        let mut tables = self.tables.write().await;
        let identity = tables
            .identities
            .values_mut()
            .find(|i| i.email == email)
            .ok_or_else(|| DatabaseError::NotFound(format!("User '{}' not found", email)))?;
        identity.role = role;
        Ok(identity.clone())
    }

    async fn set_email_verified(&self, id: Uuid, at: Option<DateTime<Utc>>) -> Result<Identity, DatabaseError> {
        let mut tables = self.tables.write().await;
        let identity = tables.identities.get_mut(&id).ok_or_else(not_found)?;
        identity.email_verified = at;
        Ok(identity.clone())
    }

    async fn toggle_email_verified(&self, id: Uuid, now: DateTime<Utc>) -> Result<Identity, DatabaseError> {
        let mut tables = self.tables.write().await;
        let identity = tables.identities.get_mut(&id).ok_or_else(not_found)?;
        identity.email_verified = match identity.email_verified {
            Some(_) => None,
            None => Some(now),
        };
        Ok(identity.clone())
    }

    async fn delete_identity(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        if !tables.identities.contains_key(&id) {
            return Err(not_found());
        }
        tables.sessions.retain(|_, s| s.identity_id != id);
        tables.accounts.retain(|_, a| a.identity_id != id);
        tables.identities.remove(&id);
        Ok(())
    }

    async fn find_linked_account(
        &self,
        identity_id: Uuid,
        provider: Provider,
    ) -> Result<Option<LinkedAccount>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .values()
            .find(|a| a.identity_id == identity_id && a.provider == provider)
            .cloned())
    }

    async fn find_linked_account_by_subject(
        &self,
        provider: Provider,
        provider_account_id: &str,
    ) -> Result<Option<LinkedAccount>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .values()
            .find(|a| a.provider == provider && a.provider_account_id == provider_account_id)
            .cloned())
    }

    async fn list_linked_accounts(&self, identity_id: Uuid) -> Result<Vec<LinkedAccount>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .accounts
            .values()
            .filter(|a| a.identity_id == identity_id)
            .cloned()
            .collect())
    }

    async fn upsert_linked_account(&self, account: NewLinkedAccount) -> Result<LinkedAccount, DatabaseError> {
        let mut tables = self.tables.write().await;
        if !tables.identities.contains_key(&account.identity_id) {
            return Err(not_found());
        }
        let claimed = tables.accounts.values().any(|a| {
            a.provider == account.provider
                && a.provider_account_id == account.provider_account_id
                && a.identity_id != account.identity_id
        });
        if claimed {
            return Err(DatabaseError::Conflict(format!(
                "{} account is linked to another identity",
                account.provider
            )));
        }

        let existing = tables
            .accounts
            .values_mut()
            .find(|a| a.identity_id == account.identity_id && a.provider == account.provider);

        if let Some(existing) = existing {
            existing.provider_account_id = account.provider_account_id;
            existing.access_token = account.access_token;
            existing.refresh_token = account.refresh_token;
            existing.expires_at = account.expires_at;
            return Ok(existing.clone());
        }

        let created = account.into_account();
        tables.accounts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete_linked_account(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.tables
            .write()
            .await
            .accounts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DatabaseError::NotFound("Linked account not found".to_string()))
    }

    async fn create_session(&self, record: SessionRecord) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        if !tables.identities.contains_key(&record.identity_id) {
            return Err(not_found());
        }
        let now = Utc::now();
        tables
            .sessions
            .retain(|_, s| s.identity_id != record.identity_id || s.expires_at > now);
        tables.sessions.insert(record.id, record);
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, DatabaseError> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn list_sessions(&self, identity_id: Uuid) -> Result<Vec<SessionRecord>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .values()
            .filter(|s| s.identity_id == identity_id)
            .cloned()
            .collect())
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.tables.write().await.sessions.remove(&id);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
