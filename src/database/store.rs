use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{Identity, LinkedAccount, NewIdentity, NewLinkedAccount, Provider, Role, SessionRecord};

/// Persistence collaborator for identities, linked accounts and sessions.
///
/// Every method is atomic on its own. `delete_identity` removes the identity
/// together with its linked accounts and sessions in one transaction; callers
/// never hold locks across calls.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, DatabaseError>;

    /// Exact-match lookup
    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, DatabaseError>;

    /// All identities, newest first
    async fn list_identities(&self) -> Result<Vec<Identity>, DatabaseError>;

    /// Fails with `Conflict` when the email is taken
    async fn create_identity(&self, new: NewIdentity) -> Result<Identity, DatabaseError>;

    async fn set_role_by_email(&self, email: &str, role: Role) -> Result<Identity, DatabaseError>;

    async fn set_email_verified(&self, id: Uuid, at: Option<DateTime<Utc>>) -> Result<Identity, DatabaseError>;

    /// Clears the verification timestamp if set, otherwise sets it to `now`
    async fn toggle_email_verified(&self, id: Uuid, now: DateTime<Utc>) -> Result<Identity, DatabaseError>;

    async fn delete_identity(&self, id: Uuid) -> Result<(), DatabaseError>;

    async fn find_linked_account(
        &self,
        identity_id: Uuid,
        provider: Provider,
    ) -> Result<Option<LinkedAccount>, DatabaseError>;

    /// The link a provider account is attached to, whichever identity holds it
    async fn find_linked_account_by_subject(
        &self,
        provider: Provider,
        provider_account_id: &str,
    ) -> Result<Option<LinkedAccount>, DatabaseError>;

    async fn list_linked_accounts(&self, identity_id: Uuid) -> Result<Vec<LinkedAccount>, DatabaseError>;

    /// Insert, or replace the tokens of the existing (identity, provider) link
    async fn upsert_linked_account(&self, account: NewLinkedAccount) -> Result<LinkedAccount, DatabaseError>;

    async fn delete_linked_account(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Record a new session and drop the identity's expired ones
    async fn create_session(&self, record: SessionRecord) -> Result<(), DatabaseError>;

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, DatabaseError>;

    async fn list_sessions(&self, identity_id: Uuid) -> Result<Vec<SessionRecord>, DatabaseError>;

    async fn delete_session(&self, id: Uuid) -> Result<(), DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}
