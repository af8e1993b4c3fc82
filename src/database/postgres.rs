use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{debug, error};
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{Identity, LinkedAccount, NewIdentity, NewLinkedAccount, Provider, Role, SessionRecord};
use super::store::IdentityStore;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS identities (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT,
        name TEXT,
        role TEXT NOT NULL DEFAULT 'USER',
        email_verified TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS linked_accounts (
        id UUID PRIMARY KEY,
        identity_id UUID NOT NULL REFERENCES identities(id),
        provider TEXT NOT NULL,
        provider_account_id TEXT NOT NULL,
        access_token TEXT NOT NULL,
        refresh_token TEXT,
        expires_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (identity_id, provider),
        UNIQUE (provider, provider_account_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id UUID PRIMARY KEY,
        identity_id UUID NOT NULL REFERENCES identities(id),
        expires_at TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
];

const IDENTITY_COLUMNS: &str = "id, email, password_hash, name, role, email_verified, created_at";
const ACCOUNT_COLUMNS: &str =
    "id, identity_id, provider, provider_account_id, access_token, refresh_token, expires_at, created_at";

/// Postgres-backed identity store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables on first start
    pub async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn fetch_identity(&self, sql: &str, bind: &str) -> Result<Option<Identity>, DatabaseError> {
        let row = sqlx::query(sql).bind(bind).fetch_optional(&self.pool).await?;
        row.as_ref().map(identity_from_row).transpose()
    }
}

fn identity_from_row(row: &PgRow) -> Result<Identity, DatabaseError> {
    let role: String = row.try_get("role")?;
    Ok(Identity {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        name: row.try_get("name")?,
        role: role.parse::<Role>().map_err(|e| DatabaseError::Decode(e.to_string()))?,
        email_verified: row.try_get("email_verified")?,
        created_at: row.try_get("created_at")?,
    })
}

fn account_from_row(row: &PgRow) -> Result<LinkedAccount, DatabaseError> {
    let provider: String = row.try_get("provider")?;
    Ok(LinkedAccount {
        id: row.try_get("id")?,
        identity_id: row.try_get("identity_id")?,
        provider: provider.parse::<Provider>().map_err(|e| DatabaseError::Decode(e.to_string()))?,
        provider_account_id: row.try_get("provider_account_id")?,
        access_token: row.try_get("access_token")?,
        refresh_token: row.try_get("refresh_token")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn session_from_row(row: &PgRow) -> Result<SessionRecord, DatabaseError> {
    Ok(SessionRecord {
        id: row.try_get("id")?,
        identity_id: row.try_get("identity_id")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_unique_violation(err: sqlx::Error, what: String) -> DatabaseError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => DatabaseError::Conflict(what),
        _ => DatabaseError::Sqlx(err),
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, DatabaseError> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(identity_from_row).transpose()
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, DatabaseError> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE email = $1");
        self.fetch_identity(&sql, email).await
    }

    async fn list_identities(&self) -> Result<Vec<Identity>, DatabaseError> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities ORDER BY created_at DESC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(identity_from_row).collect()
    }

    async fn create_identity(&self, new: NewIdentity) -> Result<Identity, DatabaseError> {
        let identity = new.into_identity();
        let sql = format!(
            "INSERT INTO identities ({IDENTITY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {IDENTITY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(identity.id)
            .bind(&identity.email)
            .bind(&identity.password_hash)
            .bind(&identity.name)
            .bind(identity.role.as_str())
            .bind(identity.email_verified)
            .bind(identity.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, format!("Email '{}' is already registered", identity.email)))?;
        identity_from_row(&row)
    }

    async fn set_role_by_email(&self, email: &str, role: Role) -> Result<Identity, DatabaseError> {
        let sql = format!("UPDATE identities SET role = $2 WHERE email = $1 RETURNING {IDENTITY_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(email)
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User '{}' not found", email)))?;
        identity_from_row(&row)
    }

    async fn set_email_verified(&self, id: Uuid, at: Option<DateTime<Utc>>) -> Result<Identity, DatabaseError> {
        let sql = format!("UPDATE identities SET email_verified = $2 WHERE id = $1 RETURNING {IDENTITY_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))?;
        identity_from_row(&row)
    }

    async fn toggle_email_verified(&self, id: Uuid, now: DateTime<Utc>) -> Result<Identity, DatabaseError> {
        let sql = format!(
            "UPDATE identities \
             SET email_verified = CASE WHEN email_verified IS NULL THEN $2 ELSE NULL END \
             WHERE id = $1 RETURNING {IDENTITY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("User not found".to_string()))?;
        identity_from_row(&row)
    }

    async fn delete_identity(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let steps: [&str; 3] = [
            "DELETE FROM sessions WHERE identity_id = $1",
            "DELETE FROM linked_accounts WHERE identity_id = $1",
            "DELETE FROM identities WHERE id = $1",
        ];

        let mut deleted = 0;
        for sql in steps {
            match sqlx::query(sql).bind(id).execute(&mut *tx).await {
                Ok(result) => deleted = result.rows_affected(),
                Err(e) => {
                    error!("Delete of identity {} failed at '{}': {}", id, sql, e);
                    // Dropping `tx` rolls everything back
                    return Err(DatabaseError::Transaction(e.to_string()));
                }
            }
        }

        if deleted == 0 {
            tx.rollback().await?;
            return Err(DatabaseError::NotFound("User not found".to_string()));
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))
    }

    async fn find_linked_account(
        &self,
        identity_id: Uuid,
        provider: Provider,
    ) -> Result<Option<LinkedAccount>, DatabaseError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM linked_accounts WHERE identity_id = $1 AND provider = $2");
        let row = sqlx::query(&sql)
            .bind(identity_id)
            .bind(provider.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn find_linked_account_by_subject(
        &self,
        provider: Provider,
        provider_account_id: &str,
    ) -> Result<Option<LinkedAccount>, DatabaseError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM linked_accounts WHERE provider = $1 AND provider_account_id = $2");
        let row = sqlx::query(&sql)
            .bind(provider.as_str())
            .bind(provider_account_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn list_linked_accounts(&self, identity_id: Uuid) -> Result<Vec<LinkedAccount>, DatabaseError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM linked_accounts WHERE identity_id = $1");
        let rows = sqlx::query(&sql).bind(identity_id).fetch_all(&self.pool).await?;
        rows.iter().map(account_from_row).collect()
    }

    async fn upsert_linked_account(&self, account: NewLinkedAccount) -> Result<LinkedAccount, DatabaseError> {
        let account = account.into_account();
        let sql = format!(
            "INSERT INTO linked_accounts ({ACCOUNT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (identity_id, provider) DO UPDATE SET \
                provider_account_id = EXCLUDED.provider_account_id, \
                access_token = EXCLUDED.access_token, \
                refresh_token = EXCLUDED.refresh_token, \
                expires_at = EXCLUDED.expires_at \
             RETURNING {ACCOUNT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(account.id)
            .bind(account.identity_id)
            .bind(account.provider.as_str())
            .bind(&account.provider_account_id)
            .bind(&account.access_token)
            .bind(&account.refresh_token)
            .bind(account.expires_at)
            .bind(account.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, format!("{} account is linked to another identity", account.provider)))?;
        account_from_row(&row)
    }

    async fn delete_linked_account(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM linked_accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound("Linked account not found".to_string()));
        }
        Ok(())
    }

    async fn create_session(&self, record: SessionRecord) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let purged = sqlx::query("DELETE FROM sessions WHERE identity_id = $1 AND expires_at < now()")
            .bind(record.identity_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("INSERT INTO sessions (id, identity_id, expires_at, created_at) VALUES ($1, $2, $3, $4)")
            .bind(record.id)
            .bind(record.identity_id)
            .bind(record.expires_at)
            .bind(record.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        if purged > 0 {
            debug!("Purged {} expired sessions for identity {}", purged, record.identity_id);
        }
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, DatabaseError> {
        let row = sqlx::query("SELECT id, identity_id, expires_at, created_at FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn list_sessions(&self, identity_id: Uuid) -> Result<Vec<SessionRecord>, DatabaseError> {
        let rows = sqlx::query("SELECT id, identity_id, expires_at, created_at FROM sessions WHERE identity_id = $1")
            .bind(identity_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(session_from_row).collect()
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
