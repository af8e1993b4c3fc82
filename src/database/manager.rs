use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::memory::MemoryStore;
use super::postgres::PgStore;
use super::store::IdentityStore;
use crate::config::{AppConfig, DatabaseConfig};

/// Errors from the storage layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Corrupt row: {0}")]
    Decode(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Builds the configured identity store
pub struct DatabaseManager;

impl DatabaseManager {
    /// Postgres when `DATABASE_URL` is configured, otherwise the in-memory
    /// store (refused outside development by `AppConfig::validate`).
    pub async fn open(config: &AppConfig) -> Result<Arc<dyn IdentityStore>, DatabaseError> {
        match &config.database.url {
            Some(url) => {
                let pool = Self::connect(url, &config.database).await?;
                let store = PgStore::new(pool);
                store.ensure_schema().await?;
                info!("Identity store: postgres");
                Ok(Arc::new(store))
            }
            None => {
                warn!("DATABASE_URL not set, using in-memory identity store; data is lost on restart");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }

    async fn connect(url: &str, settings: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.connection_timeout))
            .connect(url)
            .await?;
        info!("Created database pool ({} max connections)", settings.max_connections);
        Ok(pool)
    }
}
