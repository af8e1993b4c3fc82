use anyhow::Context;
use chrono::Utc;
use tracing::info;

use crate::config::AppConfig;
use crate::database::models::Role;
use crate::database::DatabaseManager;

/// Bootstrap path for the first administrator: there is no ADMIN yet to call
/// `/api/admin/make-admin`.
pub async fn make_admin(config: AppConfig, email: &str) -> anyhow::Result<()> {
    if config.database.url.is_none() {
        anyhow::bail!("DATABASE_URL must be set; the in-memory store does not outlive this command");
    }

    let store = DatabaseManager::open(&config).await.context("failed to open identity store")?;

    let identity = store
        .set_role_by_email(email, Role::Admin)
        .await
        .with_context(|| format!("could not promote {}", email))?;
    let identity = store.set_email_verified(identity.id, Some(Utc::now())).await?;

    info!("Identity {} promoted to ADMIN", identity.id);
    println!("{} is now {} (verified {:?})", identity.email, identity.role, identity.email_verified);
    Ok(())
}
