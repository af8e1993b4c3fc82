// handlers/protected/account.rs - linked account management

use axum::extract::State;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::Session;
use crate::database::models::Provider;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// POST /api/auth/unlink/facebook - drop the caller's Facebook link
pub async fn unlink_facebook_post(State(state): State<AppState>, session: Session) -> ApiResult<Value> {
    let account = state
        .store
        .find_linked_account(session.user.id, Provider::Facebook)
        .await?
        .ok_or_else(|| ApiError::not_found("No Facebook account linked"))?;

    state.store.delete_linked_account(account.id).await?;

    info!("Unlinked Facebook account for identity {}", session.user.id);
    Ok(ApiResponse::success(json!({ "provider": Provider::Facebook, "unlinked": true })))
}
