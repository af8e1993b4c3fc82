// handlers/elevated/admin/users.rs - identity administration

use axum::extract::{Path, State};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::Session;
use crate::database::models::Identity;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::invalid_field("id", "Must be a UUID"))
}

/// GET /api/admin/users
pub async fn users_list(State(state): State<AppState>) -> ApiResult<Vec<Identity>> {
    let users = state.store.list_identities().await?;
    Ok(ApiResponse::success(users))
}

/// DELETE /api/admin/users/:id
pub async fn user_delete(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    state.store.delete_identity(id).await?;

    info!("Identity {} deleted by {}", id, session.user.id);
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

/// PUT /api/admin/users/:id/toggle-status
pub async fn user_toggle_status(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<Identity> {
    let id = parse_id(&id)?;
    let identity = state.store.toggle_email_verified(id, Utc::now()).await?;

    info!(
        "Identity {} marked {} by {}",
        id,
        if identity.email_verified.is_some() { "verified" } else { "unverified" },
        session.user.id
    );
    Ok(ApiResponse::success(identity))
}
