// handlers/elevated/admin/make_admin.rs - POST /api/admin/make-admin

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::auth::Session;
use crate::database::models::{Identity, Role};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MakeAdminRequest {
    pub email: String,
}

pub async fn make_admin_post(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<MakeAdminRequest>, JsonRejection>,
) -> ApiResult<Identity> {
    let Json(payload) = payload?;
    let identity = state.store.set_role_by_email(payload.email.trim(), Role::Admin).await?;

    info!("Identity {} promoted to ADMIN by {}", identity.id, session.user.id);
    Ok(ApiResponse::success(identity))
}
