// handlers/public/auth/register.rs - POST /auth/register handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use tracing::info;

use super::utils::normalize_email;
use crate::auth::password::hash_password;
use crate::database::models::{Identity, NewIdentity, Role};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

/**
 * POST /auth/register - Create a password identity with role USER
 *
 * Input:  { "email": "a@x.com", "password": "at least 8 chars", "name": "Alice" }
 * Output: 201 { "success": true, "data": { "id", "email", "name", "role": "USER", ... } }
 *
 * 400 on a malformed email or short password, 409 when the email is taken.
 */
pub async fn register_post(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<Identity> {
    let Json(payload) = payload?;

    let email = normalize_email(&payload.email).ok_or_else(|| ApiError::invalid_field("email", "Invalid email address"))?;
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::invalid_field(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }

    let cost = state.config.security.bcrypt_cost;
    let password = payload.password;
    // bcrypt is CPU bound
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| ApiError::internal_server_error(format!("Hashing task failed: {}", e)))??;

    let identity = state
        .store
        .create_identity(NewIdentity {
            email,
            password_hash: Some(password_hash),
            name: payload.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            role: Role::User,
        })
        .await?;

    info!("Registered identity {}", identity.id);
    Ok(ApiResponse::created(identity))
}
