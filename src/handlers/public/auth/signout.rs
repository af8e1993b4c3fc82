// handlers/public/auth/signout.rs - POST /auth/signout handler

use axum::extract::State;
use axum_extra::extract::CookieJar;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::Session;
use crate::error::ApiError;
use crate::middleware::{clear_session_cookie, ApiResponse};
use crate::state::AppState;

/// Revoke the current session and clear the cookie. Succeeds without a session.
pub async fn signout_post(
    State(state): State<AppState>,
    session: Option<Session>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<Value>), ApiError> {
    if let Some(session) = &session {
        state.store.delete_session(session.id).await?;
        info!("Signed out identity {}", session.user.id);
    }

    // Always sent, bearer clients included
    let jar = jar.add(clear_session_cookie(state.config.security.require_https));
    Ok((jar, ApiResponse::success(json!({ "signedOut": session.is_some() }))))
}
