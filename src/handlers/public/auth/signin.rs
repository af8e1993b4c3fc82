// handlers/public/auth/signin.rs - POST /auth/signin handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::utils::start_session;
use crate::auth::{Session, SessionTokens};
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SigninResponse {
    /// Same value as the `session-token` cookie, for bearer clients
    pub token: String,
    pub session: Session,
}

/// Credentials sign-in. Unknown email, OAuth-only identity and wrong password
/// all produce the same 401.
pub async fn signin_post(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<SigninRequest>, JsonRejection>,
) -> Result<(CookieJar, ApiResponse<SigninResponse>), ApiError> {
    let Json(payload) = payload?;

    let identity = state.verifier().verify(payload.email.trim(), &payload.password).await?;
    let (issued, cookie) = start_session(&state, &identity, SessionTokens::default()).await?;

    info!("Credentials sign-in for identity {} ({})", identity.id, identity.role);
    Ok((
        jar.add(cookie),
        ApiResponse::success(SigninResponse {
            session: issued.claims.to_session(),
            token: issued.token,
        }),
    ))
}
