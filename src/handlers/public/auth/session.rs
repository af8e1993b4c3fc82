// handlers/public/auth/session.rs - GET /auth/session handler

use crate::auth::Session;
use crate::middleware::{ApiResponse, ApiResult};

/// The externally visible session, or `null` when signed out
pub async fn session_get(session: Option<Session>) -> ApiResult<Option<Session>> {
    Ok(ApiResponse::success(session))
}
