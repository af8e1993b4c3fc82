// handlers/protected/powerbi.rs - GET /api/powerbi/embed-token

use axum::extract::State;

use crate::auth::Session;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::EmbedConfig;
use crate::state::AppState;

/// View-only embed configuration for the configured report. Provider
/// failures keep the provider's status and put its body in `details`.
pub async fn embed_token_get(State(state): State<AppState>, session: Session) -> ApiResult<EmbedConfig> {
    let config = state
        .powerbi
        .embed_config(session.powerbi_token.as_deref())
        .await
        .map_err(|e| ApiError::from_provider("Failed to generate embed token", e))?;

    Ok(ApiResponse::success(config))
}
