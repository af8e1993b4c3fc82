// handlers/protected/facebook.rs - GET /api/facebook/insights

use axum::extract::State;

use crate::auth::Session;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::AggregatedRecord;
use crate::state::AppState;

/**
 * GET /api/facebook/insights - Profile, pages, page insights and recent posts
 *
 * Requires a session started through Facebook sign-in. A page whose details,
 * insights or posts could not be fetched is still returned, zeroed, with the
 * failed sections listed in `failures`.
 */
pub async fn insights_get(State(state): State<AppState>, session: Session) -> ApiResult<AggregatedRecord> {
    let token = session
        .access_token
        .as_deref()
        .ok_or_else(|| ApiError::unauthorized("Sign in with Facebook to view insights"))?;

    let record = state.aggregator.aggregate(token).await?;
    Ok(ApiResponse::success(record))
}
