// handlers/protected/ads.rs - Facebook Ads insight export

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde_json::Value;
use tracing::info;

use crate::auth::Session;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{SyncOutcome, SyncRequest};
use crate::state::AppState;

/// POST /api/facebook-ads/sync - fetch daily ad insights and archive them
///
/// Input: { "accountId": "123", "dateStart": "2024-01-01", "dateStop": "2024-01-31" }
pub async fn ads_sync_post(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<SyncRequest>, JsonRejection>,
) -> ApiResult<SyncOutcome> {
    let Json(request) = payload?;
    info!("Ads sync for act_{} requested by {}", request.account_id, session.user.id);

    let outcome = state.ads.sync(&request).await?;
    Ok(ApiResponse::success(outcome))
}

/// GET /api/facebook-ads/archive?accountId=..&dateStart=..&dateStop=..
pub async fn ads_archive_get(
    State(state): State<AppState>,
    _session: Session,
    Query(request): Query<SyncRequest>,
) -> ApiResult<Vec<Value>> {
    let insights = state.ads.load(&request).await?;
    Ok(ApiResponse::success(insights))
}
