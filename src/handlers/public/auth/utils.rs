use axum_extra::extract::cookie::Cookie;
use chrono::Utc;
use tracing::info;

use crate::auth::{IssuedSession, SessionTokens};
use crate::database::models::{Identity, SessionRecord};
use crate::error::ApiError;
use crate::middleware::session_cookie;
use crate::state::AppState;

/// Sign a session for `identity`, record it and build its cookie
pub async fn start_session(
    state: &AppState,
    identity: &Identity,
    tokens: SessionTokens,
) -> Result<(IssuedSession, Cookie<'static>), ApiError> {
    let issued = state.sessions.issue(identity, tokens)?;

    state
        .store
        .create_session(SessionRecord {
            id: issued.claims.jti,
            identity_id: identity.id,
            expires_at: issued.claims.expires_at(),
            created_at: Utc::now(),
        })
        .await?;

    let max_age = issued.claims.exp - Utc::now().timestamp();
    let cookie = session_cookie(issued.token.clone(), max_age, state.config.security.require_https);

    info!("Session started for identity {}", identity.id);
    Ok((issued, cookie))
}

/// Light shape check; the store enforces uniqueness
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || !domain.contains('.') || email.contains(char::is_whitespace) {
        return None;
    }
    Some(email.to_string())
}
