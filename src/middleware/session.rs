use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use tracing::debug;

use crate::auth::{AuthError, Session, SessionClaims};
use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session-token";

/// Resolve the caller's session, if any, and re-sign it on the way out.
///
/// Never rejects a request: a missing or invalid session just means no
/// `Session` in the extensions. Enforcement is the gate's job.
pub async fn session_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let mut refreshed = None;

    if let Some(token) = extract_session_token(request.headers()) {
        match resolve_session(&state, &token).await {
            Ok(claims) => {
                refreshed = match state.sessions.resign(claims.clone()) {
                    Ok(token) => Some((token, claims.exp)),
                    Err(e) => {
                        debug!("Session could not be re-signed: {}", e);
                        None
                    }
                };
                request.extensions_mut().insert(claims.to_session());
            }
            Err(e) => debug!("Ignoring session token: {}", e),
        }
    }

    let response = next.run(request).await;

    // Handlers that set their own session cookie (sign-in, sign-out) win
    match refreshed {
        Some((token, exp)) if !sets_session_cookie(&response) => {
            let max_age = exp - Utc::now().timestamp();
            let cookie = session_cookie(token, max_age, state.config.security.require_https);
            (CookieJar::new().add(cookie), response).into_response()
        }
        _ => response,
    }
}

fn sets_session_cookie(response: &Response) -> bool {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| Cookie::parse(v).ok())
        .any(|c| c.name() == SESSION_COOKIE)
}

/// Verify the token, then re-derive role and name from the stored identity.
/// A token whose session record was deleted (sign-out, identity deletion)
/// is rejected even though its signature is still good.
async fn resolve_session(state: &AppState, token: &str) -> Result<SessionClaims, AuthError> {
    let mut claims = state.sessions.read(token)?;

    let record = state
        .store
        .find_session(claims.jti)
        .await?
        .ok_or_else(|| AuthError::Unauthorized("Session revoked".to_string()))?;
    if record.identity_id != claims.sub {
        return Err(AuthError::Unauthorized("Session does not match its record".to_string()));
    }

    let identity = state
        .store
        .find_identity(claims.sub)
        .await?
        .ok_or_else(|| AuthError::Unauthorized("Identity no longer exists".to_string()))?;

    claims.role = Some(identity.role);
    claims.name = identity.name;
    claims.email = identity.email;
    Ok(claims)
}

/// Bearer header first, then the session cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

pub fn session_cookie(token: impl Into<String>, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.into()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(max_age_secs.max(0)))
        .build()
}

/// Expired, empty `session-token` that makes the browser drop its copy
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = session_cookie("", 0, secure);
    cookie.make_removal();
    cookie
}

/// Handlers that need a signed-in caller take `Session` directly
#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}
