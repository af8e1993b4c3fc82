// handlers/public/auth/oauth.rs - OAuth redirect and callback handlers

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use tracing::{info, warn};

use super::utils::{normalize_email, start_session};
use crate::auth::{Session, SessionTokens};
use crate::database::models::{Identity, NewIdentity, NewLinkedAccount, Provider, Role};
use crate::error::ApiError;
use crate::providers::{AccessToken, CallbackPayload, ProviderProfile};
use crate::state::AppState;

/// Landing page after a successful provider sign-in
const AFTER_SIGNIN: &str = "/dashboard";

/// Browser half of the OAuth `state` check
pub const OAUTH_NONCE_COOKIE: &str = "oauth-nonce";
const CALLBACK_PATH: &str = "/auth/callback";

fn nonce_cookie(state: &AppState, value: String, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((OAUTH_NONCE_COOKIE, value))
        .path(CALLBACK_PATH)
        .http_only(true)
        // Lax still sends it on the provider's top-level redirect back
        .same_site(SameSite::Lax)
        .secure(state.config.security.require_https)
        .max_age(time::Duration::seconds(max_age_secs.max(0)))
        .build()
}

fn parse_provider(raw: &str) -> Result<Provider, ApiError> {
    raw.parse::<Provider>()
        .map_err(|_| ApiError::not_found(format!("Unknown sign-in provider '{}'", raw)))
}

fn ensure_configured(state: &AppState, provider: Provider) -> Result<(), ApiError> {
    let providers = &state.config.providers;
    let client_id = match provider {
        Provider::Facebook => &providers.facebook.client_id,
        Provider::AzureAd => &providers.azure_ad.client_id,
    };
    if client_id.is_empty() {
        return Err(ApiError::service_unavailable(format!("{} sign-in is not configured", provider)));
    }
    Ok(())
}

/// GET /auth/signin/:provider - redirect the browser to the provider
pub async fn oauth_signin(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let provider = parse_provider(&provider)?;
    ensure_configured(&state, provider)?;

    let (signed_state, nonce) = state.oauth_state.sign(provider)?;
    let url = state
        .oauth
        .authorize_url(provider, &signed_state, &state.redirect_uri(provider))
        .map_err(|e| ApiError::internal_server_error(e.to_string()))?;

    let ttl = state.oauth_state.ttl().num_seconds();
    let jar = jar.add(nonce_cookie(&state, nonce.to_string(), ttl));
    Ok((jar, Redirect::to(url.as_str())))
}

/// GET /auth/callback/:provider - finish the code exchange and start a session.
///
/// A caller who is already signed in links the provider account to their
/// own identity. Otherwise the provider account must already be linked, or
/// its email must be new; an existing identity is never claimed by email.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    current: Option<Session>,
    jar: CookieJar,
    Query(callback): Query<CallbackPayload>,
) -> Result<Response, ApiError> {
    let provider = parse_provider(&provider)?;

    let raw_state = callback
        .state
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("Missing OAuth state"))?;
    let browser_nonce = jar.get(OAUTH_NONCE_COOKIE).map(|c| c.value().to_string());
    state.oauth_state.verify(raw_state, provider, browser_nonce.as_deref())?;

    let redirect_uri = state.redirect_uri(provider);
    let token = state
        .oauth
        .acquire_delegated_token(provider, &callback, &redirect_uri)
        .await
        .map_err(|e| ApiError::from_provider(format!("{} token exchange failed", provider), e))?;

    let profile = state
        .oauth
        .fetch_profile(provider, &token.access_token)
        .await
        .map_err(|e| ApiError::from_provider(format!("{} profile lookup failed", provider), e))?;

    let identity = resolve_identity(&state, provider, &profile, current.as_ref()).await?;
    link_account(&state, &identity, provider, &profile, &token).await?;

    let tokens = match provider {
        Provider::Facebook => SessionTokens {
            facebook: Some(token.access_token),
            powerbi: None,
        },
        // The Azure AD token is used directly against the Power BI API
        Provider::AzureAd => SessionTokens {
            facebook: None,
            powerbi: Some(token.access_token),
        },
    };
    let (_, cookie) = start_session(&state, &identity, tokens).await?;

    info!("{} sign-in for identity {}", provider, identity.id);
    let jar = jar.add(cookie).add(nonce_cookie(&state, String::new(), 0));
    Ok((jar, Redirect::to(AFTER_SIGNIN)).into_response())
}

async fn resolve_identity(
    state: &AppState,
    provider: Provider,
    profile: &ProviderProfile,
    current: Option<&Session>,
) -> Result<Identity, ApiError> {
    if let Some(account) = state.store.find_linked_account_by_subject(provider, &profile.id).await? {
        if current.is_some_and(|s| s.user.id != account.identity_id) {
            return Err(ApiError::conflict(format!(
                "This {} account is already linked to another user",
                provider
            )));
        }
        return state
            .store
            .find_identity(account.identity_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Linked identity no longer exists"));
    }

    if let Some(current) = current {
        info!("Linking {} account to signed-in identity {}", provider, current.user.id);
        return state
            .store
            .find_identity(current.user.id)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Identity no longer exists"));
    }

    create_identity(state, provider, profile).await
}

async fn create_identity(state: &AppState, provider: Provider, profile: &ProviderProfile) -> Result<Identity, ApiError> {
    let email = profile
        .email
        .as_deref()
        .and_then(normalize_email)
        .ok_or_else(|| {
            warn!("Provider profile {} has no usable email", profile.id);
            ApiError::bad_request("The provider did not share an email address")
        })?;

    if let Some(existing) = state.store.find_identity_by_email(&email).await? {
        warn!(
            "Refused {} sign-in for profile {}: identity {} already uses its email",
            provider, profile.id, existing.id
        );
        let how = if existing.has_password() { "your password" } else { "your original provider" };
        return Err(ApiError::conflict(format!("Account exists, sign in with {} and link it", how)));
    }

    let identity = state
        .store
        .create_identity(NewIdentity {
            email,
            password_hash: None,
            name: profile.name.clone(),
            role: Role::User,
        })
        .await?;
    info!("Created identity {} from provider profile", identity.id);
    Ok(identity)
}

async fn link_account(
    state: &AppState,
    identity: &Identity,
    provider: Provider,
    profile: &ProviderProfile,
    token: &AccessToken,
) -> Result<(), ApiError> {
    state
        .store
        .upsert_linked_account(NewLinkedAccount {
            identity_id: identity.id,
            provider,
            provider_account_id: profile.id.clone(),
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        })
        .await?;
    Ok(())
}
