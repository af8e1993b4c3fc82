use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json},
    routing::{delete, get, post, put},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::config::SecurityConfig;
use crate::handlers::{elevated::admin, protected, public::auth};
use crate::middleware::{require, session_middleware, Policy};
use crate::state::AppState;

/// The complete HTTP surface
pub fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Session required
        .merge(protected_routes())
        // ADMIN required
        .merge(admin_routes())
        // Global middleware, outermost first
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.security))
                .layer(from_fn_with_state(state.clone(), session_middleware)),
        )
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth::register_post))
        .route("/auth/signin", post(auth::signin_post))
        .route("/auth/signout", post(auth::signout_post))
        .route("/auth/session", get(auth::session_get))
        .route("/auth/signin/:provider", get(auth::oauth_signin))
        .route("/auth/callback/:provider", get(auth::oauth_callback))
}

fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/unlink/facebook", post(protected::unlink_facebook_post))
        .route("/api/facebook/insights", get(protected::insights_get))
        .route("/api/powerbi/embed-token", get(protected::embed_token_get))
        .route("/api/facebook-ads/sync", post(protected::ads_sync_post))
        .route("/api/facebook-ads/archive", get(protected::ads_archive_get))
        .route_layer(from_fn_with_state(Policy::SIGNED_IN, require))
}

fn admin_routes() -> Router<AppState> {
    let destructive = Router::new()
        .route("/api/admin/users/:id", delete(admin::user_delete))
        .route_layer(from_fn_with_state(Policy::ADMIN_NOT_SELF, require));

    Router::new()
        .route("/api/admin/users", get(admin::users_list))
        .route("/api/admin/users/:id/toggle-status", put(admin::user_toggle_status))
        .route("/api/admin/make-admin", post(admin::make_admin_post))
        .route_layer(from_fn_with_state(Policy::ADMIN, require))
        .merge(destructive)
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "BI Dashboard API",
            "version": version,
            "description": "Sign-in, Facebook insights, Power BI embedding and user administration",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "auth": "/auth/register, /auth/signin, /auth/signout, /auth/session (public)",
                "oauth": "/auth/signin/:provider, /auth/callback/:provider (public; facebook, azure-ad)",
                "account": "/api/auth/unlink/facebook (session)",
                "facebook": "/api/facebook/insights (session with Facebook token)",
                "powerbi": "/api/powerbi/embed-token (session)",
                "ads": "/api/facebook-ads/sync, /api/facebook-ads/archive (session)",
                "admin": "/api/admin/users[/:id[/toggle-status]], /api/admin/make-admin (ADMIN)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "SERVICE_UNAVAILABLE",
                    "message": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                    }
                })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionTokens;
    use crate::config::AppConfig;
    use crate::database::models::{NewIdentity, Role};
    use crate::database::{IdentityStore, MemoryStore};
    use crate::handlers::public::auth::utils::start_session;
    use crate::providers::ProviderError;
    use crate::services::graph::{GraphPage, GraphProfile, InsightMetric, PageDetails, PostSummary};
    use crate::services::{GraphApi, MemoryArchiveStore};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tower::ServiceExt;

    /// One page whose posts always fail
    struct OnePage;

    #[async_trait]
    impl GraphApi for OnePage {
        async fn profile(&self, _token: &str) -> Result<GraphProfile, ProviderError> {
            Ok(GraphProfile {
                id: "u1".into(),
                name: "Alice".into(),
            })
        }

        async fn pages(&self, _token: &str) -> Result<Vec<GraphPage>, ProviderError> {
            Ok(vec![GraphPage {
                id: "p1".into(),
                name: "Bakery".into(),
                category: "Food".into(),
                access_token: "page-secret".into(),
            }])
        }

        async fn page_details(&self, _page_id: &str, _page_token: &str) -> Result<PageDetails, ProviderError> {
            Ok(PageDetails {
                fan_count: 7,
                followers_count: 9,
            })
        }

        async fn page_insights(
            &self,
            _page_id: &str,
            _page_token: &str,
            _metrics: &[&str],
            _period: &str,
        ) -> Result<Vec<InsightMetric>, ProviderError> {
            Ok(Vec::new())
        }

        async fn page_posts(&self, _page_id: &str, _page_token: &str, _limit: u32) -> Result<Vec<PostSummary>, ProviderError> {
            Err(ProviderError::Timeout)
        }
    }

    fn test_state() -> AppState {
        let mut values = HashMap::new();
        values.insert("SESSION_SECRET".to_string(), "router-test-secret-0123456789abcdef".to_string());
        let config = AppConfig::from_map(&values);
        AppState::new(config, Arc::new(MemoryStore::new()), Arc::new(MemoryArchiveStore::new()))
            .expect("state")
    }

    async fn call(router: Router, method: Method, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let response = router
            .oneshot(request.body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn root_and_health_are_public() {
        let router = app(test_state());

        let (status, body) = call(router.clone(), Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "BI Dashboard API");

        let (status, body) = call(router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["database"], "ok");
    }

    #[tokio::test]
    async fn gated_routes_reject_anonymous_callers() {
        let router = app(test_state());
        for (method, uri) in [
            (Method::GET, "/api/facebook/insights"),
            (Method::GET, "/api/powerbi/embed-token"),
            (Method::GET, "/api/admin/users"),
            (Method::DELETE, "/api/admin/users/00000000-0000-0000-0000-000000000000"),
        ] {
            let (status, body) = call(router.clone(), method, uri, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
            assert_eq!(body["error"], "UNAUTHORIZED");
        }
    }

    #[tokio::test]
    async fn insights_use_the_session_token_and_report_failed_sections() {
        let state = test_state().with_graph(Arc::new(OnePage));
        let identity = state
            .store
            .create_identity(NewIdentity {
                email: "a@x.com".into(),
                password_hash: None,
                name: None,
                role: Role::User,
            })
            .await
            .expect("identity");
        let tokens = SessionTokens {
            facebook: Some("user-token".into()),
            powerbi: None,
        };
        let (issued, _) = start_session(&state, &identity, tokens).await.expect("session");

        let (status, body) = call(app(state), Method::GET, "/api/facebook/insights", Some(&issued.token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Alice");
        let page = &body["data"]["pages"][0];
        assert_eq!(page["fanCount"], 7);
        assert_eq!(page["failures"], json!(["posts"]));
        assert!(page.get("accessToken").is_none());
    }
}
