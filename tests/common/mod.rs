#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum_extra::extract::cookie::Cookie;
use bi_dashboard_api::auth::password::hash_password;
use bi_dashboard_api::database::models::{Identity, NewIdentity, Role};
use bi_dashboard_api::database::{IdentityStore, MemoryStore};
use bi_dashboard_api::services::MemoryArchiveStore;
use bi_dashboard_api::{app, AppConfig, AppState};
use serde_json::{json, Value};

/// An in-process server on the in-memory store
pub struct TestApp {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub archive: Arc<MemoryArchiveStore>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Credentials sign-in; returns the session token
    pub async fn signin(&self, email: &str, password: &str) -> Result<String> {
        let res = self
            .client
            .post(self.url("/auth/signin"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        anyhow::ensure!(res.status().is_success(), "signin failed with {}", res.status());
        let body: Value = res.json().await?;
        body["data"]["token"]
            .as_str()
            .map(str::to_string)
            .context("signin response has no token")
    }

    /// `GET /auth/signin/:provider` as a browser would see it
    pub async fn begin_oauth(&self, provider: &str) -> Result<OAuthStart> {
        let res = self.get(&format!("/auth/signin/{}", provider), None).await?;
        anyhow::ensure!(res.status().is_redirection(), "signin answered {}", res.status());

        let location = res
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .context("redirect without location")?;
        let authorize = url::Url::parse(location)?;
        let state = authorize
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .context("authorize URL without state")?;
        let nonce = cookie_value(&res, "oauth-nonce").context("no oauth-nonce cookie")?;

        Ok(OAuthStart {
            authorize,
            state,
            nonce,
        })
    }

    /// The provider's redirect back, from the browser that began the flow,
    /// optionally already signed in
    pub async fn finish_oauth(
        &self,
        provider: &str,
        start: &OAuthStart,
        code: &str,
        session: Option<&str>,
    ) -> Result<reqwest::Response> {
        let mut cookies = format!("oauth-nonce={}", start.nonce);
        if let Some(token) = session {
            cookies.push_str(&format!("; session-token={}", token));
        }
        let path = format!("/auth/callback/{}?code={}&state={}", provider, code, start.state);
        Ok(self
            .client
            .get(self.url(&path))
            .header(reqwest::header::COOKIE, cookies)
            .send()
            .await?)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<reqwest::Response> {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        Ok(req.send().await?)
    }
}

pub struct OAuthStart {
    pub authorize: url::Url,
    pub state: String,
    pub nonce: String,
}

/// Start the application with development defaults plus `overrides`
pub async fn spawn_app(overrides: &[(&str, &str)]) -> Result<TestApp> {
    let mut values: HashMap<String, String> = HashMap::new();
    values.insert("SESSION_SECRET".into(), "integration-test-secret-0123456789abcdef".into());
    for (k, v) in overrides {
        values.insert(k.to_string(), v.to_string());
    }

    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let base_url = format!("http://127.0.0.1:{}", port);
    values.insert("PUBLIC_BASE_URL".into(), base_url.clone());

    let config = AppConfig::from_map(&values);
    let store = Arc::new(MemoryStore::new());
    let archive = Arc::new(MemoryArchiveStore::new());
    let state = AppState::new(config, store.clone(), archive.clone())?;

    serve_on(port, app(state)).await?;

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    Ok(TestApp {
        base_url,
        store,
        archive,
        client,
    })
}

/// Serve `router` on `port` in the background
pub async fn serve_on(port: u16, router: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("failed to bind {}", port))?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(())
}

/// Serve a mock provider on a fresh port; returns its base URL
pub async fn spawn_mock(router: Router) -> Result<String> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    serve_on(port, router).await?;
    Ok(format!("http://127.0.0.1:{}", port))
}

pub async fn seed_identity(store: &MemoryStore, email: &str, password: &str, role: Role) -> Result<Identity> {
    let identity = store
        .create_identity(NewIdentity {
            email: email.to_string(),
            password_hash: Some(hash_password(password, 10)?),
            name: None,
            role,
        })
        .await?;
    Ok(identity)
}

/// Value of the non-empty `Set-Cookie` named `name`
pub fn cookie_value(res: &reqwest::Response, name: &str) -> Option<String> {
    res.headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| Cookie::parse(v).ok())
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Pull the session token out of a `Set-Cookie` header
pub fn session_cookie_value(res: &reqwest::Response) -> Option<String> {
    cookie_value(res, "session-token")
}
