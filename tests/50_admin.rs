mod common;

use anyhow::Result;
use bi_dashboard_api::database::models::{NewLinkedAccount, Provider, Role};
use bi_dashboard_api::database::IdentityStore;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn admin_delete_cascades_and_kills_sessions() -> Result<()> {
    let app = common::spawn_app(&[]).await?;
    let a = common::seed_identity(&app.store, "a@x.com", "password1", Role::User).await?;
    common::seed_identity(&app.store, "b@x.com", "password2", Role::Admin).await?;
    app.store
        .upsert_linked_account(NewLinkedAccount {
            identity_id: a.id,
            provider: Provider::Facebook,
            provider_account_id: "fb-a".into(),
            access_token: "EAA-a".into(),
            refresh_token: None,
            expires_at: None,
        })
        .await?;

    let a_token = app.signin("a@x.com", "password1").await?;
    let b_token = app.signin("b@x.com", "password2").await?;
    assert_eq!(app.store.list_sessions(a.id).await?.len(), 1);

    let res = app
        .client
        .delete(app.url(&format!("/api/admin/users/{}", a.id)))
        .bearer_auth(&b_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["deleted"], true);

    assert!(app.store.find_identity(a.id).await?.is_none());
    assert!(app.store.list_linked_accounts(a.id).await?.is_empty());
    assert!(app.store.list_sessions(a.id).await?.is_empty());

    let res = app.get("/auth/session", Some(&a_token)).await?;
    let body: Value = res.json().await?;
    assert!(body["data"].is_null());
    Ok(())
}

#[tokio::test]
async fn admin_cannot_delete_themselves() -> Result<()> {
    let app = common::spawn_app(&[]).await?;
    let b = common::seed_identity(&app.store, "b@x.com", "password2", Role::Admin).await?;
    let token = app.signin("b@x.com", "password2").await?;

    let res = app
        .client
        .delete(app.url(&format!("/api/admin/users/{}", b.id)))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Cannot perform this operation on your own account");

    assert!(app.store.find_identity(b.id).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn admin_routes_require_admin_role() -> Result<()> {
    let app = common::spawn_app(&[]).await?;
    let a = common::seed_identity(&app.store, "a@x.com", "password1", Role::User).await?;
    let c = common::seed_identity(&app.store, "c@x.com", "password3", Role::User).await?;
    let token = app.signin("a@x.com", "password1").await?;

    let res = app.get("/api/admin/users", None).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app.get("/api/admin/users", Some(&token)).await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Role is checked before the self-target rule
    let res = app
        .client
        .delete(app.url(&format!("/api/admin/users/{}", a.id)))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .client
        .delete(app.url(&format!("/api/admin/users/{}", c.id)))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(app.store.find_identity(c.id).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn list_toggle_and_promote() -> Result<()> {
    let app = common::spawn_app(&[]).await?;
    let a = common::seed_identity(&app.store, "a@x.com", "password1", Role::User).await?;
    common::seed_identity(&app.store, "b@x.com", "password2", Role::Admin).await?;
    let token = app.signin("b@x.com", "password2").await?;

    let res = app.get("/api/admin/users", Some(&token)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let users = body["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("passwordHash").is_none()));

    let toggle = format!("/api/admin/users/{}/toggle-status", a.id);
    let res = app.client.put(app.url(&toggle)).bearer_auth(&token).send().await?;
    let body: Value = res.json().await?;
    assert!(body["data"]["emailVerified"].is_string());

    let res = app.client.put(app.url(&toggle)).bearer_auth(&token).send().await?;
    let body: Value = res.json().await?;
    assert!(body["data"]["emailVerified"].is_null());

    let res = app
        .client
        .post(app.url("/api/admin/make-admin"))
        .bearer_auth(&token)
        .json(&json!({ "email": "a@x.com" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["role"], "ADMIN");

    let res = app
        .client
        .post(app.url("/api/admin/make-admin"))
        .bearer_auth(&token)
        .json(&json!({ "email": "nobody@x.com" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn malformed_ids_are_bad_requests() -> Result<()> {
    let app = common::spawn_app(&[]).await?;
    common::seed_identity(&app.store, "b@x.com", "password2", Role::Admin).await?;
    let token = app.signin("b@x.com", "password2").await?;

    let res = app
        .client
        .delete(app.url("/api/admin/users/not-a-uuid"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .client
        .put(app.url("/api/admin/users/not-a-uuid/toggle-status"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
