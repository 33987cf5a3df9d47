//! End-to-end HTTP surface tests over an in-memory gateway.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use secureyeoman_auth::AdminCredential;
use secureyeoman_server::{Config, build_router, build_state};
use secureyeoman_storage::MemoryKvStore;
use serde_json::{Value, json};
use tower::ServiceExt;

const PASSWORD: &str = "test-admin-password-32chars!!";

async fn make_app() -> Router {
    let config = Config {
        signing_key: "signing-key-signing-key-signing-key!".into(),
        token_secret: "token-secret-token-secret-token-sec!".into(),
        admin_password_hash: AdminCredential::hash_password(PASSWORD)
            .unwrap()
            .phc_hash()
            .to_string(),
        ..Config::default()
    };
    let state = build_state(config, Arc::new(MemoryKvStore::new()), true)
        .await
        .unwrap();
    build_router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"password": PASSWORD}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    body["accessToken"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_login_then_protected_read() {
    let app = make_app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::get("/api/v1/soul/personality")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_read_without_token_is_401() {
    let app = make_app().await;
    let response = app
        .oneshot(
            Request::get("/api/v1/soul/personality")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_wrong_password_is_401() {
    let app = make_app().await;
    let response = app
        .oneshot(
            Request::post("/api/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"password": "wrong"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rate_limit_is_429() {
    let app = make_app().await;
    for _ in 0..5 {
        let _ = app
            .clone()
            .oneshot(
                Request::post("/api/v1/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header("x-forwarded-for", "10.9.8.7")
                    .body(Body::from(json!({"password": "wrong"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
    }
    let response = app
        .oneshot(
            Request::post("/api/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-forwarded-for", "10.9.8.7")
                .body(Body::from(json!({"password": PASSWORD}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_viewer_key_can_read_but_not_write() {
    let app = make_app().await;
    let token = login(&app).await;

    // Admin mints a viewer API key; the plaintext appears exactly once.
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/auth/api-keys")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"name": "reader", "role": "viewer"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let key = body_json(response).await["key"].as_str().unwrap().to_string();
    assert!(key.starts_with("sy_"));

    // Read with the key succeeds.
    let response = app
        .clone()
        .oneshot(
            Request::get("/api/v1/soul/personality")
                .header("x-api-key", &key)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Write with the key is denied.
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/soul/personalities")
                .header("x-api-key", &key)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"name": "Hacker", "systemPrompt": "Nope"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The denial is on the audit chain.
    let response = app
        .oneshot(
            Request::get("/api/v1/audit?event=permission_denied")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_audit_verify_endpoint() {
    let app = make_app().await;
    let token = login(&app).await;

    let response = app
        .oneshot(
            Request::post("/api/v1/audit/verify")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["valid"], true);
    // At least the auth_success entry from login is on the chain.
    assert!(body["entriesChecked"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_personality_crud_and_activation() {
    let app = make_app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/soul/personalities")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"name": "Friday", "systemPrompt": "You are Friday."}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::post(format!("/api/v1/soul/personalities/{id}/activate"))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::get("/api/v1/soul/personality")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["personality"]["name"], "Friday");
}

#[tokio::test]
async fn test_memory_save_and_search() {
    let app = make_app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/brain/memories")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"content": "The user prefers dark mode."}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["quickCheck"]["outcome"], "clean");

    // A near-identical save dedupes.
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/brain/memories")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"content": "User prefers dark mode."}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await["quickCheck"]["outcome"], "deduped");

    let response = app
        .oneshot(
            Request::post("/api/v1/brain/search/similar")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"query": "dark mode", "k": 3}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_model_info_without_providers() {
    let app = make_app().await;
    let token = login(&app).await;

    let response = app
        .oneshot(
            Request::get("/api/v1/model/info")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["configured"], false);
}
