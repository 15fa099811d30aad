use std::sync::Arc;

use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_server::{app, app_with, Backend, Chat, Document, TokenResponse, User};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: &str) -> Request<String> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(body.to_string()).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<String> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(String::new()).unwrap()
}

fn login_request(username: &str, password: &str) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri("/api/auth/token")
        .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(format!("username={username}&password={password}"))
        .unwrap()
}

fn seeded() -> (Arc<Backend>, Router) {
    let backend = Arc::new(
        Backend::new()
            .with_user("alice", "alice@example.com", "Secret1")
            .with_user("admin", "admin@example.com", "root"),
    );
    (backend.clone(), app_with(backend))
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let resp = app
        .clone()
        .oneshot(login_request(username, password))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let token: TokenResponse = body_json(resp).await;
    token.access_token
}

// --- health ---

#[tokio::test]
async fn healthcheck_reports_ok_and_counts() {
    let (backend, app) = seeded();
    let resp = app
        .oneshot(get_request("/api/healthcheck?_t=1", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(backend.health_checks(), 1);
}

#[tokio::test]
async fn unhealthy_backend_returns_500() {
    let (backend, app) = seeded();
    backend.set_healthy(false);
    let resp = app
        .oneshot(get_request("/api/healthcheck", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = body_json(resp).await;
    assert_eq!(body["detail"], "database unavailable");
}

// --- auth ---

#[tokio::test]
async fn token_with_valid_credentials() {
    let (_, app) = seeded();
    let resp = app
        .oneshot(login_request("alice", "Secret1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let token: TokenResponse = body_json(resp).await;
    assert_eq!(token.token_type, "bearer");
    assert!(!token.access_token.is_empty());
}

#[tokio::test]
async fn token_with_wrong_password_returns_401() {
    let (_, app) = seeded();
    let resp = app.oneshot(login_request("alice", "nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = body_json(resp).await;
    assert_eq!(body["detail"], "Incorrect username or password");
}

#[tokio::test]
async fn fixed_token_is_issued() {
    let backend = Arc::new(
        Backend::new()
            .with_user("alice", "alice@example.com", "Secret1")
            .with_fixed_token("abc123"),
    );
    let token = login(&app_with(backend), "alice", "Secret1").await;
    assert_eq!(token, "abc123");
}

#[tokio::test]
async fn me_requires_bearer_token() {
    let (_, app) = seeded();
    let resp = app
        .oneshot(get_request("/api/auth/users/me", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_profile_for_token() {
    let (_, app) = seeded();
    let token = login(&app, "alice", "Secret1").await;
    let resp = app
        .oneshot(get_request("/api/auth/users/me", Some(&token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let user: User = body_json(resp).await;
    assert_eq!(user.username, "alice");
}

#[tokio::test]
async fn revoked_token_is_rejected() {
    let (backend, app) = seeded();
    let token = login(&app, "alice", "Secret1").await;
    backend.revoke_sessions().await;
    let resp = app
        .oneshot(get_request("/api/auth/users/me", Some(&token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_creates_user() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            None,
            r#"{"username":"bob","email":"bob@example.com","password":"pw"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let user: User = body_json(resp).await;
    assert_eq!(user.username, "bob");
    assert!(!user.is_admin);
}

#[tokio::test]
async fn register_duplicate_username_returns_400() {
    let (_, app) = seeded();
    let resp = app
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            None,
            r#"{"username":"alice","email":"other@example.com","password":"pw"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = body_json(resp).await;
    assert_eq!(body["detail"], "Username already registered");
}

#[tokio::test]
async fn register_malformed_json_returns_422() {
    let resp = app()
        .oneshot(json_request("POST", "/api/auth/register", None, r#"{"username":"x"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- documents ---

#[tokio::test]
async fn upload_list_get_delete_document() {
    let (_, app) = seeded();
    let token = login(&app, "alice", "Secret1").await;

    let boundary = "XBOUNDARY";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\
         Content-Type: text/plain\r\n\
         \r\n\
         hello\r\n\
         --{boundary}--\r\n"
    );
    let upload = Request::builder()
        .method("POST")
        .uri("/api/documents/upload")
        .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            http::header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(body)
        .unwrap();
    let resp = app.clone().oneshot(upload).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let doc: Document = body_json(resp).await;
    assert_eq!(doc.filename, "notes.txt");
    assert_eq!(doc.size, 5);

    let resp = app
        .clone()
        .oneshot(get_request("/api/documents", Some(&token)))
        .await
        .unwrap();
    let docs: Vec<Document> = body_json(resp).await;
    assert_eq!(docs.len(), 1);

    let uri = format!("/api/documents/{}", doc.id);
    let resp = app
        .clone()
        .oneshot(get_request(&uri, Some(&token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let delete = Request::builder()
        .method("DELETE")
        .uri(&uri)
        .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
        .body(String::new())
        .unwrap();
    let resp = app.clone().oneshot(delete).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    let resp = app.oneshot(get_request(&uri, Some(&token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn documents_require_auth() {
    let resp = app()
        .oneshot(get_request("/api/documents", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- chat ---

#[tokio::test]
async fn chat_lifecycle() {
    let (_, app) = seeded();
    let token = login(&app, "alice", "Secret1").await;

    let resp = app
        .clone()
        .oneshot(json_request("POST", "/api/chat", Some(&token), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let created: Value = body_json(resp).await;
    let chat_id = created["chat_id"].as_str().unwrap().to_string();

    let resp = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/chat/{chat_id}/messages"),
            Some(&token),
            r#"{"message":"hi"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let reply: Value = body_json(resp).await;
    assert_eq!(reply["response"], "You said: hi");

    let resp = app
        .clone()
        .oneshot(get_request(&format!("/api/chat/{chat_id}"), Some(&token)))
        .await
        .unwrap();
    let chat: Chat = body_json(resp).await;
    assert_eq!(chat.messages.len(), 2);
    assert_eq!(chat.title.as_deref(), Some("hi"));

    let resp = app
        .oneshot(get_request("/api/chat", Some(&token)))
        .await
        .unwrap();
    let chats: Vec<Chat> = body_json(resp).await;
    assert_eq!(chats.len(), 1);
}

#[tokio::test]
async fn message_to_unknown_chat_returns_404() {
    let (_, app) = seeded();
    let token = login(&app, "alice", "Secret1").await;
    let resp = app
        .oneshot(json_request(
            "POST",
            "/api/chat/nope/messages",
            Some(&token),
            r#"{"message":"hi"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- dashboard ---

#[tokio::test]
async fn dashboard_stats_for_admin() {
    let (_, app) = seeded();
    let token = login(&app, "admin", "root").await;
    let resp = app
        .oneshot(get_request("/api/dashboard/stats", Some(&token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let stats: Value = body_json(resp).await;
    assert_eq!(stats["total_users"], 2);
}

#[tokio::test]
async fn dashboard_stats_forbidden_for_regular_user() {
    let (_, app) = seeded();
    let token = login(&app, "alice", "Secret1").await;
    let resp = app
        .oneshot(get_request("/api/dashboard/stats", Some(&token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
