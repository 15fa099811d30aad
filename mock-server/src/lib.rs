//! In-memory fake of the docintel backend REST API, mounted under `/api`.
//!
//! Covers the endpoints the client consumes: health probe, token login,
//! registration, profile, documents, chat and dashboard stats. Test hooks
//! (`set_healthy`, `health_checks`, `with_fixed_token`, `revoke_sessions`)
//! let integration tests drive connectivity and session expiry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub owner: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chat {
    pub chat_id: String,
    pub title: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub owner: String,
}

#[derive(Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SendMessage {
    pub message: String,
}

struct Account {
    user: User,
    password: String,
}

pub struct Backend {
    accounts: RwLock<HashMap<String, Account>>,
    /// token -> username
    sessions: RwLock<HashMap<String, String>>,
    documents: RwLock<HashMap<String, Document>>,
    chats: RwLock<HashMap<String, Chat>>,
    next_user_id: AtomicU64,
    fixed_token: Option<String>,
    healthy: AtomicBool,
    health_checks: AtomicUsize,
}

pub type SharedBackend = Arc<Backend>;

type ApiFailure = (StatusCode, Json<Value>);

fn failure(status: StatusCode, detail: &str) -> ApiFailure {
    (status, Json(json!({ "detail": detail })))
}

impl Default for Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            documents: RwLock::new(HashMap::new()),
            chats: RwLock::new(HashMap::new()),
            next_user_id: AtomicU64::new(1),
            fixed_token: None,
            healthy: AtomicBool::new(true),
            health_checks: AtomicUsize::new(0),
        }
    }

    /// Seed an account. The username `admin` gets admin rights.
    pub fn with_user(mut self, username: &str, email: &str, password: &str) -> Self {
        let user = self.new_user(username, email);
        self.accounts.get_mut().insert(
            username.to_string(),
            Account {
                user,
                password: password.to_string(),
            },
        );
        self
    }

    /// Issue `token` on every successful login instead of a random one.
    pub fn with_fixed_token(mut self, token: &str) -> Self {
        self.fixed_token = Some(token.to_string());
        self
    }

    fn new_user(&self, username: &str, email: &str) -> User {
        User {
            id: self.next_user_id.fetch_add(1, Ordering::SeqCst),
            username: username.to_string(),
            email: email.to_string(),
            is_admin: username == "admin",
        }
    }

    /// Make `/healthcheck` answer 200 (`true`) or 500 (`false`).
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Number of `/healthcheck` requests served so far.
    pub fn health_checks(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }

    /// Invalidate every issued token, as a backend restart would.
    pub async fn revoke_sessions(&self) {
        self.sessions.write().await.clear();
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<User, ApiFailure> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| failure(StatusCode::UNAUTHORIZED, "Not authenticated"))?;
        let sessions = self.sessions.read().await;
        let username = sessions
            .get(token)
            .ok_or_else(|| failure(StatusCode::UNAUTHORIZED, "Could not validate credentials"))?;
        let accounts = self.accounts.read().await;
        accounts
            .get(username)
            .map(|account| account.user.clone())
            .ok_or_else(|| failure(StatusCode::UNAUTHORIZED, "Could not validate credentials"))
    }
}

pub fn app() -> Router {
    app_with(Arc::new(Backend::new()))
}

pub fn app_with(backend: SharedBackend) -> Router {
    let api = Router::new()
        .route("/healthcheck", get(healthcheck))
        .route("/auth/token", post(issue_token))
        .route("/auth/register", post(register))
        .route("/auth/users/me", get(current_user))
        .route("/documents", get(list_documents))
        .route("/documents/upload", post(upload_document))
        .route("/documents/{id}", get(get_document).delete(delete_document))
        .route("/chat", get(list_chats).post(create_chat))
        .route("/chat/{id}", get(get_chat))
        .route("/chat/{id}/messages", post(send_message))
        .route("/dashboard/stats", get(dashboard_stats));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(backend)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, backend: SharedBackend) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(backend)).await
}

async fn healthcheck(State(backend): State<SharedBackend>) -> (StatusCode, Json<Value>) {
    backend.health_checks.fetch_add(1, Ordering::SeqCst);
    if backend.healthy.load(Ordering::SeqCst) {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "database unavailable" })),
        )
    }
}

async fn issue_token(
    State(backend): State<SharedBackend>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiFailure> {
    let accounts = backend.accounts.read().await;
    match accounts.get(&form.username) {
        Some(account) if account.password == form.password => {}
        _ => {
            return Err(failure(
                StatusCode::UNAUTHORIZED,
                "Incorrect username or password",
            ))
        }
    }
    drop(accounts);

    let token = backend
        .fixed_token
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    backend
        .sessions
        .write()
        .await
        .insert(token.clone(), form.username.clone());
    info!(username = %form.username, "issued token");
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
    }))
}

async fn register(
    State(backend): State<SharedBackend>,
    Json(form): Json<RegisterForm>,
) -> Result<(StatusCode, Json<User>), ApiFailure> {
    if form.username.trim().is_empty() || form.password.is_empty() {
        return Err(failure(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Username and password are required",
        ));
    }
    if !form.email.contains('@') {
        return Err(failure(StatusCode::BAD_REQUEST, "Invalid email address"));
    }

    let mut accounts = backend.accounts.write().await;
    if accounts.contains_key(&form.username) {
        return Err(failure(StatusCode::BAD_REQUEST, "Username already registered"));
    }
    if accounts.values().any(|account| account.user.email == form.email) {
        return Err(failure(StatusCode::BAD_REQUEST, "Email already registered"));
    }

    let user = backend.new_user(&form.username, &form.email);
    accounts.insert(
        form.username.clone(),
        Account {
            user: user.clone(),
            password: form.password,
        },
    );
    info!(username = %user.username, "registered user");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn current_user(
    State(backend): State<SharedBackend>,
    headers: HeaderMap,
) -> Result<Json<User>, ApiFailure> {
    backend.authenticate(&headers).await.map(Json)
}

async fn list_documents(
    State(backend): State<SharedBackend>,
    headers: HeaderMap,
) -> Result<Json<Vec<Document>>, ApiFailure> {
    let user = backend.authenticate(&headers).await?;
    let documents = backend.documents.read().await;
    Ok(Json(
        documents
            .values()
            .filter(|doc| doc.owner == user.username)
            .cloned()
            .collect(),
    ))
}

async fn upload_document(
    State(backend): State<SharedBackend>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Document>), ApiFailure> {
    let user = backend.authenticate(&headers).await?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| failure(StatusCode::BAD_REQUEST, &e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| failure(StatusCode::BAD_REQUEST, &e.to_string()))?;

        let document = Document {
            id: Uuid::new_v4().to_string(),
            filename,
            content_type,
            size: data.len() as u64,
            owner: user.username.clone(),
        };
        backend
            .documents
            .write()
            .await
            .insert(document.id.clone(), document.clone());
        return Ok((StatusCode::CREATED, Json(document)));
    }
    Err(failure(StatusCode::UNPROCESSABLE_ENTITY, "Missing file field"))
}

async fn get_document(
    State(backend): State<SharedBackend>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiFailure> {
    let user = backend.authenticate(&headers).await?;
    let documents = backend.documents.read().await;
    documents
        .get(&id)
        .filter(|doc| doc.owner == user.username)
        .cloned()
        .map(Json)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "Document not found"))
}

async fn delete_document(
    State(backend): State<SharedBackend>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiFailure> {
    let user = backend.authenticate(&headers).await?;
    let mut documents = backend.documents.write().await;
    match documents.get(&id) {
        Some(doc) if doc.owner == user.username => {
            documents.remove(&id);
            Ok(StatusCode::NO_CONTENT)
        }
        _ => Err(failure(StatusCode::NOT_FOUND, "Document not found")),
    }
}

async fn create_chat(
    State(backend): State<SharedBackend>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiFailure> {
    let user = backend.authenticate(&headers).await?;
    let chat = Chat {
        chat_id: Uuid::new_v4().to_string(),
        title: None,
        messages: Vec::new(),
        owner: user.username,
    };
    let chat_id = chat.chat_id.clone();
    backend.chats.write().await.insert(chat_id.clone(), chat);
    Ok(Json(json!({ "chat_id": chat_id })))
}

async fn list_chats(
    State(backend): State<SharedBackend>,
    headers: HeaderMap,
) -> Result<Json<Vec<Chat>>, ApiFailure> {
    let user = backend.authenticate(&headers).await?;
    let chats = backend.chats.read().await;
    Ok(Json(
        chats
            .values()
            .filter(|chat| chat.owner == user.username)
            .cloned()
            .collect(),
    ))
}

async fn get_chat(
    State(backend): State<SharedBackend>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Chat>, ApiFailure> {
    let user = backend.authenticate(&headers).await?;
    let chats = backend.chats.read().await;
    chats
        .get(&id)
        .filter(|chat| chat.owner == user.username)
        .cloned()
        .map(Json)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "Chat not found"))
}

async fn send_message(
    State(backend): State<SharedBackend>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<SendMessage>,
) -> Result<Json<Value>, ApiFailure> {
    let user = backend.authenticate(&headers).await?;
    let mut chats = backend.chats.write().await;
    let chat = chats
        .get_mut(&id)
        .filter(|chat| chat.owner == user.username)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "Chat not found"))?;

    let reply = format!("You said: {}", input.message);
    if chat.title.is_none() {
        chat.title = Some(input.message.chars().take(40).collect());
    }
    chat.messages.push(ChatMessage {
        role: "user".to_string(),
        content: input.message,
    });
    chat.messages.push(ChatMessage {
        role: "assistant".to_string(),
        content: reply.clone(),
    });
    Ok(Json(json!({
        "response": reply,
        "chat_id": chat.chat_id,
        "sources": [],
    })))
}

async fn dashboard_stats(
    State(backend): State<SharedBackend>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiFailure> {
    let user = backend.authenticate(&headers).await?;
    if !user.is_admin {
        return Err(failure(StatusCode::FORBIDDEN, "Admin privileges required"));
    }
    let total_users = backend.accounts.read().await.len();
    let total_documents = backend.documents.read().await.len();
    let chats = backend.chats.read().await;
    let total_queries = chats
        .values()
        .flat_map(|chat| chat.messages.iter())
        .filter(|message| message.role == "user")
        .count();
    Ok(Json(json!({
        "total_users": total_users,
        "total_documents": total_documents,
        "total_chats": chats.len(),
        "total_queries": total_queries,
        "queries_per_day": [],
    })))
}
