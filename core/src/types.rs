//! Request and response DTOs for the docintel backend.
//!
//! # Design
//! These types mirror the mock-server's schema but are defined independently;
//! the integration tests catch drift between the two crates. Where the real
//! backend returns open-ended objects, unknown fields are kept in `extra`
//! instead of being dropped.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Response of `POST /auth/token`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
}

fn bearer() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// `GET /auth/users/me`, also returned by registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<Value>,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatCreated {
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSession {
    pub chat_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendMessage {
    pub message: String,
}

/// Response of `POST /chat/{id}/messages`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageReply {
    pub response: String,
    #[serde(default)]
    pub sources: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyQueries {
    pub date: String,
    pub count: u64,
}

/// `GET /dashboard/stats`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    #[serde(default)]
    pub total_users: u64,
    #[serde(default)]
    pub total_documents: u64,
    #[serde(default)]
    pub total_chats: u64,
    #[serde(default)]
    pub total_queries: u64,
    #[serde(default)]
    pub queries_per_day: Vec<DailyQueries>,
    /// True when the values are the built-in sample rather than live data.
    #[serde(default, skip_serializing)]
    pub is_fallback: bool,
}

impl DashboardStats {
    /// Static sample shown when the live stats cannot be fetched.
    pub fn fallback() -> Self {
        let queries_per_day = [
            ("Mon", 42),
            ("Tue", 57),
            ("Wed", 61),
            ("Thu", 48),
            ("Fri", 73),
            ("Sat", 25),
            ("Sun", 19),
        ]
        .into_iter()
        .map(|(date, count)| DailyQueries {
            date: date.to_string(),
            count,
        })
        .collect();

        Self {
            total_users: 24,
            total_documents: 156,
            total_chats: 89,
            total_queries: 325,
            queries_per_day,
            is_fallback: true,
        }
    }
}
