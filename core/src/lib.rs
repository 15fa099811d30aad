//! Blocking API client for the docintel document-intelligence backend.
//!
//! # Overview
//! `ApiService` issues authenticated requests to the backend REST API,
//! persists the bearer token across restarts and tracks whether the backend
//! is reachable, so a dead backend costs one rate-limited health probe
//! instead of a full request timeout per call.
//!
//! # Design
//! - Request building and response parsing (`RequestExecutor::build_request`,
//!   `executor::parse_response`) are pure; I/O happens only behind the
//!   `Transport` trait (`UreqTransport` in production).
//! - State lives in one injected `ApiService` instance, never in globals.
//! - Durable state goes through the `Storage` trait (`FileStorage` on disk,
//!   `MemoryStorage` for session-scoped data and tests).
//! - Authentication changes end in `Navigator::hard_navigate`, the host's
//!   full reload, so no auth-derived state outlives a login or logout.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod api;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod executor;
pub mod http;
pub mod multipart;
pub mod navigator;
pub mod preferences;
pub mod storage;
pub mod token;
pub mod transport;
pub mod types;

pub use api::{ApiService, ApiServiceBuilder};
pub use config::{ClientConfig, Environment};
pub use connectivity::{ConnectivityProber, ConnectivityState};
pub use error::{ApiError, ConfigError, ErrorKind, StorageError, TransportError};
pub use executor::{ApiRequest, RequestBody, RequestExecutor};
pub use http::{HttpBody, HttpMethod, HttpRequest, HttpResponse};
pub use multipart::{FilePart, MultipartForm};
pub use navigator::{Navigator, RecordingNavigator, TracingNavigator};
pub use preferences::Theme;
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use token::TokenStore;
pub use transport::{Transport, UreqTransport};
pub use types::{
    ChatCreated, ChatMessage, ChatSession, DashboardStats, Document, MessageReply, TokenResponse,
    UserProfile,
};
