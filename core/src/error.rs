//! Error types for the docintel API client.
//!
//! # Design
//! Every failed call surfaces as a single `ApiError { status, message }`.
//! `status == 0` is synthetic: no HTTP response arrived (network failure,
//! timeout or abort). Any other value is the real HTTP status code. Callers
//! that need to branch on the failure class use `ApiError::kind`.
//!
//! Lower layers (transport, storage, configuration) have their own error
//! enums; only `TransportError` is folded into `ApiError`, by the executor.

use std::time::Duration;

use thiserror::Error;

/// Status code used when no HTTP response was received.
pub const TRANSPORT_FAILURE: u16 = 0;

/// Error returned by every request-issuing operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

/// Coarse classification of an `ApiError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network unreachable, connection refused or timed out (status 0).
    Transport,
    /// The backend rejected the credentials or the session (401).
    Unauthorized,
    /// Any other 4xx, usually with a server-provided message.
    Validation,
    /// 5xx, or a status outside the 4xx range that still failed.
    Server,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// A failure where no HTTP response was received.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(TRANSPORT_FAILURE, message)
    }

    pub fn kind(&self) -> ErrorKind {
        match self.status {
            TRANSPORT_FAILURE => ErrorKind::Transport,
            401 => ErrorKind::Unauthorized,
            400..=499 => ErrorKind::Validation,
            _ => ErrorKind::Server,
        }
    }

    /// True for status 0 failures, the only class a "Retry" action makes sense for.
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind() == ErrorKind::Unauthorized
    }
}

/// Failure of the underlying HTTP round-trip.
///
/// `Timeout` and `Network` mean no response arrived. `UnreadableBody` means
/// the status line and headers did arrive but the body could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    #[error("{0}")]
    Network(String),

    #[error("response with status {status} has an unreadable body: {detail}")]
    UnreadableBody { status: u16, detail: String },
}


/// Failure reading or writing durable client-side storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage file is not a JSON object: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Invalid client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown environment {0:?}, expected \"production\" or \"development\"")]
    UnknownEnvironment(String),

    #[error("{0} must be set in the production environment")]
    MissingOrigin(&'static str),
}
