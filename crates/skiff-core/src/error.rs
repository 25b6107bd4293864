//! Error types for storage backends and addressing.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome category of a failed backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendStatus {
    /// The path does not exist.
    NotFound,
    /// The backend refused access.
    PermissionDenied,
    /// The backend could not be reached.
    ConnectionFailed,
    /// Something already exists at the destination.
    AlreadyExists,
    /// The backend does not support this call.
    Unimplemented,
    /// Any other failure.
    Error,
}

impl BackendStatus {
    /// Stable machine-readable code for this status.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::ConnectionFailed => "connection_failed",
            Self::AlreadyExists => "already_exists",
            Self::Unimplemented => "unimplemented",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "Not found"),
            Self::PermissionDenied => write!(f, "Permission denied"),
            Self::ConnectionFailed => write!(f, "Connection failed"),
            Self::AlreadyExists => write!(f, "Already exists"),
            Self::Unimplemented => write!(f, "Unimplemented"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Error returned by a [`StorageBackend`](crate::StorageBackend) call.
#[derive(Debug, Clone, Error)]
#[error("{status}: {message}")]
pub struct BackendError {
    /// Outcome category.
    pub status: BackendStatus,
    /// Backend-specific error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Whether retrying the same call may succeed.
    pub retryable: bool,
    /// Underlying cause, if any.
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl BackendError {
    /// Create an error with the status's default code.
    pub fn new(status: BackendStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            code: status.code().to_string(),
            message: message.into(),
            retryable: matches!(status, BackendStatus::ConnectionFailed),
            source: None,
        }
    }

    pub fn not_found(path: &str) -> Self {
        Self::new(BackendStatus::NotFound, format!("Path not found: {path}"))
    }

    pub fn permission_denied(path: &str) -> Self {
        Self::new(
            BackendStatus::PermissionDenied,
            format!("Permission denied: {path}"),
        )
    }

    pub fn already_exists(path: &str) -> Self {
        Self::new(
            BackendStatus::AlreadyExists,
            format!("'{path}' already exists"),
        )
    }

    pub fn unimplemented(call: &str) -> Self {
        Self::new(
            BackendStatus::Unimplemented,
            format!("{call} is not supported by this backend"),
        )
    }

    /// Override the backend-specific code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Override whether the call may be retried.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Create an error from an I/O error with path context.
    pub fn io(path: &str, source: std::io::Error) -> Self {
        let status = match source.kind() {
            std::io::ErrorKind::NotFound => BackendStatus::NotFound,
            std::io::ErrorKind::PermissionDenied => BackendStatus::PermissionDenied,
            std::io::ErrorKind::AlreadyExists => BackendStatus::AlreadyExists,
            std::io::ErrorKind::Unsupported => BackendStatus::Unimplemented,
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::TimedOut => BackendStatus::ConnectionFailed,
            _ => BackendStatus::Error,
        };
        Self::new(status, format!("{path}: {source}")).with_source(source)
    }
}

/// Errors raised when parsing a [`StorageUri`](crate::StorageUri).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    /// No `://` separator.
    #[error("Missing scheme separator in '{uri}'")]
    MissingScheme { uri: String },

    /// The part before `://` is empty.
    #[error("Empty scheme in '{uri}'")]
    EmptyScheme { uri: String },
}
