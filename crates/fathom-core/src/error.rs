//! Error types for scan operations.
//!
//! Cancellation is deliberately not represented here as a failure:
//! callers observe it as [`ScanState::Cancelled`]. `Interrupted` is the
//! internal signal a worker raises when it sees the cancel flag, and it
//! never escapes a handle as an error.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::progress::ScanState;

/// Errors that can occur while scanning.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Path exists but is not a directory.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No scan backend could be constructed.
    #[error("Scan backend unavailable: {name}")]
    BackendUnavailable { name: String },

    /// A bounded wait expired before the scan reached a terminal state.
    #[error("Scan timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// The worker observed the cancel flag mid-scan.
    #[error("Scan interrupted")]
    Interrupted,

    /// `start` was called on a handle that already ran.
    #[error("Scan already started")]
    AlreadyStarted,

    /// Results were requested before the scan finished.
    #[error("Results not ready: scan is {state}")]
    NotReady { state: ScanState },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create an `Other` error from a message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}
