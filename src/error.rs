//! Error types for moat
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad input, unknown status, project not connected)
//! - 4: Operation failed (I/O, JSON, lock contention)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the moat CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for moat operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid status '{0}' (expected \"to do\", \"doing\" or \"done\")")]
    InvalidStatus(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not connected: {0}")]
    NotConnected(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MissingField(_)
            | Error::InvalidStatus(_)
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::NotConnected(_) => exit_codes::USER_ERROR,

            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Storage failures that a caller can retry on the next change.
    ///
    /// In-memory state is kept when these happen, so the next successful
    /// save catches the files up.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Io(_) | Error::LockFailed(_))
    }

    /// Structured details for JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::MissingField(field) => Some(serde_json::json!({ "field": field })),
            Error::InvalidStatus(status) => Some(serde_json::json!({
                "status": status,
                "allowed": ["to do", "doing", "done"],
            })),
            Error::LockFailed(path) => Some(serde_json::json!({ "path": path })),
            _ => None,
        }
    }
}

/// Result type alias for moat operations
pub type Result<T> = std::result::Result<T, Error>;
