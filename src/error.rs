// file: src/error.rs
// version: 1.1.0
// guid: 7c41d9e2-5a3b-4c8f-9e06-2b8d4f1a6c73

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for the agent
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Error types for panel provisioning
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Install script failed with exit code {exit_code}: {detail}")]
    InstallScript { exit_code: i32, detail: String },

    #[error("Output parse error: {0}")]
    Parse(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Busy: {0}")]
    Busy(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Interrupted: {0}")]
    Interrupted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProvisionError {
    /// Create a new connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a new authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create a new timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Classify this error for result reporting
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) => ErrorKind::Connection,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::InstallScript { .. } => ErrorKind::InstallScript,
            Self::Parse(_) => ErrorKind::Parse,
            _ => ErrorKind::Internal,
        }
    }

    /// Whether a fresh attempt against the same host can reasonably succeed.
    /// Auth failures need new credentials; registry errors are caller bugs.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout(_) | Self::InstallScript { .. }
        )
    }
}

/// Coarse failure classification carried in installation results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connection,
    Auth,
    Timeout,
    InstallScript,
    Parse,
    Internal,
}

impl ErrorKind {
    /// Get the kind as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Auth => "auth",
            ErrorKind::Timeout => "timeout",
            ErrorKind::InstallScript => "install_script",
            ErrorKind::Parse => "parse",
            ErrorKind::Internal => "internal",
        }
    }
}
