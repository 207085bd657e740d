// file: src/provision/mod.rs
// version: 1.0.0
// guid: 5b3e9f07-8d1a-4c46-92b5-e60a4d7f8c13

//! Remote panel installation
//!
//! The orchestrator drives the fixed step sequence over one SSH session and
//! folds each attempt into the registry. It owns no persistent state of its
//! own: every attempt is a transformation from (host, credential) to an
//! [`InstallationResult`] plus a registry update.

pub mod marker;
pub mod orchestrator;
pub mod steps;

pub use orchestrator::InstallOrchestrator;

use crate::credentials::Secret;
use crate::error::ErrorKind;
use std::time::Duration;

/// Result of one install attempt. Transient: the orchestrator folds it into
/// the host record, it is never persisted directly.
#[derive(Debug)]
pub struct InstallationResult {
    pub success: bool,
    pub admin_url: Option<String>,
    /// Discovered admin password; redacted in Debug output
    pub admin_password: Option<Secret>,
    /// Tail of the remote output, truncated
    pub raw_output: String,
    pub error_kind: Option<ErrorKind>,
    pub duration: Duration,
    /// Connection attempts consumed
    pub attempts: u32,
    /// Advisory note, e.g. when the panel installed but the password could
    /// not be parsed from the output
    pub note: Option<String>,
}

/// Snapshot of a host's panel installation, from a non-mutating check
#[derive(Debug, Clone)]
pub struct PanelStatus {
    pub installed: bool,
    pub version: Option<String>,
    pub admin_url: Option<String>,
    /// Service name to active flag
    pub services: Vec<(String, bool)>,
}
