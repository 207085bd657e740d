// file: src/registry/host.rs
// version: 1.0.0
// guid: d4a7c2f9-1b8e-4063-95da-3f6b0e8c2471

//! Host record and lifecycle states

use crate::credentials::CredentialRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a registered host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostState {
    /// Known to the registry, never installed
    Registered,
    /// An install attempt is opening a session
    Connecting,
    /// The remote installation procedure is running
    Installing,
    /// Panel installed; admin URL recorded
    Installed,
    /// Last attempt failed; retryable
    Failed,
}

impl HostState {
    /// Get the state as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            HostState::Registered => "registered",
            HostState::Connecting => "connecting",
            HostState::Installing => "installing",
            HostState::Installed => "installed",
            HostState::Failed => "failed",
        }
    }

    /// States that indicate an attempt was cut short by a crash
    pub fn is_transient(&self) -> bool {
        matches!(self, HostState::Connecting | HostState::Installing)
    }
}

impl std::fmt::Display for HostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One managed remote machine.
///
/// Secrets never appear here: `credential_ref` and `admin_password_ref` are
/// opaque handles into the credential store. `admin_url` and
/// `admin_password_ref` are only populated in the `Installed` state (the
/// password ref may stay unset when output parsing failed; the advisory note
/// lands in `last_error`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    /// Unique id derived from address and port
    pub host_id: String,
    /// IP address or hostname
    pub address: String,
    /// SSH port
    pub port: u16,
    /// SSH username
    pub username: String,
    /// Handle to the SSH secret in the credential store
    pub credential_ref: CredentialRef,
    /// Current lifecycle state
    pub state: HostState,
    /// Human-readable failure message from the last attempt
    pub last_error: Option<String>,
    /// Panel admin interface URL, set on successful installation
    pub admin_url: Option<String>,
    /// Handle to the discovered admin password, if it was recovered
    pub admin_password_ref: Option<CredentialRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Host {
    /// Create a freshly registered host record
    pub fn new(
        address: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        credential_ref: CredentialRef,
    ) -> Self {
        let address = address.into();
        let now = Utc::now();
        Self {
            host_id: super::host_id(&address, port),
            address,
            port,
            username: username.into(),
            credential_ref,
            state: HostState::Registered,
            last_error: None,
            admin_url: None,
            admin_password_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a failed attempt
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.state = HostState::Failed;
        self.last_error = Some(error.into());
    }

    /// Record a successful installation
    pub fn mark_installed(
        &mut self,
        admin_url: String,
        admin_password_ref: Option<CredentialRef>,
        note: Option<String>,
    ) {
        self.state = HostState::Installed;
        self.admin_url = Some(admin_url);
        self.admin_password_ref = admin_password_ref;
        self.last_error = note;
    }
}
