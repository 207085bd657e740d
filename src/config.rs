// file: src/config.rs
// version: 1.0.0
// guid: b2e7f4a1-8c5d-4e92-a3b6-0d9f7c2e5a18

//! Agent configuration structures

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default SSH port for registered hosts
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default SSH username for registered hosts
pub const DEFAULT_SSH_USER: &str = "root";

/// Agent-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Directory holding the registry and credential files
    pub data_dir: PathBuf,
    /// URL of the panel installer script, piped to a shell on the target
    pub install_url: String,
    /// Port the panel admin interface listens on after installation
    pub admin_port: u16,
}

impl AgentConfig {
    /// Build a configuration rooted at the given data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Path of the persisted host registry
    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join("registry.json")
    }

    /// Path of the credential store backend file
    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join("credentials.json")
    }

    /// Admin URL for a host address once the panel is installed
    pub fn admin_url_for(&self, address: &str) -> String {
        format!("https://{}:{}", address, self.admin_port)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("panel-agent");
        Self {
            data_dir,
            install_url: "http://fastpanel.direct/install_ru.sh".to_string(),
            admin_port: 8888,
        }
    }
}

/// Policy for a second install request against a host with one in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Wait for the in-flight attempt to finish, then run
    Wait,
    /// Fail fast with Busy
    FailFast,
}

/// Per-install options supplied by the caller
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Maximum connection attempts before giving up
    pub max_attempts: u32,
    /// Deadline for opening the SSH session
    pub connect_timeout: Duration,
    /// Deadline for each remote step
    pub exec_timeout: Duration,
    /// Behavior when another install holds the host lock
    pub wait_policy: WaitPolicy,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            connect_timeout: Duration::from_secs(30),
            exec_timeout: Duration::from_secs(900),
            wait_policy: WaitPolicy::FailFast,
        }
    }
}
