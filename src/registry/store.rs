// file: src/registry/store.rs
// version: 1.1.0
// guid: a9c5e1f7-4d28-4b63-80fa-2e7d9b3c6154

//! Persistent server registry
//!
//! The registry is the single owner of host records. It is constructed
//! explicitly and injected into its consumers; state lives in one JSON file
//! under the agent data directory and is rewritten atomically after every
//! mutation, so a crash never leaves a torn file behind.

use super::host::Host;
use crate::{ProvisionError, Result};
use chrono::Utc;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Error message recorded for attempts cut short by a crash
const INTERRUPTED: &str = "interrupted";

/// Durable, insertion-ordered store of known hosts
pub struct ServerRegistry {
    path: PathBuf,
    hosts: RwLock<Vec<Host>>,
}

impl ServerRegistry {
    /// Load the registry from disk, creating an empty one if missing.
    ///
    /// Hosts left in `Connecting` or `Installing` by a previous process are
    /// surfaced as `Failed` with `last_error = "interrupted"` rather than
    /// silently resumed; a partially executed remote procedure must be
    /// re-verified by a fresh install request.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut hosts: Vec<Host> = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            Vec::new()
        };

        let mut swept = 0;
        for host in hosts.iter_mut() {
            if host.state.is_transient() {
                warn!(
                    host_id = %host.host_id,
                    state = %host.state,
                    "Host left mid-install by a previous run; marking failed"
                );
                host.mark_failed(INTERRUPTED);
                host.updated_at = Utc::now();
                swept += 1;
            }
        }

        let registry = Self {
            path,
            hosts: RwLock::new(hosts),
        };

        if swept > 0 {
            let hosts = registry.hosts.try_read().map_err(|_| {
                ProvisionError::config("registry lock unavailable during recovery")
            })?;
            registry.persist(&hosts)?;
            info!("Recovered {} interrupted host(s)", swept);
        }

        Ok(registry)
    }

    /// Register a new host. Fails with `Conflict` if the derived host id is
    /// already present; the existing record is left untouched.
    pub async fn register(&self, host: Host) -> Result<String> {
        let mut hosts = self.hosts.write().await;
        if hosts.iter().any(|h| h.host_id == host.host_id) {
            return Err(ProvisionError::Conflict(format!(
                "host {} is already registered",
                host.host_id
            )));
        }

        let host_id = host.host_id.clone();
        hosts.push(host);
        self.persist(&hosts)?;
        info!(host_id = %host_id, "Host registered");
        Ok(host_id)
    }

    /// Fetch a host record by id
    pub async fn get(&self, host_id: &str) -> Result<Host> {
        let hosts = self.hosts.read().await;
        hosts
            .iter()
            .find(|h| h.host_id == host_id)
            .cloned()
            .ok_or_else(|| ProvisionError::NotFound(format!("host {}", host_id)))
    }

    /// List all hosts in insertion order
    pub async fn list(&self) -> Vec<Host> {
        self.hosts.read().await.clone()
    }

    /// Apply a mutation to one host record atomically and persist it.
    /// `updated_at` is bumped on every call.
    pub async fn update<F>(&self, host_id: &str, mutator: F) -> Result<Host>
    where
        F: FnOnce(&mut Host),
    {
        let mut hosts = self.hosts.write().await;
        let host = hosts
            .iter_mut()
            .find(|h| h.host_id == host_id)
            .ok_or_else(|| ProvisionError::NotFound(format!("host {}", host_id)))?;

        mutator(host);
        host.updated_at = Utc::now();
        let updated = host.clone();
        self.persist(&hosts)?;
        debug!(host_id = %host_id, state = %updated.state, "Host updated");
        Ok(updated)
    }

    /// Remove a host record, returning it
    pub async fn remove(&self, host_id: &str) -> Result<Host> {
        let mut hosts = self.hosts.write().await;
        let index = hosts
            .iter()
            .position(|h| h.host_id == host_id)
            .ok_or_else(|| ProvisionError::NotFound(format!("host {}", host_id)))?;

        let host = hosts.remove(index);
        self.persist(&hosts)?;
        info!(host_id = %host_id, "Host removed");
        Ok(host)
    }

    fn persist(&self, hosts: &[Host]) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| ProvisionError::config("registry path has no parent"))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&mut tmp, hosts)?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| ProvisionError::Io(e.error))?;
        Ok(())
    }
}
