// file: src/service.rs
// version: 1.1.0
// guid: 2d9b6e40-7f1c-4a85-93e2-c50a8d4b7f16

//! Service facade consumed by the CLI layer
//!
//! Owns the per-host exclusion scopes: installs against different hosts run
//! concurrently, while all operations against one host id are serialized.
//! The scope is acquired before the Connecting transition and released when
//! the attempt reaches Installed or Failed.

use crate::config::{AgentConfig, InstallOptions, WaitPolicy};
use crate::credentials::{CredentialStore, Secret};
use crate::network::SessionFactory;
use crate::provision::{InstallOrchestrator, InstallationResult, PanelStatus};
use crate::registry::{Host, HostState, ServerRegistry};
use crate::{ProvisionError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Display projection of a host record; never carries secrets
#[derive(Debug, Clone, serde::Serialize)]
pub struct HostSummary {
    pub host_id: String,
    pub address: String,
    pub port: u16,
    pub username: String,
    pub state: HostState,
    pub admin_url: Option<String>,
    pub last_error: Option<String>,
}

impl From<Host> for HostSummary {
    fn from(host: Host) -> Self {
        Self {
            host_id: host.host_id,
            address: host.address,
            port: host.port,
            username: host.username,
            state: host.state,
            admin_url: host.admin_url,
            last_error: host.last_error,
        }
    }
}

/// Admin credentials for an installed panel
#[derive(Debug)]
pub struct AdminCredentials {
    pub admin_url: String,
    pub admin_password: Secret,
}

/// Panel provisioning service
pub struct PanelService {
    registry: Arc<ServerRegistry>,
    credentials: Arc<dyn CredentialStore>,
    orchestrator: InstallOrchestrator,
    host_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PanelService {
    /// Assemble the service from explicitly constructed collaborators
    pub fn new(
        config: AgentConfig,
        registry: Arc<ServerRegistry>,
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        let orchestrator = InstallOrchestrator::new(
            config,
            Arc::clone(&registry),
            Arc::clone(&credentials),
            sessions,
        );
        Self {
            registry,
            credentials,
            orchestrator,
            host_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Register a host. The secret goes into the credential store first;
    /// the registry only ever sees the opaque reference.
    pub async fn register_host(
        &self,
        address: &str,
        port: u16,
        username: &str,
        secret: Secret,
    ) -> Result<String> {
        let credential_ref = self.credentials.put(secret)?;
        let host = Host::new(address, port, username, credential_ref);

        match self.registry.register(host).await {
            Ok(host_id) => Ok(host_id),
            Err(e) => {
                // Roll back the orphaned secret; the existing record and its
                // credential are left untouched
                let _ = self.credentials.delete(&credential_ref);
                Err(e)
            }
        }
    }

    /// Install the panel on a registered host
    pub async fn install_host(
        &self,
        host_id: &str,
        options: InstallOptions,
    ) -> Result<InstallationResult> {
        // Existence check before taking the lock so callers get NotFound
        // rather than Busy for unknown hosts
        self.registry.get(host_id).await?;

        let lock = self.host_lock(host_id).await;
        let _guard = match options.wait_policy {
            WaitPolicy::Wait => lock.lock().await,
            WaitPolicy::FailFast => lock.try_lock().map_err(|_| {
                ProvisionError::Busy(format!("install already in flight for {}", host_id))
            })?,
        };

        self.orchestrator.install(host_id, &options).await
    }

    /// List all registered hosts in insertion order
    pub async fn list_hosts(&self) -> Vec<HostSummary> {
        self.registry
            .list()
            .await
            .into_iter()
            .map(HostSummary::from)
            .collect()
    }

    /// Fetch stored admin credentials for an installed host
    pub async fn get_credentials(&self, host_id: &str) -> Result<AdminCredentials> {
        let host = self.registry.get(host_id).await?;

        if host.state != HostState::Installed {
            return Err(ProvisionError::NotReady(format!(
                "host {} is {}, not installed",
                host_id, host.state
            )));
        }

        let admin_url = host.admin_url.ok_or_else(|| {
            ProvisionError::NotReady(format!("host {} has no admin URL recorded", host_id))
        })?;
        let password_ref = host.admin_password_ref.ok_or_else(|| {
            ProvisionError::NotReady(format!(
                "admin password for {} was never recovered",
                host_id
            ))
        })?;

        Ok(AdminCredentials {
            admin_url,
            admin_password: self.credentials.get(&password_ref)?,
        })
    }

    /// Check the live installation state of a host without mutating it
    pub async fn check_host(&self, host_id: &str, options: InstallOptions) -> Result<PanelStatus> {
        let lock = self.host_lock(host_id).await;
        let _guard = match options.wait_policy {
            WaitPolicy::Wait => lock.lock().await,
            WaitPolicy::FailFast => lock.try_lock().map_err(|_| {
                ProvisionError::Busy(format!("install already in flight for {}", host_id))
            })?,
        };
        self.orchestrator.check(host_id, &options).await
    }

    /// Remove a host and revoke its stored secrets
    pub async fn remove_host(&self, host_id: &str) -> Result<()> {
        let lock = self.host_lock(host_id).await;
        let _guard = lock.lock().await;

        let host = self.registry.remove(host_id).await?;
        self.credentials.delete(&host.credential_ref)?;
        if let Some(password_ref) = host.admin_password_ref {
            self.credentials.delete(&password_ref)?;
        }

        self.host_locks.lock().await.remove(host_id);
        info!(host_id = %host_id, "Host and credentials removed");
        Ok(())
    }

    async fn host_lock(&self, host_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.host_locks.lock().await;
        Arc::clone(
            locks
                .entry(host_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}
