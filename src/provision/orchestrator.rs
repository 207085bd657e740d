// file: src/provision/orchestrator.rs
// version: 1.2.0
// guid: f3a8d517-2c6e-4b94-a071-8e5d3b9f6c24

//! Installation state machine driver
//!
//! States: Registered -> Connecting -> Installing -> Installed, with Failed
//! as the re-enterable terminal per attempt. Connection attempts are bounded
//! by the caller's `max_attempts` with doubling backoff; an authentication
//! rejection aborts immediately since retrying without new credentials
//! cannot succeed. The orchestrator is the only place retryability is
//! decided and `last_error` is recorded.

use super::marker;
use super::steps::{self, Step};
use super::{InstallationResult, PanelStatus};
use crate::config::{AgentConfig, InstallOptions};
use crate::credentials::{CredentialStore, Secret};
use crate::network::{RemoteSession, SessionFactory};
use crate::registry::{Host, HostState, ServerRegistry};
use crate::{ProvisionError, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Tail length kept from remote output in results
const MAX_RAW_OUTPUT: usize = 4096;

/// What one remote attempt produced, before folding into the registry
struct RemoteOutcome {
    already_installed: bool,
    raw_output: String,
    parsed_admin_url: Option<String>,
    admin_password: Option<String>,
    parse_note: Option<String>,
}

/// Drives installs against registered hosts
pub struct InstallOrchestrator {
    config: AgentConfig,
    registry: Arc<ServerRegistry>,
    credentials: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionFactory>,
}

impl InstallOrchestrator {
    pub fn new(
        config: AgentConfig,
        registry: Arc<ServerRegistry>,
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        Self {
            config,
            registry,
            credentials,
            sessions,
        }
    }

    /// Run one install request against a host.
    ///
    /// Callers must hold the per-host exclusion scope (the service layer
    /// does); at most one invocation per host may be in flight. Attempt
    /// failures are reported inside the returned result; `Err` is reserved
    /// for registry-level problems such as an unknown host.
    pub async fn install(&self, host_id: &str, options: &InstallOptions) -> Result<InstallationResult> {
        let start = Instant::now();
        let host = self.registry.get(host_id).await?;
        let secret = self.credentials.get(&host.credential_ref)?;

        self.transition(host_id, HostState::Connecting).await?;

        let mut attempts = 0;
        let session = loop {
            attempts += 1;
            match self
                .open_session(&host, &secret, options.connect_timeout)
                .await
            {
                Ok(session) => {
                    step_event(host_id, Step::Connect, "ok");
                    break session;
                }
                Err(e) => {
                    step_event(host_id, Step::Connect, "failed");
                    if !e.is_retryable() || attempts >= options.max_attempts {
                        return self.fold_failure(host_id, e, attempts, start).await;
                    }
                    tokio::time::sleep(backoff(attempts)).await;
                }
            }
        };

        self.transition(host_id, HostState::Installing).await?;

        let install_cmd = steps::install_command(&self.config.install_url);
        let exec_timeout = options.exec_timeout;
        let id = host.host_id.clone();
        let have_stored_password = host.admin_password_ref.is_some();
        let outcome = tokio::task::spawn_blocking(move || {
            run_install_steps(session, &id, install_cmd, have_stored_password, exec_timeout)
        })
        .await
        .map_err(|e| ProvisionError::Interrupted(format!("install task aborted: {}", e)))?;

        match outcome {
            Ok(remote) => self.fold_success(&host, remote, attempts, start).await,
            Err(e) => self.fold_failure(host_id, e, attempts, start).await,
        }
    }

    /// Non-mutating check of a host's panel installation
    pub async fn check(&self, host_id: &str, options: &InstallOptions) -> Result<PanelStatus> {
        let host = self.registry.get(host_id).await?;
        let secret = self.credentials.get(&host.credential_ref)?;

        let session = self
            .open_session(&host, &secret, options.connect_timeout)
            .await?;

        let admin_url = self.config.admin_url_for(&host.address);
        let exec_timeout = options.exec_timeout;
        tokio::task::spawn_blocking(move || run_status_checks(session, admin_url, exec_timeout))
            .await
            .map_err(|e| ProvisionError::Interrupted(format!("status task aborted: {}", e)))?
    }

    async fn open_session(
        &self,
        host: &Host,
        secret: &Secret,
        connect_timeout: Duration,
    ) -> Result<Box<dyn RemoteSession>> {
        let factory = Arc::clone(&self.sessions);
        let address = host.address.clone();
        let port = host.port;
        let username = host.username.clone();
        let secret = secret.clone();
        tokio::task::spawn_blocking(move || {
            factory.open(&address, port, &username, &secret, connect_timeout)
        })
        .await
        .map_err(|e| ProvisionError::Interrupted(format!("connect task aborted: {}", e)))?
    }

    async fn transition(&self, host_id: &str, state: HostState) -> Result<()> {
        self.registry
            .update(host_id, |h| {
                h.state = state;
            })
            .await?;
        info!(
            host_id = %host_id,
            step = "transition",
            outcome = state.as_str(),
            "host state changed"
        );
        Ok(())
    }

    async fn fold_success(
        &self,
        host: &Host,
        remote: RemoteOutcome,
        attempts: u32,
        start: Instant,
    ) -> Result<InstallationResult> {
        let admin_url = remote
            .parsed_admin_url
            .unwrap_or_else(|| self.config.admin_url_for(&host.address));

        // A re-install that recovered nothing keeps the stored password ref;
        // credentials already on file must survive an idempotent success.
        let previous_ref = self.registry.get(&host.host_id).await?.admin_password_ref;
        let password_ref = match &remote.admin_password {
            Some(password) => {
                let new_ref = self.credentials.put(Secret::new(password.clone()))?;
                if let Some(old_ref) = previous_ref {
                    self.credentials.delete(&old_ref)?;
                }
                Some(new_ref)
            }
            None => previous_ref,
        };

        let note = if password_ref.is_some() {
            None
        } else {
            remote.parse_note
        };
        {
            let admin_url = admin_url.clone();
            let note = note.clone();
            self.registry
                .update(&host.host_id, move |h| {
                    h.mark_installed(admin_url, password_ref, note);
                })
                .await?;
        }

        let outcome = if remote.already_installed {
            "already_installed"
        } else {
            "ok"
        };
        step_event(&host.host_id, Step::Install, outcome);

        Ok(InstallationResult {
            success: true,
            admin_url: Some(admin_url),
            admin_password: remote.admin_password.map(Secret::new),
            raw_output: remote.raw_output,
            error_kind: None,
            duration: start.elapsed(),
            attempts,
            note,
        })
    }

    async fn fold_failure(
        &self,
        host_id: &str,
        error: ProvisionError,
        attempts: u32,
        start: Instant,
    ) -> Result<InstallationResult> {
        let message = error.to_string();
        {
            let message = message.clone();
            self.registry
                .update(host_id, move |h| {
                    h.mark_failed(message);
                })
                .await?;
        }
        step_event(host_id, Step::Install, "failed");

        Ok(InstallationResult {
            success: false,
            admin_url: None,
            admin_password: None,
            raw_output: String::new(),
            error_kind: Some(error.kind()),
            duration: start.elapsed(),
            attempts,
            note: Some(message),
        })
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(4))
}

fn step_event(host_id: &str, step: Step, outcome: &str) {
    info!(
        host_id = %host_id,
        step = step.as_str(),
        outcome = outcome,
        "provision step"
    );
}

/// Execute the fixed step sequence over one session. Blocking; runs under
/// `spawn_blocking`. The session is closed on every exit path.
fn run_install_steps(
    mut session: Box<dyn RemoteSession>,
    host_id: &str,
    install_cmd: String,
    have_stored_password: bool,
    exec_timeout: Duration,
) -> Result<RemoteOutcome> {
    let result = install_steps_inner(
        session.as_mut(),
        host_id,
        &install_cmd,
        have_stored_password,
        exec_timeout,
    );
    session.close();
    result
}

fn install_steps_inner(
    session: &mut dyn RemoteSession,
    host_id: &str,
    install_cmd: &str,
    have_stored_password: bool,
    exec_timeout: Duration,
) -> Result<RemoteOutcome> {
    // Pre-flight: required tooling on the target
    let preflight = session.run(steps::PREFLIGHT, exec_timeout)?;
    if !preflight.success() {
        step_event(host_id, Step::Preflight, "failed");
        return Err(ProvisionError::InstallScript {
            exit_code: preflight.exit_code,
            detail: "pre-flight check failed: wget or systemctl missing on target".to_string(),
        });
    }
    step_event(host_id, Step::Preflight, "ok");

    // Idempotency probe: an existing installation short-circuits to success
    // without re-running destructive steps
    let probe = session.run(steps::ALREADY_INSTALLED, exec_timeout)?;
    if probe.success() {
        step_event(host_id, Step::IdempotencyCheck, "already_installed");
        // Recovery would rotate the admin password as a last resort, so it
        // only runs when no password is on file
        let admin_password = if have_stored_password {
            None
        } else {
            recover_admin_password(session, exec_timeout)?
        };
        let parse_note = (admin_password.is_none() && !have_stored_password)
            .then(|| "panel already installed; admin password not recoverable".to_string());
        return Ok(RemoteOutcome {
            already_installed: true,
            raw_output: "panel already installed".to_string(),
            parsed_admin_url: None,
            admin_password,
            parse_note,
        });
    }

    // Installer pipe
    let install = session.run(install_cmd, exec_timeout)?;
    let raw_output = truncate_tail(
        &format!("{}\n{}", install.stdout, install.stderr),
        MAX_RAW_OUTPUT,
    );
    if !install.success() {
        let detail = if install.stderr.trim().is_empty() {
            truncate_tail(&install.stdout, 400)
        } else {
            truncate_tail(&install.stderr, 400)
        };
        return Err(ProvisionError::InstallScript {
            exit_code: install.exit_code,
            detail,
        });
    }

    // Post-install verification
    let verify = session.run(steps::VERIFY, exec_timeout)?;
    if !verify.success() {
        step_event(host_id, Step::Verify, "failed");
        return Err(ProvisionError::InstallScript {
            exit_code: verify.exit_code,
            detail: "panel service not active after installation".to_string(),
        });
    }
    step_event(host_id, Step::Verify, "ok");

    // Credential extraction: marker line first, password files as fallback.
    // A parse miss is advisory, never a failed install.
    let parsed = marker::parse_output(&install.stdout);
    let admin_password = match parsed.admin_password {
        Some(password) => Some(password),
        None => recover_admin_password(session, exec_timeout)?,
    };
    let outcome = if admin_password.is_some() { "ok" } else { "missing" };
    step_event(host_id, Step::ExtractCredentials, outcome);
    let parse_note = admin_password
        .is_none()
        .then(|| "installed, but admin password could not be parsed from output".to_string());

    Ok(RemoteOutcome {
        already_installed: false,
        raw_output,
        parsed_admin_url: parsed.admin_url,
        admin_password,
        parse_note,
    })
}

fn recover_admin_password(
    session: &mut dyn RemoteSession,
    exec_timeout: Duration,
) -> Result<Option<String>> {
    for path in steps::PASSWORD_FILES {
        let output = session.run(&steps::read_password_file(path), exec_timeout)?;
        if output.success() {
            let candidate = output.stdout.trim();
            if !candidate.is_empty() {
                return Ok(Some(candidate.to_string()));
            }
        }
    }

    // Last resort: rotate the password through the panel CLI and read the
    // new one from its output
    let reset = session.run(steps::RESET_ADMIN_PASSWORD, exec_timeout)?;
    if reset.success() {
        if let Some(password) = marker::parse_output(&reset.stdout).admin_password {
            return Ok(Some(password));
        }
    }
    Ok(None)
}

fn run_status_checks(
    mut session: Box<dyn RemoteSession>,
    admin_url: String,
    exec_timeout: Duration,
) -> Result<PanelStatus> {
    let result = status_checks_inner(session.as_mut(), admin_url, exec_timeout);
    session.close();
    result
}

fn status_checks_inner(
    session: &mut dyn RemoteSession,
    admin_url: String,
    exec_timeout: Duration,
) -> Result<PanelStatus> {
    let installed = session.run(steps::ALREADY_INSTALLED, exec_timeout)?.success();
    if !installed {
        return Ok(PanelStatus {
            installed: false,
            version: None,
            admin_url: None,
            services: Vec::new(),
        });
    }

    let version_out = session.run(steps::VERSION, exec_timeout)?;
    let version = match version_out.stdout.trim() {
        "" | "unknown" => None,
        v => Some(v.to_string()),
    };

    let mut services = Vec::new();
    for service in steps::PANEL_SERVICES {
        let active = session
            .run(&steps::service_active(service), exec_timeout)?
            .success();
        services.push((service.to_string(), active));
    }

    Ok(PanelStatus {
        installed: true,
        version,
        admin_url: Some(admin_url),
        services,
    })
}

fn truncate_tail(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &s[start..])
}
