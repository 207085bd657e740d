// file: tests/integration_test.rs
// version: 1.1.0
// guid: 9c4f2e81-7a5d-4b36-90c8-d21e6f5a3b74

//! Integration tests for the panel agent
//!
//! A scripted session factory stands in for SSH so the full register /
//! install / list / credentials surface can be exercised, including the
//! concurrency and crash-recovery guarantees.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use panel_agent::config::{AgentConfig, InstallOptions, WaitPolicy};
use panel_agent::credentials::{FileCredentialStore, Secret};
use panel_agent::network::{CommandOutput, RemoteSession, SessionFactory};
use panel_agent::registry::{HostState, ServerRegistry};
use panel_agent::service::PanelService;
use panel_agent::{ErrorKind, ProvisionError, Result};
use tempfile::TempDir;

type Transcripts = Arc<Mutex<HashMap<String, Vec<String>>>>;

/// Scripted behavior for one mock host
#[derive(Clone)]
enum HostScript {
    /// Connection refused before authentication
    Unreachable,
    /// TCP fine, credentials rejected
    AuthReject,
    /// Clean install; the installer prints marker lines when scripted to,
    /// and the panel CLI optionally honors a password reset
    FreshInstall {
        marker_in_output: bool,
        install_delay: Duration,
        reset_password: Option<String>,
    },
    /// Idempotency probe hits; password optionally in the first fallback file
    AlreadyInstalled { password_file: Option<String> },
}

/// Session factory replaying [`HostScript`]s and recording transcripts
struct MockFactory {
    scripts: Mutex<HashMap<String, HostScript>>,
    transcripts: Transcripts,
    open_calls: AtomicU32,
}

impl MockFactory {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(HashMap::new()),
            transcripts: Arc::new(Mutex::new(HashMap::new())),
            open_calls: AtomicU32::new(0),
        })
    }

    fn script(&self, address: &str, script: HostScript) {
        self.scripts
            .lock()
            .unwrap()
            .insert(address.to_string(), script);
    }

    fn transcript(&self, address: &str) -> Vec<String> {
        self.transcripts
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default()
    }

    /// How many times the destructive installer pipe ran against a host
    fn install_runs(&self, address: &str) -> usize {
        self.transcript(address)
            .iter()
            .filter(|c| c.contains("| bash -"))
            .count()
    }

    fn open_calls(&self) -> u32 {
        self.open_calls.load(Ordering::SeqCst)
    }
}

impl SessionFactory for MockFactory {
    fn open(
        &self,
        address: &str,
        port: u16,
        username: &str,
        _secret: &Secret,
        _connect_timeout: Duration,
    ) -> Result<Box<dyn RemoteSession>> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or(HostScript::Unreachable);

        match script {
            HostScript::Unreachable => Err(ProvisionError::connection(format!(
                "Failed to connect to {}:{}: connection refused",
                address, port
            ))),
            HostScript::AuthReject => Err(ProvisionError::auth(format!(
                "authentication rejected for {}@{}:{}",
                username, address, port
            ))),
            script => Ok(Box::new(MockSession {
                address: address.to_string(),
                script,
                transcripts: Arc::clone(&self.transcripts),
            })),
        }
    }
}

struct MockSession {
    address: String,
    script: HostScript,
    transcripts: Transcripts,
}

impl RemoteSession for MockSession {
    fn run(&mut self, command: &str, _exec_timeout: Duration) -> Result<CommandOutput> {
        self.transcripts
            .lock()
            .unwrap()
            .entry(self.address.clone())
            .or_default()
            .push(command.to_string());

        let is_probe = command.contains("which fastpanel");
        let is_install = command.contains("| bash -");
        let is_password_read = command.starts_with("cat ");

        match &self.script {
            HostScript::FreshInstall {
                marker_in_output,
                install_delay,
                reset_password,
            } => {
                if is_install {
                    std::thread::sleep(*install_delay);
                    if *marker_in_output {
                        return Ok(ok(&format!(
                            "Installing panel...\nPanel URL: https://{}:8888\nPassword: xK9mQ2vL7pT4\n",
                            self.address
                        )));
                    }
                    return Ok(ok("installation finished\n"));
                }
                if is_probe {
                    // VERIFY also probes the binary; succeed only after the
                    // installer pipe has run
                    let installed = self.transcripts.lock().unwrap()[&self.address]
                        .iter()
                        .any(|c| c.contains("| bash -"));
                    return Ok(status(if installed { 0 } else { 1 }));
                }
                if command.contains("password reset") {
                    return match reset_password {
                        Some(password) => Ok(ok(&format!("New password: {}\n", password))),
                        None => Ok(status(1)),
                    };
                }
                if is_password_read {
                    return Ok(status(1));
                }
                Ok(status(0))
            }
            HostScript::AlreadyInstalled { password_file } => {
                if is_install {
                    panic!("installer pipe must not run on an already-installed host");
                }
                if is_probe {
                    return Ok(status(0));
                }
                if command.contains("admin.passwd") {
                    return match password_file {
                        Some(password) => Ok(ok(&format!("{}\n", password))),
                        None => Ok(status(1)),
                    };
                }
                if command.contains("password reset") {
                    return Ok(status(1));
                }
                if is_password_read {
                    return Ok(status(1));
                }
                if command.contains("--version") {
                    return Ok(ok("2.0.1\n"));
                }
                Ok(status(0))
            }
            _ => unreachable!("unconnectable scripts never yield sessions"),
        }
    }

    fn close(&mut self) {}
}

fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: 0,
    }
}

fn status(exit_code: i32) -> CommandOutput {
    CommandOutput {
        stdout: String::new(),
        stderr: String::new(),
        exit_code,
    }
}

fn make_service(dir: &TempDir, factory: Arc<MockFactory>) -> PanelService {
    let config = AgentConfig::with_data_dir(dir.path());
    let registry = Arc::new(ServerRegistry::open(config.registry_path()).unwrap());
    let credentials = Arc::new(FileCredentialStore::open(config.credentials_path()).unwrap());
    PanelService::new(config, registry, credentials, factory)
}

fn fast_options() -> InstallOptions {
    InstallOptions {
        max_attempts: 1,
        connect_timeout: Duration::from_secs(5),
        exec_timeout: Duration::from_secs(5),
        wait_policy: WaitPolicy::FailFast,
    }
}

#[tokio::test]
async fn test_register_then_list_shows_registered_host() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir, MockFactory::new());

    let host_id = service
        .register_host("10.0.0.5", 22, "root", Secret::new("pw"))
        .await
        .unwrap();
    assert_eq!(host_id, "10.0.0.5:22");

    let hosts = service.list_hosts().await;
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].host_id, "10.0.0.5:22");
    assert_eq!(hosts[0].state, HostState::Registered);
    assert!(hosts[0].admin_url.is_none());
}

#[tokio::test]
async fn test_duplicate_register_conflicts() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir, MockFactory::new());

    service
        .register_host("10.0.0.5", 22, "root", Secret::new("pw"))
        .await
        .unwrap();
    let result = service
        .register_host("10.0.0.5", 22, "admin", Secret::new("other"))
        .await;

    assert!(matches!(result, Err(ProvisionError::Conflict(_))));
    let hosts = service.list_hosts().await;
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].username, "root");
}

#[tokio::test]
async fn test_unreachable_host_ends_failed() {
    let dir = TempDir::new().unwrap();
    let factory = MockFactory::new();
    factory.script("10.0.0.9", HostScript::Unreachable);
    let service = make_service(&dir, Arc::clone(&factory));

    let host_id = service
        .register_host("10.0.0.9", 22, "root", Secret::new("pw"))
        .await
        .unwrap();
    let result = service.install_host(&host_id, fast_options()).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::Connection));
    assert!(result.admin_url.is_none());
    assert!(result.admin_password.is_none());

    let hosts = service.list_hosts().await;
    assert_eq!(hosts[0].state, HostState::Failed);
    let last_error = hosts[0].last_error.as_deref().unwrap();
    assert!(last_error.to_lowercase().contains("connect"));
    assert!(hosts[0].admin_url.is_none());
}

#[tokio::test]
async fn test_auth_failure_does_not_retry() {
    let dir = TempDir::new().unwrap();
    let factory = MockFactory::new();
    factory.script("10.0.0.6", HostScript::AuthReject);
    let service = make_service(&dir, Arc::clone(&factory));

    let host_id = service
        .register_host("10.0.0.6", 22, "root", Secret::new("wrong"))
        .await
        .unwrap();
    let options = InstallOptions {
        max_attempts: 3,
        ..fast_options()
    };
    let result = service.install_host(&host_id, options).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::Auth));
    // Rejected credentials abort immediately; no second connection attempt
    assert_eq!(factory.open_calls(), 1);
    assert_eq!(result.attempts, 1);

    let hosts = service.list_hosts().await;
    assert_eq!(hosts[0].state, HostState::Failed);
}

#[tokio::test]
async fn test_successful_install_scenario() {
    let dir = TempDir::new().unwrap();
    let factory = MockFactory::new();
    factory.script(
        "10.0.0.5",
        HostScript::FreshInstall {
            marker_in_output: true,
            install_delay: Duration::ZERO,
            reset_password: None,
        },
    );
    let service = make_service(&dir, Arc::clone(&factory));

    let host_id = service
        .register_host("10.0.0.5", 22, "root", Secret::new("pw"))
        .await
        .unwrap();
    let result = service.install_host(&host_id, fast_options()).await.unwrap();

    assert!(result.success);
    assert_eq!(result.admin_url.as_deref(), Some("https://10.0.0.5:8888"));
    let password = result.admin_password.unwrap();
    assert!(!password.is_empty());
    assert_eq!(password.expose(), "xK9mQ2vL7pT4");

    let hosts = service.list_hosts().await;
    assert_eq!(hosts[0].state, HostState::Installed);
    assert_eq!(hosts[0].admin_url.as_deref(), Some("https://10.0.0.5:8888"));

    let creds = service.get_credentials(&host_id).await.unwrap();
    assert_eq!(creds.admin_url, "https://10.0.0.5:8888");
    assert_eq!(creds.admin_password.expose(), "xK9mQ2vL7pT4");
}

#[tokio::test]
async fn test_second_install_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let factory = MockFactory::new();
    factory.script(
        "10.0.0.5",
        HostScript::FreshInstall {
            marker_in_output: true,
            install_delay: Duration::ZERO,
            reset_password: None,
        },
    );
    let service = make_service(&dir, Arc::clone(&factory));

    let host_id = service
        .register_host("10.0.0.5", 22, "root", Secret::new("pw"))
        .await
        .unwrap();
    let first = service.install_host(&host_id, fast_options()).await.unwrap();
    assert!(first.success);
    assert_eq!(factory.install_runs("10.0.0.5"), 1);

    // The panel now exists on the host; the probe short-circuits and the
    // destructive pipe must not run again
    factory.script(
        "10.0.0.5",
        HostScript::AlreadyInstalled {
            password_file: Some("xK9mQ2vL7pT4".to_string()),
        },
    );
    let second = service.install_host(&host_id, fast_options()).await.unwrap();

    assert!(second.success);
    assert_eq!(factory.install_runs("10.0.0.5"), 1);
    assert_eq!(
        service.list_hosts().await[0].state,
        HostState::Installed
    );
}

#[tokio::test]
async fn test_reinstall_keeps_stored_admin_password() {
    let dir = TempDir::new().unwrap();
    let factory = MockFactory::new();
    factory.script(
        "10.0.0.5",
        HostScript::FreshInstall {
            marker_in_output: true,
            install_delay: Duration::ZERO,
            reset_password: None,
        },
    );
    let service = make_service(&dir, Arc::clone(&factory));

    let host_id = service
        .register_host("10.0.0.5", 22, "root", Secret::new("pw"))
        .await
        .unwrap();
    service.install_host(&host_id, fast_options()).await.unwrap();
    assert_eq!(
        service
            .get_credentials(&host_id)
            .await
            .unwrap()
            .admin_password
            .expose(),
        "xK9mQ2vL7pT4"
    );

    // Re-install against a host whose password files are gone: the stored
    // password must survive the idempotent success
    factory.script(
        "10.0.0.5",
        HostScript::AlreadyInstalled {
            password_file: None,
        },
    );
    let second = service.install_host(&host_id, fast_options()).await.unwrap();
    assert!(second.success);
    assert!(second.note.is_none());

    let creds = service.get_credentials(&host_id).await.unwrap();
    assert_eq!(creds.admin_password.expose(), "xK9mQ2vL7pT4");

    // With a password on file, recovery never touches the host
    let transcript = factory.transcript("10.0.0.5");
    assert!(!transcript.iter().any(|c| c.starts_with("cat ")));
    assert!(!transcript.iter().any(|c| c.contains("password reset")));
}

#[tokio::test]
async fn test_reset_recovers_password_when_marker_and_files_miss() {
    let dir = TempDir::new().unwrap();
    let factory = MockFactory::new();
    factory.script(
        "10.0.0.8",
        HostScript::FreshInstall {
            marker_in_output: false,
            install_delay: Duration::ZERO,
            reset_password: Some("rT8wQ1zXp4Lm".to_string()),
        },
    );
    let service = make_service(&dir, Arc::clone(&factory));

    let host_id = service
        .register_host("10.0.0.8", 22, "root", Secret::new("pw"))
        .await
        .unwrap();
    let result = service.install_host(&host_id, fast_options()).await.unwrap();

    assert!(result.success);
    assert!(result.note.is_none());
    assert_eq!(result.admin_password.unwrap().expose(), "rT8wQ1zXp4Lm");

    let creds = service.get_credentials(&host_id).await.unwrap();
    assert_eq!(creds.admin_password.expose(), "rT8wQ1zXp4Lm");
}

#[tokio::test]
async fn test_install_without_marker_is_installed_with_note() {
    let dir = TempDir::new().unwrap();
    let factory = MockFactory::new();
    factory.script(
        "10.0.0.7",
        HostScript::FreshInstall {
            marker_in_output: false,
            install_delay: Duration::ZERO,
            reset_password: None,
        },
    );
    let service = make_service(&dir, Arc::clone(&factory));

    let host_id = service
        .register_host("10.0.0.7", 22, "root", Secret::new("pw"))
        .await
        .unwrap();
    let result = service.install_host(&host_id, fast_options()).await.unwrap();

    // The software is genuinely installed; a parse miss is advisory
    assert!(result.success);
    assert!(result.admin_password.is_none());
    assert!(result.note.is_some());
    assert_eq!(service.list_hosts().await[0].state, HostState::Installed);

    // Credentials were never recovered
    assert!(matches!(
        service.get_credentials(&host_id).await,
        Err(ProvisionError::NotReady(_))
    ));
}

#[tokio::test]
async fn test_get_credentials_before_install_is_not_ready() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir, MockFactory::new());
    let host_id = service
        .register_host("10.0.0.5", 22, "root", Secret::new("pw"))
        .await
        .unwrap();

    assert!(matches!(
        service.get_credentials(&host_id).await,
        Err(ProvisionError::NotReady(_))
    ));
    assert!(matches!(
        service.get_credentials("10.9.9.9:22").await,
        Err(ProvisionError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_concurrent_same_host_fails_fast_with_busy() {
    let dir = TempDir::new().unwrap();
    let factory = MockFactory::new();
    factory.script(
        "10.0.0.5",
        HostScript::FreshInstall {
            marker_in_output: true,
            install_delay: Duration::from_millis(400),
            reset_password: None,
        },
    );
    let service = Arc::new(make_service(&dir, Arc::clone(&factory)));

    let host_id = service
        .register_host("10.0.0.5", 22, "root", Secret::new("pw"))
        .await
        .unwrap();

    let background = {
        let service = Arc::clone(&service);
        let host_id = host_id.clone();
        tokio::spawn(async move { service.install_host(&host_id, fast_options()).await })
    };

    // Let the first install take the host lock and start running
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = service.install_host(&host_id, fast_options()).await;
    assert!(matches!(second, Err(ProvisionError::Busy(_))));

    let first = background.await.unwrap().unwrap();
    assert!(first.success);
    // Exactly one attempt ran the installer pipe
    assert_eq!(factory.install_runs("10.0.0.5"), 1);
}

#[tokio::test]
async fn test_concurrent_different_hosts_proceed_independently() {
    let dir = TempDir::new().unwrap();
    let factory = MockFactory::new();
    for address in ["10.0.0.5", "10.0.0.6"] {
        factory.script(
            address,
            HostScript::FreshInstall {
                marker_in_output: true,
                install_delay: Duration::from_millis(200),
                reset_password: None,
            },
        );
    }
    let service = Arc::new(make_service(&dir, Arc::clone(&factory)));

    let mut ids = Vec::new();
    for address in ["10.0.0.5", "10.0.0.6"] {
        ids.push(
            service
                .register_host(address, 22, "root", Secret::new("pw"))
                .await
                .unwrap(),
        );
    }

    let mut handles = Vec::new();
    for host_id in &ids {
        let service = Arc::clone(&service);
        let host_id = host_id.clone();
        handles.push(tokio::spawn(async move {
            service.install_host(&host_id, fast_options()).await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert!(result.success);
    }

    for host in service.list_hosts().await {
        assert_eq!(host.state, HostState::Installed);
    }
}

#[tokio::test]
async fn test_crash_recovery_sweeps_installing_hosts() {
    let dir = TempDir::new().unwrap();
    let config = AgentConfig::with_data_dir(dir.path());

    {
        let registry = ServerRegistry::open(config.registry_path()).unwrap();
        registry
            .register(panel_agent::registry::Host::new(
                "10.0.0.5",
                22,
                "root",
                uuid::Uuid::new_v4(),
            ))
            .await
            .unwrap();
        registry
            .update("10.0.0.5:22", |h| h.state = HostState::Installing)
            .await
            .unwrap();
        // Process "crashes" here: the record is persisted mid-install
    }

    let service = make_service(&dir, MockFactory::new());
    let hosts = service.list_hosts().await;
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].state, HostState::Failed);
    assert_eq!(hosts[0].last_error.as_deref(), Some("interrupted"));
}

#[tokio::test]
async fn test_remove_host_revokes_credentials() {
    let dir = TempDir::new().unwrap();
    let factory = MockFactory::new();
    factory.script(
        "10.0.0.5",
        HostScript::FreshInstall {
            marker_in_output: true,
            install_delay: Duration::ZERO,
            reset_password: None,
        },
    );
    let service = make_service(&dir, Arc::clone(&factory));

    let host_id = service
        .register_host("10.0.0.5", 22, "root", Secret::new("pw"))
        .await
        .unwrap();
    service.install_host(&host_id, fast_options()).await.unwrap();

    service.remove_host(&host_id).await.unwrap();
    assert!(service.list_hosts().await.is_empty());
    assert!(matches!(
        service.get_credentials(&host_id).await,
        Err(ProvisionError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_status_check_reports_services() {
    let dir = TempDir::new().unwrap();
    let factory = MockFactory::new();
    factory.script(
        "10.0.0.5",
        HostScript::AlreadyInstalled {
            password_file: Some("xK9mQ2vL7pT4".to_string()),
        },
    );
    let service = make_service(&dir, Arc::clone(&factory));

    let host_id = service
        .register_host("10.0.0.5", 22, "root", Secret::new("pw"))
        .await
        .unwrap();
    let status = service.check_host(&host_id, fast_options()).await.unwrap();

    assert!(status.installed);
    assert_eq!(status.version.as_deref(), Some("2.0.1"));
    assert_eq!(status.admin_url.as_deref(), Some("https://10.0.0.5:8888"));
    assert_eq!(status.services.len(), 4);
    assert!(status.services.iter().all(|(_, active)| *active));

    // A status check never mutates registry state
    assert_eq!(service.list_hosts().await[0].state, HostState::Registered);
}
