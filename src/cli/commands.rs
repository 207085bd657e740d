// file: src/cli/commands.rs
// version: 1.0.0
// guid: 6a2d9f47-5e0b-4c83-b1f6-38d7a0c45e92

//! Command implementations
//!
//! Thin layer over [`PanelService`]: each function assembles the service,
//! runs one operation, and prints the outcome. Transport errors never reach
//! here; the service reports final results and registry errors only.

use crate::config::{AgentConfig, InstallOptions, WaitPolicy};
use crate::credentials::{FileCredentialStore, Secret};
use crate::network::SshSessionFactory;
use crate::registry::ServerRegistry;
use crate::service::PanelService;
use crate::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn build_service(data_dir: Option<PathBuf>) -> Result<PanelService> {
    let config = match data_dir {
        Some(dir) => AgentConfig::with_data_dir(dir),
        None => AgentConfig::default(),
    };

    let registry = Arc::new(ServerRegistry::open(config.registry_path())?);
    let credentials = Arc::new(FileCredentialStore::open(config.credentials_path())?);
    let sessions = Arc::new(SshSessionFactory::new());

    Ok(PanelService::new(config, registry, credentials, sessions))
}

/// Register a host
pub async fn register_command(
    data_dir: Option<PathBuf>,
    address: &str,
    port: u16,
    username: &str,
    password: String,
) -> Result<()> {
    let service = build_service(data_dir)?;
    let host_id = service
        .register_host(address, port, username, Secret::new(password))
        .await?;
    println!("Registered {}", host_id);
    Ok(())
}

/// Install the panel on a host
pub async fn install_command(
    data_dir: Option<PathBuf>,
    host_id: &str,
    max_attempts: u32,
    connect_timeout: u64,
    exec_timeout: u64,
    wait: bool,
) -> Result<()> {
    let service = build_service(data_dir)?;
    let options = InstallOptions {
        max_attempts,
        connect_timeout: Duration::from_secs(connect_timeout),
        exec_timeout: Duration::from_secs(exec_timeout),
        wait_policy: if wait {
            WaitPolicy::Wait
        } else {
            WaitPolicy::FailFast
        },
    };

    info!("Starting install for {}", host_id);
    let result = service.install_host(host_id, options).await?;

    if result.success {
        println!("Installation succeeded after {} attempt(s)", result.attempts);
        if let Some(url) = &result.admin_url {
            println!("Admin URL: {}", url);
        }
        match &result.admin_password {
            Some(password) => println!("Admin password: {}", password.expose()),
            None => println!("Admin password: not recovered (see `credentials` later)"),
        }
        if let Some(note) = &result.note {
            println!("Note: {}", note);
        }
    } else {
        let kind = result
            .error_kind
            .map(|k| k.as_str())
            .unwrap_or("internal");
        println!("Installation failed ({})", kind);
        if let Some(note) = &result.note {
            println!("Error: {}", note);
        }
        std::process::exit(1);
    }

    Ok(())
}

/// List registered hosts
pub async fn list_command(data_dir: Option<PathBuf>, json: bool) -> Result<()> {
    let service = build_service(data_dir)?;
    let hosts = service.list_hosts().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&hosts)?);
        return Ok(());
    }

    if hosts.is_empty() {
        println!("No hosts registered");
        return Ok(());
    }

    println!(
        "{:<22} {:<10} {:<12} {:<28} {}",
        "HOST", "USER", "STATE", "ADMIN URL", "LAST ERROR"
    );
    for host in hosts {
        println!(
            "{:<22} {:<10} {:<12} {:<28} {}",
            host.host_id,
            host.username,
            host.state.as_str(),
            host.admin_url.as_deref().unwrap_or("-"),
            host.last_error.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

/// Show stored admin credentials
pub async fn credentials_command(data_dir: Option<PathBuf>, host_id: &str) -> Result<()> {
    let service = build_service(data_dir)?;
    let creds = service.get_credentials(host_id).await?;
    println!("Admin URL: {}", creds.admin_url);
    println!("Admin password: {}", creds.admin_password.expose());
    Ok(())
}

/// Check the live installation on a host
pub async fn status_command(
    data_dir: Option<PathBuf>,
    host_id: &str,
    connect_timeout: u64,
) -> Result<()> {
    let service = build_service(data_dir)?;
    let options = InstallOptions {
        connect_timeout: Duration::from_secs(connect_timeout),
        ..Default::default()
    };

    let status = service.check_host(host_id, options).await?;
    if !status.installed {
        println!("{}: panel not installed", host_id);
        return Ok(());
    }

    println!("{}: panel installed", host_id);
    if let Some(version) = &status.version {
        println!("Version: {}", version);
    }
    if let Some(url) = &status.admin_url {
        println!("Admin URL: {}", url);
    }
    for (service_name, active) in &status.services {
        println!(
            "  {:<10} {}",
            service_name,
            if *active { "active" } else { "inactive" }
        );
    }
    Ok(())
}

/// Remove a host and its secrets
pub async fn remove_command(data_dir: Option<PathBuf>, host_id: &str) -> Result<()> {
    let service = build_service(data_dir)?;
    service.remove_host(host_id).await?;
    println!("Removed {}", host_id);
    Ok(())
}
