// file: src/cli/args.rs
// version: 1.0.0
// guid: 93f6a1c8-2b7d-4e50-8a94-d05c3f7e2b61

//! Command line argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "panel-agent")]
#[command(about = "Provision the FastPanel hosting panel onto remote hosts over SSH")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[arg(
        long,
        global = true,
        env = "PANEL_AGENT_DATA_DIR",
        help = "Directory for the registry and credential files"
    )]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a host for provisioning
    Register {
        #[arg(help = "IP address or hostname")]
        address: String,

        #[arg(short, long, default_value_t = 22)]
        port: u16,

        #[arg(short, long, default_value = "root")]
        username: String,

        #[arg(
            long,
            env = "PANEL_AGENT_SSH_PASSWORD",
            hide_env_values = true,
            help = "SSH password for the host"
        )]
        password: String,
    },

    /// Install the panel on a registered host
    Install {
        #[arg(help = "Host id as shown by list, e.g. 10.0.0.5:22")]
        host_id: String,

        #[arg(long, default_value_t = 3)]
        max_attempts: u32,

        #[arg(long, default_value_t = 30, help = "SSH connect timeout in seconds")]
        connect_timeout: u64,

        #[arg(long, default_value_t = 900, help = "Per-step timeout in seconds")]
        exec_timeout: u64,

        #[arg(long, help = "Wait for an in-flight install instead of failing fast")]
        wait: bool,
    },

    /// List registered hosts and their states
    List {
        #[arg(short, long)]
        json: bool,
    },

    /// Show stored admin credentials for an installed host
    Credentials {
        host_id: String,
    },

    /// Check the live panel installation on a host
    Status {
        host_id: String,

        #[arg(long, default_value_t = 30, help = "SSH connect timeout in seconds")]
        connect_timeout: u64,
    },

    /// Remove a host and revoke its stored secrets
    Remove {
        host_id: String,
    },
}
