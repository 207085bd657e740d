// file: src/main.rs
// version: 1.0.0
// guid: 0b5e8c31-6d2f-4a97-85b0-e43f7a1d9c26

//! Panel Agent - Main entry point

use clap::Parser;
use panel_agent::{
    cli::{args::Cli, args::Commands, commands::*},
    logging::logger,
    Result,
};
use tokio::signal;
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logger::init_logger(cli.verbose, cli.quiet)?;

    let shutdown_signal = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        warn!("Received Ctrl+C, shutting down; interrupted installs will be swept on next start");
    };

    let data_dir = cli.data_dir.clone();
    let command_future = async {
        match cli.command {
            Commands::Register {
                address,
                port,
                username,
                password,
            } => register_command(data_dir, &address, port, &username, password).await,
            Commands::Install {
                host_id,
                max_attempts,
                connect_timeout,
                exec_timeout,
                wait,
            } => {
                install_command(
                    data_dir,
                    &host_id,
                    max_attempts,
                    connect_timeout,
                    exec_timeout,
                    wait,
                )
                .await
            }
            Commands::List { json } => list_command(data_dir, json).await,
            Commands::Credentials { host_id } => credentials_command(data_dir, &host_id).await,
            Commands::Status {
                host_id,
                connect_timeout,
            } => status_command(data_dir, &host_id, connect_timeout).await,
            Commands::Remove { host_id } => remove_command(data_dir, &host_id).await,
        }
    };

    tokio::select! {
        result = command_future => result,
        _ = shutdown_signal => {
            warn!("Application interrupted by user");
            std::process::exit(130); // Standard exit code for Ctrl+C
        }
    }
}
