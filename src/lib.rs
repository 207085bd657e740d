// file: src/lib.rs
// version: 1.0.0
// guid: 3f8a1c2d-9b4e-4f60-8a7d-5c2e1b9d0f41

//! # Panel Agent
//!
//! Provisions the FastPanel hosting panel onto remote Linux hosts over SSH,
//! tracks each host's installation state in a durable registry, and keeps
//! discovered admin credentials behind opaque references.
//!
//! The crate is built around four collaborators: the credential store owns
//! secrets, the SSH session layer owns transports, the registry owns host
//! records, and the orchestrator drives the remote installation state machine.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod network;
pub mod provision;
pub mod registry;
pub mod service;

pub use error::{ErrorKind, ProvisionError, Result};

/// Version information for the agent
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
