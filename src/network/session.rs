// file: src/network/session.rs
// version: 1.0.0
// guid: 1c6f3a82-7d90-4b5e-8f24-a3e6b1d45c09

//! Remote session contract
//!
//! One factory call performs exactly one connection attempt, and one `run`
//! call performs exactly one command execution. Retries and backoff belong
//! to the orchestrator so no hidden retry can mask a failure.

use crate::credentials::Secret;
use crate::Result;
use std::time::Duration;

/// Captured result of one remote command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Whether the command exited with status 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A live, authenticated command-execution channel to one host.
///
/// The session is the unit of serialization: callers must not interleave
/// commands for one host across sessions.
pub trait RemoteSession: Send {
    /// Run a command, blocking up to `exec_timeout`. Fails with `Timeout`
    /// if the command does not complete in time; the transport is released
    /// on every failure path.
    fn run(&mut self, command: &str, exec_timeout: Duration) -> Result<CommandOutput>;

    /// Release the underlying transport. Safe to call multiple times.
    fn close(&mut self);
}

/// Opens authenticated sessions. Fails with `Connection` when the host is
/// unreachable and `Auth` when the credentials are rejected, in both cases
/// within `connect_timeout`.
pub trait SessionFactory: Send + Sync {
    fn open(
        &self,
        address: &str,
        port: u16,
        username: &str,
        secret: &Secret,
        connect_timeout: Duration,
    ) -> Result<Box<dyn RemoteSession>>;
}
