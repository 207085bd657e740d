// file: src/network/ssh.rs
// version: 1.2.0
// guid: 8e24b7d1-0c5f-4936-ae18-6d92f4b0c375

//! SSH session implementation backed by libssh2

use super::session::{CommandOutput, RemoteSession, SessionFactory};
use crate::credentials::Secret;
use crate::{ProvisionError, Result};
use ssh2::Session;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info};

// libssh2 error code surfaced when a blocking call hits the session timeout
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;

/// Opens password-authenticated SSH sessions
pub struct SshSessionFactory;

impl SshSessionFactory {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SshSessionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionFactory for SshSessionFactory {
    fn open(
        &self,
        address: &str,
        port: u16,
        username: &str,
        secret: &Secret,
        connect_timeout: Duration,
    ) -> Result<Box<dyn RemoteSession>> {
        info!("Connecting to {}:{} as {}", address, port, username);

        let addr = (address, port)
            .to_socket_addrs()
            .map_err(|e| {
                ProvisionError::connection(format!("Failed to resolve {}: {}", address, e))
            })?
            .next()
            .ok_or_else(|| {
                ProvisionError::connection(format!("No address resolved for {}", address))
            })?;

        let tcp = TcpStream::connect_timeout(&addr, connect_timeout).map_err(|e| {
            ProvisionError::connection(format!("Failed to connect to {}:{}: {}", address, port, e))
        })?;

        let mut session = Session::new().map_err(|e| {
            ProvisionError::connection(format!("Failed to create SSH session: {}", e))
        })?;

        session.set_tcp_stream(tcp);
        session.set_timeout(duration_ms(connect_timeout));
        session.handshake().map_err(|e| {
            ProvisionError::connection(format!("SSH handshake with {} failed: {}", address, e))
        })?;

        session
            .userauth_password(username, secret.expose())
            .map_err(|_| {
                ProvisionError::auth(format!(
                    "authentication rejected for {}@{}:{}",
                    username, address, port
                ))
            })?;

        if !session.authenticated() {
            return Err(ProvisionError::auth(format!(
                "authentication rejected for {}@{}:{}",
                username, address, port
            )));
        }

        info!("SSH connection established to {}:{}", address, port);
        Ok(Box::new(SshSession {
            session: Some(session),
            host: format!("{}:{}", address, port),
        }))
    }
}

/// One authenticated SSH session
pub struct SshSession {
    session: Option<Session>,
    host: String,
}

impl RemoteSession for SshSession {
    fn run(&mut self, command: &str, exec_timeout: Duration) -> Result<CommandOutput> {
        debug!("Executing on {}: {}", self.host, command);

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| ProvisionError::connection("No active SSH session".to_string()))?;

        session.set_timeout(duration_ms(exec_timeout));

        let mut channel = session
            .channel_session()
            .map_err(|e| map_exec_err(e, command, "Failed to create SSH channel"))?;

        channel
            .exec(command)
            .map_err(|e| map_exec_err(e, command, "Failed to execute command"))?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        channel
            .read_to_string(&mut stdout)
            .map_err(|e| map_io_err(e, command, "Failed to read stdout"))?;
        channel
            .stderr()
            .read_to_string(&mut stderr)
            .map_err(|e| map_io_err(e, command, "Failed to read stderr"))?;

        channel
            .wait_close()
            .map_err(|e| map_exec_err(e, command, "Failed to close SSH channel"))?;

        let exit_code = channel
            .exit_status()
            .map_err(|e| map_exec_err(e, command, "Failed to get exit status"))?;

        debug!("Command on {} exited with {}", self.host, exit_code);
        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
        })
    }

    fn close(&mut self) {
        if let Some(session) = self.session.take() {
            let _ = session.disconnect(None, "", None);
            debug!("SSH session to {} disconnected", self.host);
        }
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn duration_ms(duration: Duration) -> u32 {
    duration.as_millis().min(u32::MAX as u128) as u32
}

fn map_exec_err(e: ssh2::Error, command: &str, context: &str) -> ProvisionError {
    if matches!(e.code(), ssh2::ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT)) {
        ProvisionError::timeout(format!("Command timed out: {}", command))
    } else {
        ProvisionError::connection(format!("{}: {}", context, e))
    }
}

fn map_io_err(e: std::io::Error, command: &str, context: &str) -> ProvisionError {
    if e.kind() == std::io::ErrorKind::TimedOut || e.kind() == std::io::ErrorKind::WouldBlock {
        ProvisionError::timeout(format!("Command timed out: {}", command))
    } else {
        ProvisionError::connection(format!("{}: {}", context, e))
    }
}
