// file: src/network/mod.rs
// version: 1.0.0
// guid: e5b09c73-2f4d-4a81-b6e0-97c3d8f12a54

//! Remote execution over SSH

pub mod session;
pub mod ssh;

pub use session::{CommandOutput, RemoteSession, SessionFactory};
pub use ssh::SshSessionFactory;
