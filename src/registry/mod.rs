// file: src/registry/mod.rs
// version: 1.0.0
// guid: 6f1d8b24-9a3c-4e75-b082-5c7e9f4a1d36

//! Durable host registry

pub mod host;
pub mod store;

pub use host::{Host, HostState};
pub use store::ServerRegistry;

/// Derive the registry key for a host endpoint.
///
/// The pair (address, port) identifies a host; the derived id is stable,
/// human-readable, and unique across the registry.
pub fn host_id(address: &str, port: u16) -> String {
    format!("{}:{}", address, port)
}
