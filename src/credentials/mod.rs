// file: src/credentials/mod.rs
// version: 1.0.0
// guid: 9d2c6f81-3e7a-4b50-bc19-84f0a5d3e267

//! Credential storage behind opaque references
//!
//! Callers and the registry only ever handle `CredentialRef` handles; raw
//! secrets live inside the store backend. The backend is pluggable so the
//! plaintext file store can be swapped for an encrypted one without touching
//! the contract.

pub mod store;

pub use store::FileCredentialStore;

use crate::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque handle to a stored secret
pub type CredentialRef = Uuid;

/// A secret value that refuses to print itself.
///
/// `Debug` and `Display` are redacted; the raw value is reachable only
/// through [`Secret::expose`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a raw secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value. Keep call sites narrow: SSH authentication
    /// and explicit credential display only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(****)")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("****")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Storage contract for connection and admin secrets
pub trait CredentialStore: Send + Sync {
    /// Store a secret, returning an opaque reference to it
    fn put(&self, secret: Secret) -> Result<CredentialRef>;

    /// Fetch a secret by reference; fails with `CredentialNotFound` for
    /// unknown or revoked references
    fn get(&self, reference: &CredentialRef) -> Result<Secret>;

    /// Revoke a secret. Deleting an unknown reference is not an error.
    fn delete(&self, reference: &CredentialRef) -> Result<()>;
}
