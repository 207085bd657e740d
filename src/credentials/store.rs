// file: src/credentials/store.rs
// version: 1.0.0
// guid: 4a8e2d90-6b1f-4c37-9de4-f52a7c081b36

//! Plaintext file backend for the credential store

use super::{CredentialRef, CredentialStore, Secret};
use crate::{ProvisionError, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// File-backed credential store.
///
/// Secrets are kept in a JSON map keyed by reference at `path`, rewritten
/// atomically on every mutation. The file is created with 0600 permissions
/// on Unix. Secret values never reach any log sink.
pub struct FileCredentialStore {
    path: PathBuf,
    secrets: Mutex<HashMap<CredentialRef, Secret>>,
}

impl FileCredentialStore {
    /// Open the store at `path`, creating an empty one if missing
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let secrets = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            HashMap::new()
        };

        debug!("Opened credential store at {}", path.display());
        Ok(Self {
            path,
            secrets: Mutex::new(secrets),
        })
    }

    fn persist(&self, secrets: &HashMap<CredentialRef, Secret>) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| ProvisionError::config("credential store path has no parent"))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&mut tmp, secrets)?;
        tmp.flush()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600))?;
        }

        tmp.persist(&self.path)
            .map_err(|e| ProvisionError::Io(e.error))?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn put(&self, secret: Secret) -> Result<CredentialRef> {
        let reference = Uuid::new_v4();
        let mut secrets = self
            .secrets
            .lock()
            .map_err(|_| ProvisionError::config("credential store lock poisoned"))?;
        secrets.insert(reference, secret);
        self.persist(&secrets)?;
        debug!("Stored credential {}", reference);
        Ok(reference)
    }

    fn get(&self, reference: &CredentialRef) -> Result<Secret> {
        let secrets = self
            .secrets
            .lock()
            .map_err(|_| ProvisionError::config("credential store lock poisoned"))?;
        secrets
            .get(reference)
            .cloned()
            .ok_or_else(|| ProvisionError::CredentialNotFound(reference.to_string()))
    }

    fn delete(&self, reference: &CredentialRef) -> Result<()> {
        let mut secrets = self
            .secrets
            .lock()
            .map_err(|_| ProvisionError::config("credential store lock poisoned"))?;
        if secrets.remove(reference).is_some() {
            self.persist(&secrets)?;
            debug!("Revoked credential {}", reference);
        }
        Ok(())
    }
}
