//! Bearer credential persistence.
//!
//! The credential survives process restarts under a fixed key. Only the session store
//! holds a writable [`CredentialStore`]; everything else reads through [`CredentialReader`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::errors::ClientError;

/// Key under which the bearer credential is persisted.
pub const CREDENTIAL_KEY: &str = "auth_token";

/// Durable storage for the bearer credential.
pub trait CredentialStore: Send + Sync {
    /// Current credential, if one is persisted.
    fn load(&self) -> Option<String>;
    /// Persist a credential, replacing any previous one.
    fn save(&self, credential: &str) -> Result<(), ClientError>;
    /// Remove the persisted credential.
    fn clear(&self) -> Result<(), ClientError>;
}

/// Read-only view of a credential store, handed to the HTTP client.
#[derive(Clone)]
pub struct CredentialReader {
    store: Arc<dyn CredentialStore>,
}

impl CredentialReader {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Current credential, if any.
    pub fn credential(&self) -> Option<String> {
        self.store.load()
    }
}

/// Format a credential as an `Authorization` header value.
pub fn bearer_header(credential: &str) -> String {
    format!("Bearer {}", credential)
}

/// Credential store backed by a small JSON key-value file.
///
/// The file is read once on open; the in-memory copy is authoritative afterwards
/// and every write goes through to disk. Writes replace the file atomically and leave
/// it readable by the owner only.
pub struct FileCredentialStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileCredentialStore {
    /// Open (or lazily create) the store at the given path.
    ///
    /// An unreadable file is treated as empty; it is replaced on the next write.
    pub fn open(path: &Path) -> Result<Self, ClientError> {
        let entries = match std::fs::read_to_string(path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(
                    "Ignoring unreadable credential file {}: {}",
                    path.display(),
                    e
                );
                BTreeMap::new()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries: RwLock::new(entries),
        })
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(entries)?;
        let staging = self.staging_path();
        std::fs::write(&staging, contents)?;
        restrict_to_owner(&staging)?;
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Limit a credential file to its owner (0600 on unix).
fn restrict_to_owner(path: &Path) -> Result<(), ClientError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<String> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(CREDENTIAL_KEY).cloned())
    }

    fn save(&self, credential: &str) -> Result<(), ClientError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ClientError::Storage("Credential store lock poisoned".to_string()))?;
        let mut updated = entries.clone();
        updated.insert(CREDENTIAL_KEY.to_string(), credential.to_string());
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ClientError::Storage("Credential store lock poisoned".to_string()))?;
        if entries.remove(CREDENTIAL_KEY).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

/// Process-local credential store, used when nothing should touch the disk.
#[derive(Default)]
pub struct MemoryCredentialStore {
    credential: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: &str) -> Self {
        Self {
            credential: RwLock::new(Some(credential.to_string())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<String> {
        self.credential.read().ok().and_then(|c| c.clone())
    }

    fn save(&self, credential: &str) -> Result<(), ClientError> {
        let mut slot = self
            .credential
            .write()
            .map_err(|_| ClientError::Storage("Credential store lock poisoned".to_string()))?;
        *slot = Some(credential.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        let mut slot = self
            .credential
            .write()
            .map_err(|_| ClientError::Storage("Credential store lock poisoned".to_string()))?;
        *slot = None;
        Ok(())
    }
}
