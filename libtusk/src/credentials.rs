//! Credential storage
//!
//! Access tokens are the only state that survives a restart. They live in a
//! [`CredentialStore`] under a small fixed layout managed by [`AccountVault`]:
//!
//! - `access_tokens`: comma-separated list of account keys
//! - `{key}.token`: the OAuth access token for that account
//! - `{key}.instance`: the instance host the token belongs to
//!
//! Account keys are random v4 UUIDs and carry no meaning.
//!
//! Three backends exist: the OS keyring (default), a TOML file readable only
//! by the owner, and an in-memory map for tests and ephemeral sessions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::{CredentialConfig, StorageBackend};
use crate::error::CredentialError;

pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Keyring service name for every entry.
pub const KEYRING_SERVICE: &str = "tusk";

/// Key of the account index.
pub const ACCOUNT_INDEX_KEY: &str = "access_tokens";

/// Synchronous, local key/value storage for secrets.
pub trait CredentialStore: Send + Sync {
    /// Read a value; a missing key is `Ok(None)`.
    fn get(&self, key: &str) -> CredentialResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> CredentialResult<()>;

    /// Remove a value. Deleting a missing key succeeds.
    fn delete(&self, key: &str) -> CredentialResult<()>;

    fn backend_name(&self) -> &str;
}

/// OS keyring backend.
pub struct KeyringStore;

impl KeyringStore {
    /// Fails with `KeyringUnavailable` when no keyring service can be reached.
    pub fn new() -> CredentialResult<Self> {
        keyring::Entry::new(KEYRING_SERVICE, "availability_check")
            .map(|_| Self)
            .map_err(|e| CredentialError::KeyringUnavailable(format!("OS keyring not accessible: {}", e)))
    }

    fn entry(key: &str) -> CredentialResult<keyring::Entry> {
        keyring::Entry::new(KEYRING_SERVICE, key)
            .map_err(|e| CredentialError::KeyringUnavailable(e.to_string()))
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self, key: &str) -> CredentialResult<Option<String>> {
        match Self::entry(key)?.get_password() {
            Ok(value) => {
                tracing::debug!("Retrieved {} from OS keyring", key);
                Ok(Some(value))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(CredentialError::Keyring(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> CredentialResult<()> {
        Self::entry(key)?
            .set_password(value)
            .map_err(|e| CredentialError::Keyring(e.to_string()))?;
        tracing::debug!("Stored {} in OS keyring", key);
        Ok(())
    }

    fn delete(&self, key: &str) -> CredentialResult<()> {
        match Self::entry(key)?.delete_password() {
            Ok(()) => {
                tracing::debug!("Deleted {} from OS keyring", key);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                tracing::debug!("{} not in OS keyring (already deleted)", key);
                Ok(())
            }
            Err(e) => Err(CredentialError::Keyring(e.to_string())),
        }
    }

    fn backend_name(&self) -> &str {
        "keyring"
    }
}

/// Plain TOML file of key/value pairs, mode 0600 on unix.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> CredentialResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| self.file_error(e))?;
        toml::from_str(&content).map_err(|e| self.file_error(e))
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> CredentialResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.file_error(e))?;
        }
        let content = toml::to_string(values).map_err(|e| self.file_error(e))?;
        std::fs::write(&self.path, content).map_err(|e| self.file_error(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| self.file_error(e))?;
        }
        Ok(())
    }

    fn file_error(&self, error: impl std::fmt::Display) -> CredentialError {
        CredentialError::File(format!("{}: {}", self.path.display(), error))
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> CredentialResult<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> CredentialResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)?;
        tracing::debug!("Stored {} in {}", key, self.path.display());
        Ok(())
    }

    fn delete(&self, key: &str) -> CredentialResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.read_all()?;
        if values.remove(key).is_some() {
            self.write_all(&values)?;
        }
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "file"
    }
}

/// Process-local store, gone on exit.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored key, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> CredentialResult<Option<String>> {
        Ok(self.values.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CredentialResult<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> CredentialResult<()> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

/// Open the configured backend.
///
/// The keyring backend falls back to the credential file when the OS keyring
/// is unavailable (e.g. headless Linux without Secret Service).
pub fn open_store(config: &CredentialConfig) -> Arc<dyn CredentialStore> {
    match config.storage {
        StorageBackend::Keyring => match KeyringStore::new() {
            Ok(store) => {
                tracing::info!("Using OS keyring for credential storage");
                Arc::new(store)
            }
            Err(e) => {
                tracing::warn!("{}. Falling back to {}", e, config.expanded_path().display());
                Arc::new(FileStore::new(config.expanded_path()))
            }
        },
        StorageBackend::File => Arc::new(FileStore::new(config.expanded_path())),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    }
}

/// Credentials stored for one account. Either half may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoredAuth {
    pub token: Option<String>,
    pub instance: Option<String>,
}

impl StoredAuth {
    /// Token and instance, when both are present.
    pub fn complete(self) -> Option<(String, String)> {
        self.token.zip(self.instance)
    }
}

/// The persisted account layout on top of a [`CredentialStore`].
#[derive(Clone)]
pub struct AccountVault {
    store: Arc<dyn CredentialStore>,
}

impl AccountVault {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub fn from_config(config: &CredentialConfig) -> Self {
        Self::new(open_store(config))
    }

    pub fn backend_name(&self) -> &str {
        self.store.backend_name()
    }

    /// Known account keys, in the order they were added.
    pub fn accounts(&self) -> CredentialResult<Vec<String>> {
        Ok(self
            .store
            .get(ACCOUNT_INDEX_KEY)?
            .map(|index| {
                index
                    .split(',')
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn get(&self, account_key: &str) -> CredentialResult<StoredAuth> {
        Ok(StoredAuth {
            token: self.store.get(&token_key(account_key))?,
            instance: self.store.get(&instance_key(account_key))?,
        })
    }

    /// Store credentials for `account_key` and make sure it is indexed.
    pub fn put(&self, account_key: &str, token: &str, instance: &str) -> CredentialResult<()> {
        self.store.set(&token_key(account_key), token)?;
        self.store.set(&instance_key(account_key), instance)?;

        let mut keys = self.accounts()?;
        if !keys.iter().any(|k| k == account_key) {
            keys.push(account_key.to_string());
            self.store.set(ACCOUNT_INDEX_KEY, &keys.join(","))?;
        }
        Ok(())
    }

    /// Store credentials under a fresh account key and return the key.
    pub fn add(&self, token: &str, instance: &str) -> CredentialResult<String> {
        let account_key = uuid::Uuid::new_v4().to_string();
        self.put(&account_key, token, instance)?;
        tracing::info!(account_key = %account_key, instance, "Stored credentials");
        Ok(account_key)
    }

    /// Delete every indexed account and the index itself.
    pub fn remove_all(&self) -> CredentialResult<()> {
        let keys = self.accounts()?;
        for key in &keys {
            self.store.delete(&token_key(key))?;
            self.store.delete(&instance_key(key))?;
        }
        self.store.delete(ACCOUNT_INDEX_KEY)?;
        tracing::info!(count = keys.len(), "Removed stored credentials");
        Ok(())
    }
}

fn token_key(account_key: &str) -> String {
    format!("{}.token", account_key)
}

fn instance_key(account_key: &str) -> String {
    format!("{}.instance", account_key)
}
