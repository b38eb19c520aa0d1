//! Persistence for the access token.
//!
//! The token and its expiry are stored as two string fields under
//! [`ACCESS_TOKEN_KEY`] and [`EXPIRES_AT_KEY`]. Both are written and
//! removed in one batch; a record with either field missing reads as no
//! record at all.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tally_core::{Timestamp, TokenRecord};
use tracing::{debug, warn};

use crate::config::TokenStoreConfig;

pub const ACCESS_TOKEN_KEY: &str = "tally.access_token";
pub const EXPIRES_AT_KEY: &str = "tally.expires_at";

#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Batch key/value persistence.
///
/// `set_many` and `remove_many` must apply all keys or none.
pub trait KeyValueStore: Send + Sync {
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, TokenStoreError>;
    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), TokenStoreError>;
    fn remove_many(&self, keys: &[&str]) -> Result<(), TokenStoreError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-local store; forgets everything on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, TokenStoreError> {
        let entries = lock(&self.entries);
        Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
    }

    fn set_many(&self, new_entries: &[(&str, String)]) -> Result<(), TokenStoreError> {
        let mut entries = lock(&self.entries);
        for (key, value) in new_entries {
            entries.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), TokenStoreError> {
        let mut entries = lock(&self.entries);
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

/// JSON object on disk. Writes go to a sibling temp file that is renamed
/// over the target, so readers see either the old or the new contents.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, TokenStoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(entries)?;
        let tmp = self.temp_path();
        write_private(&tmp, contents.as_bytes())?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// `<file name>.tmp` next to the target.
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Write a file readable by its owner only.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    // `mode` only applies on create; a leftover temp file keeps its own.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)?;
    file.sync_all()
}

impl KeyValueStore for FileStore {
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, TokenStoreError> {
        let entries = self.read_all()?;
        Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
    }

    fn set_many(&self, new_entries: &[(&str, String)]) -> Result<(), TokenStoreError> {
        let _guard = lock(&self.write_lock);
        // A corrupt file is replaced rather than blocking every future write.
        let mut entries = self.read_all().unwrap_or_default();
        for (key, value) in new_entries {
            entries.insert((*key).to_string(), value.clone());
        }
        self.write_all(&entries)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), TokenStoreError> {
        let _guard = lock(&self.write_lock);
        let mut entries = self.read_all().unwrap_or_default();
        for key in keys {
            entries.remove(*key);
        }
        self.write_all(&entries)
    }
}

/// The single owner of the persisted [`TokenRecord`].
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

impl TokenStore {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    pub fn from_config(config: &TokenStoreConfig) -> Self {
        match config {
            TokenStoreConfig::Memory => Self::in_memory(),
            TokenStoreConfig::File { path } => Self::new(FileStore::new(path.clone())),
        }
    }

    /// Persist both fields in one write, replacing any previous record.
    pub fn set(
        &self,
        access_token: impl Into<String>,
        expires_at: Timestamp,
    ) -> Result<(), TokenStoreError> {
        self.set_record(&TokenRecord::new(access_token, expires_at))
    }

    pub fn set_record(&self, record: &TokenRecord) -> Result<(), TokenStoreError> {
        self.backend.set_many(&[
            (ACCESS_TOKEN_KEY, record.access_token.clone()),
            (EXPIRES_AT_KEY, record.expires_at_iso()),
        ])?;
        debug!(expires_at = %record.expires_at, "Stored access token");
        Ok(())
    }

    /// The persisted record, or `None`. Backend failures read as absent.
    pub fn get(&self) -> Option<TokenRecord> {
        match self.backend.get_many(&[ACCESS_TOKEN_KEY, EXPIRES_AT_KEY]) {
            Ok(mut values) if values.len() == 2 => {
                let expires_at = values.pop().flatten();
                let access_token = values.pop().flatten();
                TokenRecord::from_parts(access_token, expires_at)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read token store; treating as empty");
                None
            }
        }
    }

    pub fn clear(&self) -> Result<(), TokenStoreError> {
        self.backend.remove_many(&[ACCESS_TOKEN_KEY, EXPIRES_AT_KEY])?;
        debug!("Cleared access token");
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        self.get().is_some_and(|record| record.is_valid_at(now))
    }

    /// The token to send as a bearer credential, only while it is valid.
    pub fn bearer(&self) -> Option<String> {
        self.get()
            .filter(TokenRecord::is_valid)
            .map(|record| record.access_token)
    }
}
