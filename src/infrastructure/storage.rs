use crate::domain::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

const STORAGE_FILE: &str = "storage.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Upper bound on the serialized size of everything stored
    pub quota_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            quota_bytes: 10 * 1024 * 1024,
        }
    }
}

/// String key/value store, the persistence behind the recent-files cache.
pub trait StoragePort: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Fails with `StorageError` when the write would exceed the quota.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

fn stored_size(entries: &BTreeMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

fn check_quota(entries: &BTreeMap<String, String>, quota_bytes: usize) -> Result<()> {
    let size = stored_size(entries);
    if size > quota_bytes {
        return Err(AppError::StorageError(format!(
            "Storage quota exceeded ({} of {} bytes)",
            size, quota_bytes
        )));
    }
    Ok(())
}

pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// JSON map persisted to `<data_dir>/storage.json`.
pub struct FileStorage {
    path: PathBuf,
    quota_bytes: usize,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    pub fn open(config: &StorageConfig) -> Result<Self> {
        ensure_dir(&config.data_dir)?;
        let path = config.data_dir.join(STORAGE_FILE);

        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Storage file is corrupt, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = entries.len(), "Opened storage");

        Ok(Self {
            path,
            quota_bytes: config.quota_bytes,
            entries: Mutex::new(entries),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| AppError::StorageError("Storage lock poisoned".to_string()))
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let raw = serde_json::to_string(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| AppError::StorageError(format!("Failed to write storage: {}", e)))
    }
}

impl StoragePort for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.lock()?;
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        check_quota(&next, self.quota_bytes)?;
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.lock()?;
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

/// In-process store with the same quota semantics as `FileStorage`.
#[cfg(test)]
pub struct MemoryStorage {
    quota_bytes: usize,
    entries: Mutex<BTreeMap<String, String>>,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn new(quota_bytes: usize) -> Self {
        Self {
            quota_bytes,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| AppError::StorageError("Storage lock poisoned".to_string()))
    }
}

#[cfg(test)]
impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

#[cfg(test)]
impl StoragePort for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.lock()?;
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        check_quota(&next, self.quota_bytes)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
