use crate::domain::error::{AppError, Result};
use crate::domain::recent_file::{RecentFileEntry, RecentFileSummary};
use crate::infrastructure::storage::StoragePort;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const RECENT_FILES_KEY: &str = "recentPDFs";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecentFilesConfig {
    pub max_entries: usize,
    /// Files larger than this are opened but never cached
    pub max_file_bytes: usize,
}

impl Default for RecentFilesConfig {
    fn default() -> Self {
        Self {
            max_entries: 3,
            max_file_bytes: 4 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CacheOutcome {
    Cached,
    SkippedTooLarge { size_bytes: usize, limit_bytes: usize },
}

impl CacheOutcome {
    /// Text for the UI when the file was not cached.
    pub fn warning(&self) -> Option<String> {
        match self {
            CacheOutcome::Cached => None,
            CacheOutcome::SkippedTooLarge { limit_bytes, .. } => Some(format!(
                "This file is larger than {} MB and was not added to recent files.",
                limit_bytes / (1024 * 1024)
            )),
        }
    }
}

/// Most-recently-opened files, persisted as a JSON array under one storage key.
pub struct RecentFilesCache {
    storage: Arc<dyn StoragePort>,
    config: RecentFilesConfig,
}

impl RecentFilesCache {
    pub fn new(storage: Arc<dyn StoragePort>, config: RecentFilesConfig) -> Self {
        Self { storage, config }
    }

    /// Stored entries, newest first. Unreadable data is discarded.
    pub fn entries(&self) -> Vec<RecentFileEntry> {
        let raw = match self.storage.get(RECENT_FILES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read recent files");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<RecentFileEntry>>(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Recent files data is corrupt, clearing it");
                self.clear();
                Vec::new()
            }
        }
    }

    pub fn list(&self) -> Vec<RecentFileSummary> {
        self.entries().iter().map(RecentFileEntry::summary).collect()
    }

    pub fn insert(&self, name: &str, bytes: &[u8]) -> Result<CacheOutcome> {
        if bytes.len() > self.config.max_file_bytes {
            info!(
                name,
                size = bytes.len(),
                limit = self.config.max_file_bytes,
                "File too large for recent files cache"
            );
            return Ok(CacheOutcome::SkippedTooLarge {
                size_bytes: bytes.len(),
                limit_bytes: self.config.max_file_bytes,
            });
        }

        let mut entries = self.entries();
        entries.retain(|entry| entry.name != name);
        entries.insert(
            0,
            RecentFileEntry {
                name: name.to_string(),
                data: STANDARD.encode(bytes),
                last_opened: chrono::Utc::now().timestamp_millis(),
            },
        );
        entries.truncate(self.config.max_entries);

        self.save(&entries)?;
        debug!(name, entries = entries.len(), "Cached recent file");
        Ok(CacheOutcome::Cached)
    }

    /// Decoded bytes of a cached file.
    pub fn open(&self, name: &str) -> Result<Vec<u8>> {
        let mut entries = self.entries();
        let position = entries
            .iter()
            .position(|entry| entry.name == name)
            .ok_or_else(|| AppError::NotFound(format!("'{}' is not in recent files", name)))?;

        match STANDARD.decode(entries[position].data.as_bytes()) {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                warn!(name, error = %e, "Cached file data is unreadable, dropping entry");
                entries.remove(position);
                if let Err(e) = self.save(&entries) {
                    warn!(error = %e, "Failed to rewrite recent files");
                }
                Err(AppError::NotFound(format!(
                    "'{}' could not be restored from recent files",
                    name
                )))
            }
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.storage.remove(RECENT_FILES_KEY) {
            warn!(error = %e, "Failed to clear recent files");
        }
    }

    fn save(&self, entries: &[RecentFileEntry]) -> Result<()> {
        let raw = serde_json::to_string(entries)?;
        self.storage.set(RECENT_FILES_KEY, &raw).map_err(|e| {
            warn!(error = %e, "Could not save recent files, clearing cache");
            self.clear();
            AppError::StorageError(format!("Recent files could not be saved: {}", e))
        })
    }
}
