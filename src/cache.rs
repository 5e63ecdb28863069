//! The local cache: a small key-value store holding the full entry
//! collection as one JSON blob plus the sync settings.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{error, warn, Logger};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::entry::FoodEntry;
use crate::errors::DiaryError;

pub const ENTRIES_KEY: &str = "foodDiaryEntries";
pub const SYNC_ENABLED_KEY: &str = "googleSheetsEnabled";
pub const SPREADSHEET_ID_KEY: &str = "googleSheetsSpreadsheetId";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, DiaryError>;

    fn set(&self, key: &str, value: String) -> Result<(), DiaryError>;
}

/// A key-value store persisted as a JSON object in a single file. The whole
/// file is replaced on every `set`.
pub struct FileStore {
    path: PathBuf,
    data: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store, starting empty if the file does not exist yet. A file
    /// that exists but cannot be parsed is an error rather than being replaced.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DiaryError> {
        let path = path.into();

        let data = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| DiaryError::CacheCorrupt { source })?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(cache_io(&path, source)),
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn persist(&self, data: &BTreeMap<String, String>) -> Result<(), DiaryError> {
        self.stage(data)?
            .persist(&self.path)
            .map_err(|e| cache_io(&self.path, e.error))?;

        Ok(())
    }

    /// Writes the full contents to a temporary file beside the cache file.
    /// The cache file itself is only ever replaced whole, by renaming.
    fn stage(&self, data: &BTreeMap<String, String>) -> Result<NamedTempFile, DiaryError> {
        let serialized =
            serde_json::to_string_pretty(data).map_err(|source| DiaryError::CacheCorrupt { source })?;

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|source| cache_io(&self.path, source))?;

        let mut staged = NamedTempFile::new_in(parent).map_err(|source| cache_io(&self.path, source))?;
        staged
            .write_all(serialized.as_bytes())
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|source| cache_io(&self.path, source))?;

        Ok(staged)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, DiaryError> {
        Ok(read(&self.data).get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), DiaryError> {
        let mut guard = write(&self.data);
        guard.insert(key.to_owned(), value);
        self.persist(&guard)
    }
}

/// A key-value store that lives only as long as the process.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, DiaryError> {
        Ok(read(&self.data).get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), DiaryError> {
        write(&self.data).insert(key.to_owned(), value);
        Ok(())
    }
}

fn cache_io(path: &Path, source: io::Error) -> DiaryError {
    DiaryError::CacheIo {
        path: path.display().to_string(),
        source,
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Whether and where to mirror entries remotely.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    pub enabled: bool,
    #[serde(default)]
    pub spreadsheet_id: String,
}

impl SyncSettings {
    /// Enabled, with somewhere to sync to.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.spreadsheet_id.trim().is_empty()
    }
}

/// Typed access to the entries and settings held in a [`KeyValueStore`].
#[derive(Clone)]
pub struct LocalCache {
    store: Arc<dyn KeyValueStore>,
    logger: Arc<Logger>,
}

impl LocalCache {
    pub fn new(store: Arc<dyn KeyValueStore>, logger: Arc<Logger>) -> Self {
        Self { store, logger }
    }

    /// Reads the cached entries. A missing or unreadable blob reads as empty.
    pub fn entries(&self) -> Vec<FoodEntry> {
        let raw = match self.store.get(ENTRIES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return vec![],
            Err(e) => {
                error!(self.logger, "Could not read cached entries"; "error" => %e);
                return vec![];
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(self.logger, "Ignoring corrupt cached entries"; "error" => %e);
            vec![]
        })
    }

    /// Replaces the cached entries wholesale.
    pub fn save_entries(&self, entries: &[FoodEntry]) -> Result<(), DiaryError> {
        let serialized =
            serde_json::to_string(entries).map_err(|source| DiaryError::CacheCorrupt { source })?;

        self.store.set(ENTRIES_KEY, serialized)
    }

    pub fn settings(&self) -> SyncSettings {
        let get = |key: &str| {
            self.store.get(key).unwrap_or_else(|e| {
                error!(self.logger, "Could not read cached setting"; "key" => key.to_owned(), "error" => %e);
                None
            })
        };

        SyncSettings {
            enabled: get(SYNC_ENABLED_KEY).as_deref() == Some("true"),
            spreadsheet_id: get(SPREADSHEET_ID_KEY).unwrap_or_default(),
        }
    }

    pub fn save_settings(&self, settings: &SyncSettings) -> Result<(), DiaryError> {
        self.store.set(SYNC_ENABLED_KEY, settings.enabled.to_string())?;
        self.store
            .set(SPREADSHEET_ID_KEY, settings.spreadsheet_id.clone())
    }
}
