//! Persistent key-value state storage.
//!
//! Launch counters survive process restarts through a small integer-valued
//! key-value store. The contract mirrors platform preference stores: reads
//! take an explicit default, writes are buffered until an explicit
//! [`StateStore::save`] call flushes them.
//!
//! There is no transactional guarantee across keys: a crash between `save()`
//! calls can leave a partial write, which callers must tolerate (the facade
//! documents the resulting replay risk on `app_launched`).
//!
//! Two implementations are provided: [`FileStore`] persists a JSON map on
//! disk, [`MemoryStore`] keeps everything in memory for tests and for
//! callers that bring their own save system.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Keys used in the persistent store.
///
/// The string forms are a storage-format contract: changing them would
/// orphan counters persisted by existing installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// `1` while no launch has ever been recorded, `0` afterwards.
    AppLaunchedFirstTime,
    /// Count of launches recorded across sessions.
    AppLaunchedCount,
    /// Reserved; not read or written by the core logic.
    GamePlayedScore,
    /// Reserved; not read or written by the core logic. The demo binary
    /// uses it for its own game counter.
    GamePlayedGameCount,
}

impl StoreKey {
    /// The exact key string used in persisted storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StoreKey::AppLaunchedFirstTime => "APP_LAUNCHED__FIRST_TIME",
            StoreKey::AppLaunchedCount => "APP_LAUNCHED__COUNT",
            StoreKey::GamePlayedScore => "GAME_PLAYED__SCORE",
            StoreKey::GamePlayedGameCount => "GAME_PLAYED__GAME_COUNT",
        }
    }
}

/// Errors that can occur while loading or saving persisted state.
#[derive(Error, Debug)]
pub enum StoreError {
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The state file exists but is not a valid JSON integer map.
    #[error("malformed state file: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Persistent integer key-value storage.
///
/// Implementations buffer writes until [`save`](StateStore::save) is called,
/// matching platforms where preference writes are not immediately durable.
pub trait StateStore: Send {
    /// Reads the value for `key`, or `default` if the key is absent.
    fn get_int(&self, key: StoreKey, default: i64) -> i64;

    /// Sets the value for `key`. Not durable until [`save`](StateStore::save).
    fn set_int(&mut self, key: StoreKey, value: i64);

    /// Flushes buffered writes to the backing storage.
    fn save(&mut self) -> Result<(), StoreError>;
}

/// A [`StateStore`] backed by a JSON file on disk.
///
/// The whole map is loaded at open time; `save()` rewrites the file through
/// a temporary sibling followed by a rename, so a crash mid-save leaves the
/// previous file intact.
pub struct FileStore {
    path: PathBuf,
    values: HashMap<String, i64>,
    dirty: bool,
}

impl FileStore {
    /// Opens the store at `path`, loading existing values.
    ///
    /// A missing file is not an error: it yields an empty store, which is
    /// exactly the "no launch recorded yet" state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file exists but cannot be read or is
    /// not a valid JSON integer map.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(StoreError::Io(e)),
        };

        debug!(path = %path.display(), entries = values.len(), "Opened state store");

        Ok(Self {
            path,
            values,
            dirty: false,
        })
    }

    /// The path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStore {
    fn get_int(&self, key: StoreKey, default: i64) -> i64 {
        self.values.get(key.as_str()).copied().unwrap_or(default)
    }

    fn set_int(&mut self, key: StoreKey, value: i64) {
        self.values.insert(key.as_str().to_string(), value);
        self.dirty = true;
    }

    fn save(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to a sibling temp file, then rename over the target.
        let tmp_path = self.path.with_extension("tmp");
        let contents = serde_json::to_string_pretty(&self.values)?;
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        self.dirty = false;
        debug!(path = %self.path.display(), "Saved state store");
        Ok(())
    }
}

/// An in-memory [`StateStore`].
///
/// Used in tests and by callers that persist state through their own save
/// system. Tracks how many times `save()` was called so tests can assert
/// flush behavior.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, i64>,
    save_count: usize,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with `(key, value)` entries.
    #[must_use]
    pub fn with_values(entries: &[(StoreKey, i64)]) -> Self {
        let mut store = Self::new();
        for &(key, value) in entries {
            store.values.insert(key.as_str().to_string(), value);
        }
        store
    }

    /// Number of `save()` calls observed.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.save_count
    }
}

impl StateStore for MemoryStore {
    fn get_int(&self, key: StoreKey, default: i64) -> i64 {
        self.values.get(key.as_str()).copied().unwrap_or(default)
    }

    fn set_int(&mut self, key: StoreKey, value: i64) {
        self.values.insert(key.as_str().to_string(), value);
    }

    fn save(&mut self) -> Result<(), StoreError> {
        self.save_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn store_keys_have_exact_strings() {
        assert_eq!(
            StoreKey::AppLaunchedFirstTime.as_str(),
            "APP_LAUNCHED__FIRST_TIME"
        );
        assert_eq!(StoreKey::AppLaunchedCount.as_str(), "APP_LAUNCHED__COUNT");
        assert_eq!(StoreKey::GamePlayedScore.as_str(), "GAME_PLAYED__SCORE");
        assert_eq!(
            StoreKey::GamePlayedGameCount.as_str(),
            "GAME_PLAYED__GAME_COUNT"
        );
    }

    #[test]
    fn memory_store_returns_default_for_missing_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get_int(StoreKey::AppLaunchedFirstTime, 1), 1);
        assert_eq!(store.get_int(StoreKey::AppLaunchedCount, 0), 0);
    }

    #[test]
    fn memory_store_set_then_get() {
        let mut store = MemoryStore::new();
        store.set_int(StoreKey::AppLaunchedCount, 5);
        assert_eq!(store.get_int(StoreKey::AppLaunchedCount, 0), 5);
    }

    #[test]
    fn memory_store_counts_saves() {
        let mut store = MemoryStore::new();
        assert_eq!(store.save_count(), 0);

        store.save().unwrap();
        store.save().unwrap();
        assert_eq!(store.save_count(), 2);
    }

    #[test]
    fn memory_store_with_values_seeds_entries() {
        let store = MemoryStore::with_values(&[
            (StoreKey::AppLaunchedFirstTime, 0),
            (StoreKey::AppLaunchedCount, 3),
        ]);

        assert_eq!(store.get_int(StoreKey::AppLaunchedFirstTime, 1), 0);
        assert_eq!(store.get_int(StoreKey::AppLaunchedCount, 0), 3);
    }

    #[test]
    fn file_store_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path().join("state.json")).unwrap();

        assert_eq!(store.get_int(StoreKey::AppLaunchedFirstTime, 1), 1);
    }

    #[test]
    fn file_store_roundtrip_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut store = FileStore::open(&path).unwrap();
        store.set_int(StoreKey::AppLaunchedFirstTime, 0);
        store.set_int(StoreKey::AppLaunchedCount, 4);
        store.save().unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get_int(StoreKey::AppLaunchedFirstTime, 1), 0);
        assert_eq!(reopened.get_int(StoreKey::AppLaunchedCount, 0), 4);
    }

    #[test]
    fn file_store_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("state.json");

        let mut store = FileStore::open(&path).unwrap();
        store.set_int(StoreKey::AppLaunchedCount, 1);
        store.save().unwrap();

        assert!(path.exists());
    }

    #[test]
    fn file_store_save_without_writes_is_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut store = FileStore::open(&path).unwrap();
        store.save().unwrap();

        // Nothing was written, so no file should appear.
        assert!(!path.exists());
    }

    #[test]
    fn file_store_rejects_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json at all").unwrap();

        let result = FileStore::open(&path);
        assert!(matches!(result, Err(StoreError::Malformed(_))));
    }

    #[test]
    fn file_store_unsaved_writes_are_not_durable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut store = FileStore::open(&path).unwrap();
        store.set_int(StoreKey::AppLaunchedCount, 9);
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get_int(StoreKey::AppLaunchedCount, 0), 0);
    }

    #[test]
    fn store_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = StoreError::Io(io_err);
        assert_eq!(err.to_string(), "I/O error: missing");
    }
}
