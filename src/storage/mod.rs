//! Client-owned key/value storage
//!
//! Settings, the prompt library and the CLI session live in a small key/value
//! store that holds raw JSON strings per key. `FileStore` persists the map as
//! one JSON object on disk; `MemoryStore` keeps it in memory for tests and
//! embedding.

use crate::error::{ParleyError, Result};
use anyhow::Context;
use directories::ProjectDirs;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Key/value store holding raw JSON strings
///
/// Values are stored exactly as given; readers decode them leniently since
/// another client version may have written them.
pub trait LocalStore: Send + Sync {
    /// Raw value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a raw value under `key`
    fn set(&self, key: &str, value: String) -> Result<()>;

    /// Remove `key`, doing nothing when it is absent
    fn remove(&self, key: &str) -> Result<()>;

    /// Decode the JSON value stored under `key`
    ///
    /// Unparsable values are logged and treated as absent.
    fn get_json(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let Some(raw) = self.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!("Ignoring unparsable value stored under {}: {}", key, e);
                Ok(None)
            }
        }
    }

    /// Encode and store a JSON value under `key`
    fn set_json(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        self.set(key, serde_json::to_string(value)?)
    }
}

/// Store persisted as a JSON object file
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileStore {
    /// Open the store in the platform data directory
    ///
    /// `PARLEY_STORE_PATH` overrides the location.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var("PARLEY_STORE_PATH") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("dev", "parley", "parley")
            .ok_or_else(|| ParleyError::Storage("Could not determine data directory".into()))?;

        Self::new_with_path(proj_dirs.data_dir().join("store.json"))
    }

    /// Open the store at an explicit path
    ///
    /// The parent directory is created when missing; the file itself is
    /// created on the first write.
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::storage::{FileStore, LocalStore};
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = FileStore::new_with_path(dir.path().join("store.json")).unwrap();
    /// store.set("settings", "{}".to_string()).unwrap();
    /// assert_eq!(store.get("settings").unwrap().as_deref(), Some("{}"));
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create parent directory for store")
                    .map_err(|e| ParleyError::Storage(e.to_string()))?;
            }
        }

        tracing::debug!("Using local store at {}", path.display());
        Ok(Self {
            path,
            lock: RwLock::new(()),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(ParleyError::Storage(format!(
                    "Failed to read store {}: {}",
                    self.path.display(),
                    e
                ))
                .into())
            }
        };

        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        match serde_json::from_str(&contents) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(
                    "Store file {} is corrupt, starting empty: {}",
                    self.path.display(),
                    e
                );
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let contents = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, contents)
            .context("Failed to write store")
            .map_err(|e| ParleyError::Storage(e.to_string()))?;
        Ok(())
    }

    fn update<F: FnOnce(&mut BTreeMap<String, String>)>(&self, apply: F) -> Result<()> {
        let _guard = self
            .lock
            .write()
            .map_err(|_| ParleyError::Storage("Failed to acquire store lock".to_string()))?;
        let mut map = self.read_map()?;
        apply(&mut map);
        self.write_map(&map)
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self
            .lock
            .read()
            .map_err(|_| ParleyError::Storage("Failed to acquire store lock".to_string()))?;
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        self.update(|map| {
            map.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|map| {
            map.remove(key);
        })
    }
}

/// Store kept in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| ParleyError::Storage("Failed to acquire store lock".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ParleyError::Storage("Failed to acquire store lock".to_string()))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ParleyError::Storage("Failed to acquire store lock".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}
