use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::OraError;

/// Favorited token IDs
pub const FAVORITES_KEY: &str = "ora-filters";
/// CMP overlays keyed by token ID
pub const PROFILES_KEY: &str = "orakit_cmp_data";

/// Namespaced string storage for local state
pub trait StatePort: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, OraError>;
    fn write(&self, key: &str, value: &str) -> Result<(), OraError>;
}

/// One `<key>.json` file per key under a directory
pub struct FileStatePort {
    dir: PathBuf,
}

impl FileStatePort {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, OraError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            OraError::Storage(format!("Failed to create state dir {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl StatePort for FileStatePort {
    fn read(&self, key: &str) -> Result<Option<String>, OraError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(OraError::Storage(format!("Failed to read '{}': {}", key, e))),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), OraError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, value)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| OraError::Storage(format!("Failed to write '{}': {}", key, e)))?;

        tracing::debug!("Persisted {} ({} bytes)", key, value.len());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStatePort {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStatePort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded with raw content
    pub fn with_entry(key: &str, value: &str) -> Self {
        let port = Self::default();
        port.entries.lock().insert(key.to_string(), value.to_string());
        port
    }
}

impl StatePort for MemoryStatePort {
    fn read(&self, key: &str) -> Result<Option<String>, OraError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), OraError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
