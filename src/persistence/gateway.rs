//! Key-value snapshot stores
//!
//! The progression core treats storage as an opaque, blocking key-value
//! store of text snapshots. The engine calls `save` after every mutating
//! operation; nothing else touches storage.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::error::PersistenceError;

pub type PersistenceResult<T> = Result<T, PersistenceError>;

pub trait PersistenceGateway: Send + Sync {
    /// `Ok(None)` when nothing has been saved under `key`. Stored data that
    /// cannot be a snapshot at all is `Err(Corrupt)`; other errors mean the
    /// store itself could not be read.
    fn load(&self, key: &str) -> PersistenceResult<Option<String>>;

    fn save(&self, key: &str, snapshot: &str) -> PersistenceResult<()>;
}

/// In-process store, mainly for tests
#[derive(Debug, Default)]
pub struct MemoryGateway {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PersistenceGateway for MemoryGateway {
    fn load(&self, key: &str) -> PersistenceResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, snapshot: &str) -> PersistenceResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), snapshot.to_string());
        Ok(())
    }
}

/// One JSON file per key under a data directory. Writes go to a temporary
/// file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileGateway {
    dir: PathBuf,
}

impl FileGateway {
    /// Create the directory if needed
    pub fn new(dir: impl AsRef<Path>) -> PersistenceResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`. Characters outside `[A-Za-z0-9_-]` map to `_`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl PersistenceGateway for FileGateway {
    fn load(&self, key: &str) -> PersistenceResult<Option<String>> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => String::from_utf8(bytes).map(Some).map_err(|e| {
                PersistenceError::Corrupt(format!("{} is not UTF-8: {e}", path.display()))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no snapshot on disk");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, snapshot: &str) -> PersistenceResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, snapshot)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), bytes = snapshot.len(), "snapshot written");
        Ok(())
    }
}
