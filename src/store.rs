//! Opaque key-value blob persistence.
//!
//! The wallet core treats local persistence as an external collaborator: a
//! flat string-to-string store. Session blobs and endpoint configuration go
//! through this seam; the RPC password never does.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::{WalletError, WalletResult};

pub trait BlobStore: Send + Sync {
    fn get(&self, key: &str) -> WalletResult<Option<String>>;
    fn put(&self, key: &str, value: &str) -> WalletResult<()>;
    fn remove(&self, key: &str) -> WalletResult<()>;
}

/// Volatile store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn get(&self, key: &str) -> WalletResult<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| WalletError::Storage("store lock".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> WalletResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| WalletError::Storage("store lock".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> WalletResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| WalletError::Storage("store lock".into()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Single-file JSON map under the user's data directory (or an explicit
/// path). The whole map is rewritten on every put; the blobs are tiny.
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Open `<data_dir>/keywallet/<app>.json`, creating parents as needed.
    pub fn open(app: &str) -> WalletResult<Self> {
        let dir = dirs::data_dir()
            .ok_or_else(|| WalletError::Storage("no user data directory".into()))?
            .join("keywallet");
        std::fs::create_dir_all(&dir)?;
        Self::open_path(dir.join(format!("{app}.json")))
    }

    pub fn open_path(path: impl Into<PathBuf>) -> WalletResult<Self> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| WalletError::Storage(format!("corrupt store: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    fn flush(&self, entries: &HashMap<String, String>) -> WalletResult<()> {
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|e| WalletError::Storage(e.to_string()))?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl BlobStore for FileStore {
    fn get(&self, key: &str) -> WalletResult<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| WalletError::Storage("store lock".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> WalletResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| WalletError::Storage("store lock".into()))?;
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> WalletResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| WalletError::Storage("store lock".into()))?;
        entries.remove(key);
        self.flush(&entries)
    }
}
