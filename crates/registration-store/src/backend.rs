//! Storage backends for the registration document.

use crate::error::StoreError;
use crate::types::{StoreData, DATA_VERSION};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Document locks shared by every store in the process that opens the same path.
static PATH_LOCKS: LazyLock<std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(Default::default);

fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut locks = PATH_LOCKS.lock().unwrap_or_else(|e| e.into_inner());
    Arc::clone(locks.entry(key).or_default())
}

/// JSON file storage with atomic replace-on-write.
pub struct FileStore {
    storage_path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FileStore {
    /// Create a file store rooted at `storage_path`.
    ///
    /// Stores opened on the same path share one document lock.
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        let storage_path = storage_path.into();
        let lock = path_lock(&storage_path);
        Self { storage_path, lock }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    /// Write the document to disk.
    ///
    /// The data lands in a uniquely named sibling temp file first and is
    /// renamed over the target, so readers see either the old or the new
    /// document.
    pub async fn save(&self, data: &StoreData) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(data)?;
        let len = bytes.len();
        let path = self.storage_path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(io::Error::other)??;

        debug!(
            "Saved registration store ({} bytes) to {:?}",
            len, self.storage_path
        );
        Ok(())
    }

    /// Read the document from disk.
    ///
    /// A missing file is an empty store. A file that exists but does not
    /// parse is an error.
    pub async fn load(&self) -> Result<StoreData, StoreError> {
        let bytes = match fs::read(&self.storage_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(
                    "Registration store not found at {:?}, starting empty",
                    self.storage_path
                );
                return Ok(StoreData::default());
            }
            Err(e) => return Err(e.into()),
        };

        let data: StoreData = serde_json::from_slice(&bytes)?;

        if data.version > DATA_VERSION {
            warn!(
                found = data.version,
                supported = DATA_VERSION,
                "Registration store written by a newer schema"
            );
        }

        Ok(data)
    }

    /// Check if the backing file exists.
    pub async fn exists(&self) -> Result<bool, StoreError> {
        Ok(fs::try_exists(&self.storage_path).await?)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".registration-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Process-local storage. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
    lock: Arc<Mutex<()>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save(&self, data: &StoreData) -> Result<(), StoreError> {
        *self.data.write().await = data.clone();
        Ok(())
    }

    pub async fn load(&self) -> Result<StoreData, StoreError> {
        Ok(self.data.read().await.clone())
    }
}

/// Storage backend selected at startup.
pub enum Store {
    /// JSON file on disk
    File(FileStore),
    /// In-memory only (no persistence)
    Memory(MemoryStore),
}

impl Store {
    /// File-backed store at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Store::File(FileStore::new(path))
    }

    /// Memory-only store.
    pub fn memory() -> Self {
        info!("Using in-memory registration store (data will be lost on restart)");
        Store::Memory(MemoryStore::new())
    }

    pub async fn save(&self, data: &StoreData) -> Result<(), StoreError> {
        match self {
            Store::File(s) => s.save(data).await,
            Store::Memory(s) => s.save(data).await,
        }
    }

    pub async fn load(&self) -> Result<StoreData, StoreError> {
        match self {
            Store::File(s) => s.load().await,
            Store::Memory(s) => s.load().await,
        }
    }

    /// Lock guarding read-modify-write of the document.
    pub(crate) fn document_lock(&self) -> Arc<Mutex<()>> {
        match self {
            Store::File(s) => Arc::clone(&s.lock),
            Store::Memory(s) => Arc::clone(&s.lock),
        }
    }
}
