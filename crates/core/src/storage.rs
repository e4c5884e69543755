//! Named blob storage for redacted outputs.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid name: {0:?}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage collaborator. Names are opaque to callers.
pub trait Storage: Send + Sync {
    /// Store `bytes` under `name`, replacing any previous content.
    fn write(&self, name: &str, bytes: &[u8]) -> Result<()>;

    fn read(&self, name: &str) -> Result<Vec<u8>>;

    fn exists(&self, name: &str) -> Result<bool>;
}

impl<T: Storage + ?Sized> Storage for Arc<T> {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        (**self).write(name, bytes)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        (**self).read(name)
    }

    fn exists(&self, name: &str) -> Result<bool> {
        (**self).exists(name)
    }
}

/// One file per name in a flat directory.
///
/// Writes land in a temporary file next to the target and are renamed over
/// it, so a reader sees either the old or the new bytes, never a mix. Two
/// writers racing on one name: the last rename wins.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Open `root`, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

/// A name must be a single plain file name. Leading dots are reserved for
/// in-flight temporary files.
fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(|c: char| matches!(c, '/' | '\\' | '\0'));
    if bad {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl Storage for FsStorage {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let target = self.path_for(name)?;

        let mut tmp = tempfile::Builder::new().prefix(".veil-").tempfile_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;

        log::debug!("[Storage] wrote {} ({} bytes)", target.display(), bytes.len());
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_for(name)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.path_for(name)?.is_file())
    }
}

/// In-process storage, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        // a panicking writer cannot leave a half-inserted entry behind
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        if name.is_empty() {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        self.lock().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.lock()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.lock().contains_key(name))
    }
}
