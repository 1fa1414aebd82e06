//! Filesystem store backend.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::error::StoreError;
use crate::store::{validate_key, Store};

/// Directory-backed [`Store`].
///
/// Each key maps to `<root>/<segment>/<segment>`. A process-wide lock makes
/// the compare-and-swap atomic against other accessors in the same process;
/// multi-process deployments need a backend with real transactional CAS.
///
/// Watching is not supported.
pub struct FsStore {
    root: PathBuf,
    lock: RwLock<()>,
}

impl FsStore {
    /// Creates a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|source| StoreError::Backend {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self {
            root,
            lock: RwLock::new(()),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Safe to join directly: validate_key rules out separators and dots.
        self.root.join(key)
    }

    fn read(&self, key: &str, path: &Path) -> Result<Vec<u8>, StoreError> {
        std::fs::read(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound {
                    key: key.to_string(),
                }
            } else {
                StoreError::Backend {
                    key: key.to_string(),
                    source,
                }
            }
        })
    }

    fn write(&self, key: &str, path: &Path, value: &[u8]) -> Result<(), StoreError> {
        let backend_err = |source| StoreError::Backend {
            key: key.to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(backend_err)?;
        }
        std::fs::write(path, value).map_err(backend_err)
    }
}

#[async_trait]
impl Store for FsStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        validate_key(key)?;
        let _guard = self.lock.read();
        self.read(key, &self.path_for(key))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        validate_key(key)?;
        let _guard = self.lock.write();
        self.write(key, &self.path_for(key), value)
    }

    async fn has(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        let _guard = self.lock.read();
        Ok(self.path_for(key).is_file())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        old: &[u8],
        new: &[u8],
    ) -> Result<(), StoreError> {
        validate_key(key)?;
        let _guard = self.lock.write();
        let path = self.path_for(key);
        let current = match self.read(key, &path) {
            Ok(value) => value,
            // A missing file only counts as the empty value for initial sets.
            Err(err) if err.is_not_found() && old.is_empty() => Vec::new(),
            Err(err) => return Err(err),
        };
        if current != old {
            return Err(StoreError::Conflict {
                key: key.to_string(),
            });
        }
        self.write(key, &path, new)
    }

    fn watch(&self, _key: &str) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, StoreError> {
        Err(StoreError::WatchUnsupported)
    }
}
