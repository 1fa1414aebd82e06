//! In-memory store backend.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::StoreError;
use crate::store::{validate_key, Store};

/// In-memory [`Store`] with change notification.
///
/// Reference backend for tests and single-process deployments. All state
/// lives behind one mutex; operations are O(1) map accesses and the lock is
/// never held across an await point.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    values: HashMap<String, Vec<u8>>,
    watchers: HashMap<String, Vec<mpsc::UnboundedSender<Vec<u8>>>>,
}

impl MemStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    /// Delivers `value` to all live watchers of `key`, dropping watchers
    /// whose receiver has gone away.
    fn notify(&mut self, key: &str, value: &[u8]) {
        if let Some(watchers) = self.watchers.get_mut(key) {
            watchers.retain(|tx| tx.send(value.to_vec()).is_ok());
            if watchers.is_empty() {
                self.watchers.remove(key);
            }
        }
    }
}

#[async_trait]
impl Store for MemStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        validate_key(key)?;
        self.inner
            .lock()
            .values
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut inner = self.inner.lock();
        inner.values.insert(key.to_string(), value.to_vec());
        inner.notify(key, value);
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        Ok(self.inner.lock().values.contains_key(key))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        old: &[u8],
        new: &[u8],
    ) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut inner = self.inner.lock();
        // An absent key compares equal to an empty expectation.
        let current = inner.values.get(key).map(Vec::as_slice).unwrap_or(&[]);
        if current != old {
            return Err(StoreError::Conflict {
                key: key.to_string(),
            });
        }
        inner.values.insert(key.to_string(), new.to_vec());
        inner.notify(key, new);
        Ok(())
    }

    fn watch(&self, key: &str) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, StoreError> {
        validate_key(key)?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .lock()
            .watchers
            .entry(key.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }
}
