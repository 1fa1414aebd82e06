//! Storage backend contract for the history.
//!
//! [`History`](crate::History) never assumes a concrete backend; anything
//! offering strictly consistent get/set/has, a linearizable single-key
//! compare-and-swap and optionally a per-key change stream can carry the
//! coordinator's persistent state.

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemStore;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::StoreError;

/// Key/value backend used by the history.
///
/// Implementations must be thread-safe and globally consistent: every
/// replica of the coordinator observes the same key/value mapping, and
/// `compare_and_swap` is the single linearization point for concurrent
/// writers.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns the value for `key`, or [`StoreError::NotFound`].
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Sets the value for `key`.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Returns whether `key` exists.
    async fn has(&self, key: &str) -> Result<bool, StoreError>;

    /// Sets `key` to `new` if, and only if, its current value is `old`.
    ///
    /// An empty `old` matches an absent key. Returns
    /// [`StoreError::Conflict`] if the current value differs from `old`.
    async fn compare_and_swap(&self, key: &str, old: &[u8], new: &[u8])
        -> Result<(), StoreError>;

    /// Watches `key` for changes.
    ///
    /// Every value written to `key` after the call is delivered on the
    /// returned channel. The channel closing signals irrecoverable watch
    /// failure; the watch is cancelled by dropping the receiver.
    fn watch(&self, key: &str) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, StoreError>;
}

/// Validates that `key` consists of two `[a-zA-Z0-9-]+` segments joined by
/// a single `/`.
///
/// Backends call this on every operation; a malformed key is a bug in the
/// caller, not bad data.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = || StoreError::InvalidKey {
        key: key.to_string(),
    };
    let (first, second) = key.split_once('/').ok_or_else(invalid)?;
    for segment in [first, second] {
        if segment.is_empty()
            || !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(invalid());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_validation() {
        assert!(validate_key("manifests/0a1b2c").is_ok());
        assert!(validate_key("transitions/latest").is_ok());
        assert!(validate_key("a-b/c-d").is_ok());

        assert!(validate_key("").is_err());
        assert!(validate_key("no-slash").is_err());
        assert!(validate_key("three/part/key").is_err());
        assert!(validate_key("/leading").is_err());
        assert!(validate_key("trailing/").is_err());
        assert!(validate_key("bad_char/ok").is_err());
        assert!(validate_key("ok/../escape").is_err());
    }
}
