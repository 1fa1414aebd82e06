//! Error types for the history store

use thiserror::Error;

use crate::Hash;

/// Errors returned by storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested key does not exist.
    #[error("key {key:?} not found")]
    NotFound {
        /// The missing key.
        key: String,
    },

    /// A compare-and-swap found a current value different from the expected
    /// one. Expected under normal multi-replica contention.
    #[error("object {key:?} has changed since last read")]
    Conflict {
        /// The contended key.
        key: String,
    },

    /// The key does not match `segment/segment` with alphanumeric-or-dash
    /// segments. This is a programming error, not a data error.
    #[error("invalid store key {key:?}")]
    InvalidKey {
        /// The offending key.
        key: String,
    },

    /// The backend does not support change notification.
    #[error("backend does not support watching keys")]
    WatchUnsupported,

    /// The backend failed, e.g. an I/O error.
    #[error("store backend error on {key:?}: {source}")]
    Backend {
        /// The key being accessed.
        key: String,
        /// The underlying failure.
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// True if this error means the key simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// True if this error is a compare-and-swap conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Errors returned by [`History`](crate::History) operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The storage backend failed or the object is absent.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Stored bytes do not match their content address. Indicates storage
    /// corruption or a backend bug; never retried.
    #[error("hash mismatch: expected {}, got {}", hex::encode(.expected), hex::encode(.actual))]
    HashMismatch {
        /// The content address the object was fetched under.
        expected: Hash,
        /// The digest of the bytes actually returned.
        actual: Hash,
    },

    /// A persisted object does not decode to its expected shape.
    #[error("invalid encoding for {kind}: {reason}")]
    InvalidEncoding {
        /// The object kind, e.g. `"transition"`.
        kind: &'static str,
        /// Why decoding failed.
        reason: String,
    },

    /// The signature on the latest transition does not verify.
    #[error("latest transition signature is invalid")]
    InvalidSignature,

    /// Producing a signature failed.
    #[error("signing latest transition: {0}")]
    Signing(#[source] p256::ecdsa::Error),
}

/// Result type for history operations
pub type Result<T, E = HistoryError> = std::result::Result<T, E>;
