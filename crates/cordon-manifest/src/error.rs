//! Error types for manifest parsing and field access

use thiserror::Error;

/// Manifest error types
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A field expected to be hex-encoded could not be decoded.
    #[error("invalid hex encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// A hash field decoded to the wrong number of bytes.
    #[error("invalid hash length: expected {expected} bytes, got {actual}")]
    InvalidHashLength {
        /// Expected digest length in bytes.
        expected: usize,
        /// Length actually decoded.
        actual: usize,
    },

    /// The manifest bytes are not valid JSON for the manifest schema.
    #[error("invalid manifest document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for manifest operations
pub type Result<T> = std::result::Result<T, ManifestError>;
