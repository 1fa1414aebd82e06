//! Hex-encoded byte strings as they appear in manifest documents.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ManifestError, Result};
use crate::HASH_SIZE;

/// A lowercase hex-encoded byte string.
///
/// Manifests reference policies and keys by hex digests. `HexString` keeps
/// the original encoding (so map keys round-trip byte-identically) and
/// converts to raw bytes on demand.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HexString(String);

impl HexString {
    /// Encodes raw bytes as a hex string.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Decodes the string into raw bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(hex::decode(&self.0)?)
    }

    /// Decodes the string into a 32-byte digest.
    pub fn to_hash(&self) -> Result<[u8; HASH_SIZE]> {
        let bytes = self.to_bytes()?;
        bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| ManifestError::InvalidHashLength {
                expected: HASH_SIZE,
                actual: bytes.len(),
            })
    }

    /// Returns the hex encoding as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<[u8; HASH_SIZE]> for HexString {
    fn from(hash: [u8; HASH_SIZE]) -> Self {
        Self::from_bytes(&hash)
    }
}

impl fmt::Display for HexString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
