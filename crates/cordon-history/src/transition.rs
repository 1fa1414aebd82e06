//! Transition chain nodes and the signed latest pointer.
//!
//! Wire encodings are bit-exact and stable:
//!
//! - [`Transition`] marshals to exactly 64 bytes, the manifest hash followed
//!   by the previous transition hash.
//! - [`LatestTransition`] marshals to the 32-byte transition hash followed by
//!   a variable-length ASN.1 DER ECDSA signature over that hash.

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};

use crate::error::{HistoryError, Result};
use crate::{Hash, HASH_SIZE};

/// A transition between two manifests: one node of the hash-chained history.
///
/// The previous hash of the first transition is the all-zero root hash,
/// which is never itself stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Content address of the manifest this transition activates.
    pub manifest_hash: Hash,
    /// Content address of the predecessor transition, or the root hash.
    pub previous_transition_hash: Hash,
}

impl Transition {
    /// Encodes the transition as 64 bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(2 * HASH_SIZE);
        data.extend_from_slice(&self.manifest_hash);
        data.extend_from_slice(&self.previous_transition_hash);
        data
    }

    /// Decodes a transition, rejecting any input that is not exactly 64 bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != 2 * HASH_SIZE {
            return Err(HistoryError::InvalidEncoding {
                kind: "transition",
                reason: format!("invalid length {}, expected {}", data.len(), 2 * HASH_SIZE),
            });
        }
        let mut manifest_hash = [0u8; HASH_SIZE];
        let mut previous_transition_hash = [0u8; HASH_SIZE];
        manifest_hash.copy_from_slice(&data[..HASH_SIZE]);
        previous_transition_hash.copy_from_slice(&data[HASH_SIZE..]);
        Ok(Self {
            manifest_hash,
            previous_transition_hash,
        })
    }
}

/// The single mutable pointer into the transition chain, signed by the
/// coordinator's transaction signing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestTransition {
    /// Content address of the transition this pointer designates.
    pub transition_hash: Hash,
    signature: Vec<u8>,
}

impl LatestTransition {
    /// Creates an unsigned pointer to `transition_hash`.
    ///
    /// The pointer must be signed before it is persisted; see
    /// [`History::set_latest`](crate::History::set_latest).
    pub fn new(transition_hash: Hash) -> Self {
        Self {
            transition_hash,
            signature: Vec::new(),
        }
    }

    /// Encodes the pointer as hash bytes followed by the DER signature.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(HASH_SIZE + self.signature.len());
        data.extend_from_slice(&self.transition_hash);
        data.extend_from_slice(&self.signature);
        data
    }

    /// Encodes an optional pointer; `None` encodes to empty bytes, which is
    /// the compare-and-swap predicate for "no previous value".
    pub fn encode_optional(latest: Option<&LatestTransition>) -> Vec<u8> {
        latest.map(LatestTransition::to_bytes).unwrap_or_default()
    }

    /// Decodes a pointer, rejecting inputs of 32 bytes or fewer.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() <= HASH_SIZE {
            return Err(HistoryError::InvalidEncoding {
                kind: "latest transition",
                reason: format!("invalid length {}", data.len()),
            });
        }
        let mut transition_hash = [0u8; HASH_SIZE];
        transition_hash.copy_from_slice(&data[..HASH_SIZE]);
        Ok(Self {
            transition_hash,
            signature: data[HASH_SIZE..].to_vec(),
        })
    }

    /// Signs the transition hash, replacing any existing signature.
    pub(crate) fn sign(&mut self, key: &SigningKey) -> Result<()> {
        let signature: Signature = key
            .sign_prehash(&self.transition_hash)
            .map_err(HistoryError::Signing)?;
        self.signature = signature.to_der().as_bytes().to_vec();
        Ok(())
    }

    /// Verifies the signature over the transition hash.
    pub fn verify(&self, key: &VerifyingKey) -> Result<()> {
        let signature =
            Signature::from_der(&self.signature).map_err(|_| HistoryError::InvalidSignature)?;
        key.verify_prehash(&self.transition_hash, &signature)
            .map_err(|_| HistoryError::InvalidSignature)
    }
}
