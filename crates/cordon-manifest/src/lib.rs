//! # Cordon Manifest
//!
//! Data model for the manifest, the versioned security policy document
//! enforced cluster-wide. The state-consistency engine treats a manifest
//! mostly as an opaque byte blob; the types here expose the few fields the
//! engine must read:
//!
//! - the policy hashes referenced by the manifest (content addresses into
//!   the history store), and
//! - the trust fields consulted when authorizing a secret source during
//!   recovery (workload owner key digests, seedshare owner public keys).
//!
//! Everything else, notably the attestation reference values, is carried
//! verbatim for the external attestation machinery.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod hexstring;

pub use error::{ManifestError, Result};
pub use hexstring::HexString;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Number of octets in the content hashes referenced by manifests.
pub const HASH_SIZE: usize = 32;

/// The versioned security policy document.
///
/// Manifests are persisted as canonical JSON and referenced by the SHA-256
/// digest of their serialized bytes. A parsed `Manifest` must therefore never
/// be re-serialized and re-persisted in place of the original bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Maps policy hashes (hex SHA-256 of the policy bytes) to deployment
    /// metadata for the workloads running under that policy.
    #[serde(default)]
    pub policies: BTreeMap<HexString, PolicyEntry>,

    /// Digests of the public keys of entities allowed to update the manifest.
    #[serde(default)]
    pub workload_owner_key_digests: Vec<HexString>,

    /// Public keys of entities allowed to hold the secret seed.
    #[serde(default)]
    pub seedshare_owner_pub_keys: Vec<HexString>,

    /// Attestation reference values, consumed by the attestation validators
    /// outside of this workspace. Carried opaquely.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub reference_values: serde_json::Value,
}

/// Per-policy deployment metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyEntry {
    /// Identifier under which workloads of this policy request a derived
    /// workload secret. Policies without an identifier get no secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_secret_id: Option<String>,

    /// Roles assigned to workloads running under this policy, e.g.
    /// `"coordinator"` for peers that may serve recovery requests.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

impl Manifest {
    /// Parses a manifest from its persisted JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serializes the manifest to JSON bytes.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Returns the policy hashes referenced by this manifest as raw digests.
    ///
    /// Fails if any key is not a valid hex-encoded SHA-256 digest.
    pub fn policy_hashes(&self) -> Result<Vec<[u8; HASH_SIZE]>> {
        self.policies.keys().map(HexString::to_hash).collect()
    }
}
