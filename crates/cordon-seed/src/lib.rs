//! # Cordon Seed
//!
//! Deterministic derivation of all long-lived coordinator keys from one
//! secret seed and an accompanying salt.
//!
//! Every key with a lifetime beyond a single process is derived with
//! HKDF-SHA256 from the seed, using a fixed, distinct info string per
//! purpose. Holding the seed and salt is therefore sufficient to reproduce
//! the full key material, which is what makes peer recovery possible: a
//! replica that obtains the seed from an authorized source can re-derive the
//! transaction signing key and verify the persisted history on its own.
//!
//! Derivation is fully deterministic: a fixed `(seed, salt)` pair yields
//! byte-identical keys across runs and machines. The only non-deterministic
//! operation in this crate is [`SeedEngine::generate_mesh_ca_key`], which
//! intentionally produces a fresh key per manifest transition.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;

pub use error::{Result, SeedError};

use hkdf::Hkdf;
use p256::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Number of octets in the hashes and salts used by this crate.
pub const HASH_SIZE: usize = 32;

/// Derives ECDSA and symmetric keys from a secret seed.
///
/// All derived fields are computed once at construction; the accessors are
/// cheap. The seed and the derived symmetric material are zeroized on drop.
pub struct SeedEngine {
    seed: Zeroizing<Vec<u8>>,
    salt: Vec<u8>,

    pod_state_seed: Zeroizing<Vec<u8>>,
    history_seed: Zeroizing<Vec<u8>>,

    root_ca_key: SigningKey,
    transaction_signing_key: SigningKey,
}

impl SeedEngine {
    /// Creates a new `SeedEngine` from a secret seed and a salt.
    ///
    /// The salt must be exactly [`HASH_SIZE`] bytes (RFC 5869 recommends a
    /// salt of hash length) and the seed at least [`HASH_SIZE`] bytes.
    pub fn new(secret_seed: &[u8], salt: &[u8]) -> Result<Self> {
        if salt.len() != HASH_SIZE {
            return Err(SeedError::InvalidSaltLength(salt.len()));
        }
        if secret_seed.len() < HASH_SIZE {
            return Err(SeedError::SeedTooShort(secret_seed.len()));
        }

        let pod_state_seed = hkdf_derive(secret_seed, salt, b"POD STATE SECRET")?;
        let history_seed = hkdf_derive(secret_seed, salt, b"HISTORY SECRET")?;
        let transaction_signing_seed =
            hkdf_derive(secret_seed, salt, b"TRANSACTION SIGNING SECRET")?;
        let root_ca_seed = hkdf_derive(secret_seed, salt, b"ROOT CA SEED")?;

        let transaction_signing_key = derive_signing_key(&transaction_signing_seed, salt)?;
        let root_ca_key = derive_signing_key(&root_ca_seed, salt)?;

        Ok(Self {
            seed: Zeroizing::new(secret_seed.to_vec()),
            salt: salt.to_vec(),
            pod_state_seed,
            history_seed,
            root_ca_key,
            transaction_signing_key,
        })
    }

    /// Derives the secret for the pods running under the given policy.
    ///
    /// The hash of empty input is rejected: it shows up when a placeholder
    /// policy hash slips through manifest generation, and deriving a secret
    /// from it would hand the same secret to unrelated deployments.
    pub fn derive_pod_secret(&self, policy_hash: &[u8; HASH_SIZE]) -> Result<Zeroizing<Vec<u8>>> {
        let empty_hash: [u8; HASH_SIZE] = Sha256::digest([]).into();
        if policy_hash == &empty_hash {
            return Err(SeedError::PlaceholderPolicyHash);
        }
        let info = format!("POD SECRET {}", hex::encode(policy_hash));
        hkdf_derive(&self.pod_state_seed, &self.salt, info.as_bytes())
    }

    /// Derives a secret for a workload from its workload secret ID.
    pub fn derive_workload_secret(&self, workload_secret_id: &str) -> Result<Zeroizing<Vec<u8>>> {
        if workload_secret_id.is_empty() {
            return Err(SeedError::EmptyWorkloadSecretId);
        }
        let info = format!("WORKLOAD SECRET ID: {workload_secret_id}");
        hkdf_derive(&self.pod_state_seed, &self.salt, info.as_bytes())
    }

    /// Generates a fresh random key for the mesh authority.
    ///
    /// Mesh CA keys rotate with every manifest transition, so they are drawn
    /// from the OS RNG rather than derived from the seed.
    pub fn generate_mesh_ca_key(&self) -> SigningKey {
        SigningKey::random(&mut OsRng)
    }

    /// The root CA key, derived from the secret seed.
    pub fn root_ca_key(&self) -> &SigningKey {
        &self.root_ca_key
    }

    /// The key that signs `latest` pointer updates, derived from the seed.
    pub fn transaction_signing_key(&self) -> &SigningKey {
        &self.transaction_signing_key
    }

    /// The public half of the transaction signing key.
    pub fn transaction_verifying_key(&self) -> VerifyingKey {
        self.transaction_signing_key.verifying_key().clone()
    }

    /// The secret used to protect history storage backends.
    pub fn history_seed(&self) -> &[u8] {
        &self.history_seed
    }

    /// The secret seed.
    pub fn seed(&self) -> &[u8] {
        &self.seed
    }

    /// The salt.
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }
}

impl std::fmt::Debug for SeedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secrets stay out of debug output.
        f.debug_struct("SeedEngine")
            .field("seed_len", &self.seed.len())
            .finish_non_exhaustive()
    }
}

/// HKDF-SHA256 with output length equal to the input secret length.
fn hkdf_derive(secret: &[u8], salt: &[u8], info: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), secret);
    let mut out = Zeroizing::new(vec![0u8; secret.len()]);
    hk.expand(info, &mut out)
        .map_err(|_| SeedError::DeriveLength(secret.len()))?;
    Ok(out)
}

/// Deterministically derives a P-256 signing key from a purpose seed.
///
/// Candidate scalars are drawn from an HKDF stream with a counter-suffixed
/// info string; candidates that are zero or not below the group order are
/// skipped. The chance of even one rejection is about 2^-32, so the loop
/// terminates on the first iteration in practice.
fn derive_signing_key(secret: &[u8], salt: &[u8]) -> Result<SigningKey> {
    let hk = Hkdf::<Sha256>::new(Some(salt), secret);
    for counter in 0u8..=u8::MAX {
        let mut info = Vec::with_capacity(16);
        info.extend_from_slice(b"ECDSA SCALAR ");
        info.push(counter);
        let mut candidate = Zeroizing::new([0u8; HASH_SIZE]);
        hk.expand(&info, &mut candidate[..])
            .map_err(|_| SeedError::DeriveLength(HASH_SIZE))?;
        if let Ok(key) = SigningKey::from_slice(&candidate[..]) {
            return Ok(key);
        }
    }
    Err(SeedError::KeyDerivation)
}
