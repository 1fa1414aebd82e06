//! Error types for seed-based key derivation

use thiserror::Error;

use crate::HASH_SIZE;

/// Seed engine error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeedError {
    /// The salt does not have the required length.
    #[error("salt must be exactly {HASH_SIZE} bytes long, got {0}")]
    InvalidSaltLength(usize),

    /// The secret seed is too short.
    #[error("secret seed must be at least {HASH_SIZE} bytes long, got {0}")]
    SeedTooShort(usize),

    /// HKDF rejected the requested output length.
    #[error("deriving {0} bytes of key material failed")]
    DeriveLength(usize),

    /// No derivation candidate produced a valid ECDSA scalar.
    #[error("exhausted candidates while deriving an ECDSA key")]
    KeyDerivation,

    /// A workload secret was requested with an empty identifier.
    #[error("workload secret ID must not be empty")]
    EmptyWorkloadSecretId,

    /// A pod secret was requested for the hash of empty input.
    #[error("policy hash is the hash of empty input")]
    PlaceholderPolicyHash,
}

/// Result type for seed engine operations
pub type Result<T> = std::result::Result<T, SeedError>;
