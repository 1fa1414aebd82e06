//! # Cordon History
//!
//! Append-only, content-addressed persistence for the coordinator's manifest
//! history.
//!
//! ## Core Concepts
//!
//! - **Content addressing**: manifests, policies and transitions are stored
//!   under the SHA-256 digest of their bytes and re-hashed on every read, so
//!   a corrupted or lying backend is always detected.
//! - **Transition chain**: each [`Transition`] links a manifest hash to the
//!   hash of its predecessor transition, forming a singly linked, hash-chained
//!   history whose implicit root is the all-zero hash.
//! - **Signed latest pointer**: the single mutable key, `transitions/latest`,
//!   holds a [`LatestTransition`] and is only ever moved via the backend's
//!   compare-and-swap, signed with the transaction signing key. The backend
//!   CAS provides atomicity; the signature provides tamper evidence. Neither
//!   replaces the other.
//!
//! The storage backend is a capability interface ([`Store`]) with get, set,
//! has, compare-and-swap and per-key watch. [`MemStore`] is the in-memory
//! reference backend; [`FsStore`] persists to a directory.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod history;
pub mod store;
pub mod transition;

pub use error::{HistoryError, Result, StoreError};
pub use history::History;
pub use store::{FsStore, MemStore, Store};
pub use transition::{LatestTransition, Transition};

/// Number of octets in the hashes used by this crate.
pub const HASH_SIZE: usize = 32;

/// A SHA-256 content address.
pub type Hash = [u8; HASH_SIZE];

/// The all-zero hash, implicit root of every transition chain.
pub const ROOT_HASH: Hash = [0u8; HASH_SIZE];
