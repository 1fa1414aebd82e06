//! Error types for state guard operations

use std::sync::Arc;

use thiserror::Error;

use cordon_manifest::{HexString, ManifestError};
use cordon_history::HistoryError;

use crate::state::State;

/// State guard error types
#[derive(Debug, Error)]
pub enum GuardError {
    /// The coordinator has no state and the history is empty: nothing was
    /// ever configured.
    #[error("coordinator is not initialized")]
    NoState,

    /// The cached state (if any) is behind the persisted history. The
    /// carried snapshot, when present, is still valid for reads.
    ///
    /// Not an error in the exceptional sense: this is the steady state that
    /// drives recovery.
    #[error("coordinator state is outdated")]
    StaleState(Option<Arc<State>>),

    /// A state-modifying operation lost a race against a concurrent update.
    /// Recoverable: re-fetch the state and retry.
    #[error("coordinator state was updated concurrently")]
    ConcurrentUpdate,

    /// The manifest references a policy that was not supplied.
    #[error("no policy provided for hash {0}")]
    DanglingPolicy(HexString),

    /// The persistent history failed.
    #[error("history: {0}")]
    History(#[from] HistoryError),

    /// The manifest bytes could not be parsed or a manifest field is bad.
    #[error("manifest: {0}")]
    Manifest(#[from] ManifestError),

    /// The seed source authorizer rejected the source or failed.
    #[error("authorizing seed source: {0:#}")]
    SeedSource(anyhow::Error),
}

/// Result type for state guard operations
pub type Result<T> = std::result::Result<T, GuardError>;
