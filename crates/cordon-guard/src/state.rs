//! Immutable state snapshots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cordon_history::LatestTransition;
use cordon_manifest::Manifest;
use cordon_seed::SeedEngine;

use crate::ca::CertAuthority;

/// A snapshot of the coordinator's manifest history.
///
/// Every field except the staleness flag is immutable; a new state is always
/// a new instance. Holders of an old snapshot may keep reading it (e.g. to
/// finish answering a request) but must never treat it as current once
/// [`State::is_stale`] reports true.
pub struct State {
    seed_engine: Arc<SeedEngine>,
    manifest: Manifest,
    manifest_bytes: Vec<u8>,
    ca: CertAuthority,

    latest: LatestTransition,
    generation: usize,

    // Flipped from false to true exactly once, never back.
    stale: AtomicBool,
}

impl State {
    pub(crate) fn new(
        seed_engine: Arc<SeedEngine>,
        manifest: Manifest,
        manifest_bytes: Vec<u8>,
        ca: CertAuthority,
        latest: LatestTransition,
        generation: usize,
    ) -> Self {
        Self {
            seed_engine,
            manifest,
            manifest_bytes,
            ca,
            latest,
            generation,
            stale: AtomicBool::new(false),
        }
    }

    /// The seed engine of this state.
    pub fn seed_engine(&self) -> &Arc<SeedEngine> {
        &self.seed_engine
    }

    /// The manifest enforced by this state. Must not be modified.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The raw bytes of the manifest, exactly as persisted.
    pub fn manifest_bytes(&self) -> &[u8] {
        &self.manifest_bytes
    }

    /// The CA key bundle of this state.
    pub fn ca(&self) -> &CertAuthority {
        &self.ca
    }

    /// The signed latest-transition pointer this state was built from.
    pub fn latest(&self) -> &LatestTransition {
        &self.latest
    }

    /// The chain depth of this state: the number of transitions between its
    /// latest pointer and the root. Monotonic across successful updates on
    /// one instance; exported for observability only, never used for
    /// conflict resolution.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Whether this snapshot is known to be behind the persisted history.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    pub(crate) fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }

    /// Constructs a state for tests of packages that consume snapshots.
    ///
    /// Fills the externally observable fields only. States built this way
    /// must not be passed back into [`Guard`](crate::Guard) methods.
    pub fn for_test(
        seed_engine: Arc<SeedEngine>,
        manifest: Manifest,
        manifest_bytes: Vec<u8>,
        ca: CertAuthority,
    ) -> Self {
        Self::new(
            seed_engine,
            manifest,
            manifest_bytes,
            ca,
            LatestTransition::new([0u8; cordon_history::HASH_SIZE]),
            0,
        )
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of debug output.
        f.debug_struct("State")
            .field("generation", &self.generation)
            .field(
                "transition",
                &hex::encode(self.latest.transition_hash),
            )
            .field("stale", &self.is_stale())
            .finish_non_exhaustive()
    }
}
