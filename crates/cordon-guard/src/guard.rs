//! The guard itself: serialized, validated state manipulation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{info, warn};

use cordon_history::{Hash, History, LatestTransition, Transition, ROOT_HASH};
use cordon_manifest::{HexString, Manifest};
use cordon_seed::SeedEngine;
use p256::ecdsa::SigningKey;

use crate::ca::CertAuthority;
use crate::error::{GuardError, Result};
use crate::metrics::GuardMetrics;
use crate::state::State;

/// Backoff between watch subscriptions after a watch failure.
const RESUBSCRIBE_BACKOFF: Duration = Duration::from_secs(5);

/// Obtains secrets and authorizes their source.
///
/// Implementations are solely responsible for verifying that whoever
/// supplies the seed is allowed to hold it according to the manifest being
/// recovered to: other coordinators identified by their role, or seedshare
/// owners identified by their public keys.
#[async_trait]
pub trait SecretSourceAuthorizer: Send + Sync {
    /// Obtains a seed engine and a mesh CA key, verifying their source
    /// against the given manifest's trust fields.
    async fn authorize_by_manifest(
        &self,
        manifest: &Manifest,
    ) -> anyhow::Result<(Arc<SeedEngine>, SigningKey)>;
}

/// Guards the current state of the coordinator.
///
/// The guard owns the single mutable reference to the current [`State`];
/// all mutation funnels through compare-and-swap style methods. Each guard
/// instance is constructed explicitly and handed to its collaborators.
pub struct Guard {
    // The cell holding the current snapshot. Locked only for O(1) pointer
    // operations, never across an await point.
    cell: Mutex<Option<Arc<State>>>,
    history: History,
    metrics: GuardMetrics,
}

impl Guard {
    /// Creates a new guard over the given history.
    pub fn new(history: History) -> Self {
        Self {
            cell: Mutex::new(None),
            history,
            metrics: GuardMetrics::default(),
        }
    }

    /// The history this guard persists to.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// The metrics of this guard.
    pub fn metrics(&self) -> &GuardMetrics {
        &self.metrics
    }

    /// Returns the current state.
    ///
    /// Outcomes:
    /// - no state cached, no persisted history: [`GuardError::NoState`];
    /// - no state cached but a latest pointer exists:
    ///   [`GuardError::StaleState`] without a snapshot — another instance
    ///   moved the history and this one must recover;
    /// - state cached but marked stale: [`GuardError::StaleState`] carrying
    ///   the snapshot, which remains valid for reads;
    /// - otherwise the current snapshot.
    pub async fn get_state(&self) -> Result<Arc<State>> {
        let state = self.cell.lock().clone();
        match state {
            None => {
                if self.history.has_latest().await? {
                    Err(GuardError::StaleState(None))
                } else {
                    Err(GuardError::NoState)
                }
            }
            Some(state) if state.is_stale() => Err(GuardError::StaleState(Some(state))),
            Some(state) => Ok(state),
        }
    }

    /// Advances the coordinator to a new manifest generation.
    ///
    /// `old_state` must be a snapshot obtained from [`Guard::get_state`], or
    /// `None` for the very first manifest. Every policy hash referenced by
    /// the manifest must have a matching policy in `policies`.
    ///
    /// If the persisted latest pointer moved since `old_state` was read, the
    /// store-level compare-and-swap fails and the call returns
    /// [`GuardError::ConcurrentUpdate`]; the caller re-fetches and retries.
    ///
    /// If the persistence succeeds but the in-memory swap loses against a
    /// concurrent update, the computed state is still returned: the
    /// transition it persisted is durably part of the chain (the winning
    /// update chained onto it), so the caller may answer from it. Only the
    /// cached pointer and the generation gauge are left untouched.
    pub async fn update_state(
        &self,
        old_state: Option<&Arc<State>>,
        seed_engine: Arc<SeedEngine>,
        manifest_bytes: &[u8],
        policies: &[Vec<u8>],
    ) -> Result<Arc<State>> {
        let manifest = Manifest::from_slice(manifest_bytes)?;

        let mut policy_hashes = HashSet::new();
        for policy in policies {
            policy_hashes.insert(self.history.set_policy(policy).await?);
        }
        for key in manifest.policies.keys() {
            let hash = key.to_hash()?;
            if !policy_hashes.contains(&hash) {
                return Err(GuardError::DanglingPolicy(key.clone()));
            }
        }

        let manifest_hash = self.history.set_manifest(manifest_bytes).await?;
        let transition = Transition {
            manifest_hash,
            previous_transition_hash: old_state
                .map(|s| s.latest().transition_hash)
                .unwrap_or(ROOT_HASH),
        };
        let transition_hash = self.history.set_transition(&transition).await?;

        let mut latest = LatestTransition::new(transition_hash);
        let old_latest = old_state.map(|s| s.latest());
        self.history
            .set_latest(old_latest, &mut latest, seed_engine.transaction_signing_key())
            .await
            .map_err(|err| match err {
                cordon_history::HistoryError::Store(store_err) if store_err.is_conflict() => {
                    GuardError::ConcurrentUpdate
                }
                err => GuardError::History(err),
            })?;

        let mesh_ca_key = seed_engine.generate_mesh_ca_key();
        let ca = CertAuthority::new(seed_engine.root_ca_key().clone(), mesh_ca_key);
        let generation = old_state.map(|s| s.generation()).unwrap_or(0) + 1;

        let next = Arc::new(State::new(
            seed_engine,
            manifest,
            manifest_bytes.to_vec(),
            ca,
            latest,
            generation,
        ));
        if !self.swap(old_state, &next) {
            // Another update won the in-memory race. Its transition chained
            // onto ours, so ours is a committed ancestor of the current
            // state: return it, but leave the cached pointer and the gauge
            // to the winner.
            return Ok(next);
        }
        self.metrics.manifest_generation.set(generation as i64);
        info!(generation, "installed new manifest generation");
        Ok(next)
    }

    /// Resets the coordinator to the latest persisted state.
    ///
    /// For recovery scenarios, where a latest state exists but can't be
    /// verified without the secrets. The state is loaded insecurely first,
    /// the corresponding manifest is passed to `authorizer` to obtain and
    /// vet the seed material, and the loaded state is then re-read with
    /// signature verification. If the history moved between the two reads,
    /// the call fails with [`GuardError::ConcurrentUpdate`] and can be
    /// retried from scratch.
    pub async fn reset_state(
        &self,
        old_state: Option<&Arc<State>>,
        authorizer: &dyn SecretSourceAuthorizer,
    ) -> Result<Arc<State>> {
        let insecure_latest = self.history.get_latest_insecure().await?;
        let transition = self
            .history
            .get_transition(&insecure_latest.transition_hash)
            .await?;
        let manifest_bytes = self.history.get_manifest(&transition.manifest_hash).await?;
        let manifest = Manifest::from_slice(&manifest_bytes)?;

        let (seed_engine, mesh_ca_key) = authorizer
            .authorize_by_manifest(&manifest)
            .await
            .map_err(GuardError::SeedSource)?;

        let latest = self
            .history
            .get_latest(&seed_engine.transaction_verifying_key())
            .await?;
        if insecure_latest.transition_hash != latest.transition_hash {
            warn!(
                from = %hex::encode(insecure_latest.transition_hash),
                to = %hex::encode(latest.transition_hash),
                "history moved between insecure and verified read"
            );
            return Err(GuardError::ConcurrentUpdate);
        }

        let ca = CertAuthority::new(seed_engine.root_ca_key().clone(), mesh_ca_key);
        let mut generation = 0usize;
        self.history
            .walk_transitions(latest.transition_hash, |_, _| {
                generation += 1;
                Ok(())
            })
            .await?;

        let next = Arc::new(State::new(
            seed_engine,
            manifest,
            manifest_bytes,
            ca,
            latest,
            generation,
        ));
        if !self.swap(old_state, &next) {
            return Err(GuardError::ConcurrentUpdate);
        }
        self.metrics.manifest_generation.set(generation as i64);
        info!(generation, "state reset to persisted history");
        Ok(next)
    }

    /// Monitors the history and marks the cached state stale when another
    /// instance moves it forward.
    ///
    /// Blocks until the shutdown signal fires. A failed watch subscription
    /// is retried after a fixed backoff; this is the only automatically
    /// retried failure in the engine.
    pub async fn watch_history(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            match self.history.watch_latest_transitions() {
                Ok(mut updates) => loop {
                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                return;
                            }
                        }
                        update = updates.recv() => match update {
                            Some(latest) => self.observe_latest(latest).await,
                            None => {
                                warn!("watch channel closed unexpectedly, resubscribing");
                                break;
                            }
                        }
                    }
                },
                Err(err) => {
                    warn!(error = %err, "subscribing to latest transitions failed");
                }
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
                _ = tokio::time::sleep(RESUBSCRIBE_BACKOFF) => {}
            }
        }
    }

    /// Handles one watch notification.
    ///
    /// A notification about a transition that is already among the cached
    /// state's ancestors is the delayed echo of an update this instance
    /// performed itself; marking the state stale for it would needlessly
    /// drop this replica out of the mesh. Two rapid self-updates with late
    /// notifications are covered by the same check, since both transitions
    /// are ancestors of the final state.
    async fn observe_latest(&self, notified: LatestTransition) {
        let Some(state) = self.cell.lock().clone() else {
            return;
        };
        let mut in_ancestors = false;
        let walk = self
            .history
            .walk_transitions(state.latest().transition_hash, |hash, _| {
                if hash == notified.transition_hash {
                    in_ancestors = true;
                }
                Ok(())
            })
            .await;
        if let Err(err) = walk {
            warn!(error = %err, "received problematic transition update");
            return;
        }
        if in_ancestors {
            return;
        }
        info!(
            from = %hex::encode(state.latest().transition_hash),
            to = %hex::encode(notified.transition_hash),
            "history changed, marking state as stale"
        );
        state.mark_stale();
    }

    /// Returns all manifests, the current one last, and the policies
    /// referenced by at least one of them.
    pub async fn get_history(&self) -> Result<(Vec<Vec<u8>>, HashMap<HexString, Vec<u8>>)> {
        let state = self.get_state().await?;

        let mut manifests = Vec::new();
        let mut policy_refs: Vec<Hash> = Vec::new();
        let mut walk_hash = state.latest().transition_hash;
        while walk_hash != ROOT_HASH {
            let transition = self.history.get_transition(&walk_hash).await?;
            let manifest_bytes = self.history.get_manifest(&transition.manifest_hash).await?;
            let manifest = Manifest::from_slice(&manifest_bytes)?;
            manifests.push(manifest_bytes);
            policy_refs.extend(manifest.policy_hashes()?);
            walk_hash = transition.previous_transition_hash;
        }

        let mut policies = HashMap::new();
        for hash in policy_refs {
            let key = HexString::from(hash);
            if policies.contains_key(&key) {
                continue;
            }
            let policy = self.history.get_policy(&hash).await?;
            policies.insert(key, policy);
        }

        // Walking yields newest first; callers expect chronological order.
        manifests.reverse();
        Ok((manifests, policies))
    }

    /// Compare-and-swap on the state cell, by snapshot identity.
    fn swap(&self, old: Option<&Arc<State>>, next: &Arc<State>) -> bool {
        let mut cell = self.cell.lock();
        let unchanged = match (old, cell.as_ref()) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        if unchanged {
            *cell = Some(Arc::clone(next));
        }
        unchanged
    }
}

impl std::fmt::Debug for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard")
            .field("state", &*self.cell.lock())
            .finish_non_exhaustive()
    }
}
