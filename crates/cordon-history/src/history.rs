//! Content-addressed history over an arbitrary [`Store`] backend.

use std::sync::Arc;

use p256::ecdsa::{SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{HistoryError, Result};
use crate::store::Store;
use crate::transition::{LatestTransition, Transition};
use crate::{Hash, ROOT_HASH};

/// Key of the single mutable pointer into the transition chain.
const LATEST_KEY: &str = "transitions/latest";

/// The manifest transition history of the coordinator.
///
/// Translates get/set of domain objects into content-addressed store
/// operations and provides the `latest`-pointer primitives. Reads never
/// trust the backend's key-to-content mapping: returned bytes are re-hashed
/// and compared against the requested address.
#[derive(Clone)]
pub struct History {
    store: Arc<dyn Store>,
}

impl History {
    /// Creates a new history on top of the given storage backend.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Returns the manifest bytes for the given hash.
    pub async fn get_manifest(&self, hash: &Hash) -> Result<Vec<u8>> {
        self.get_content_addressed("manifests", hash).await
    }

    /// Stores the manifest bytes and returns their hash.
    pub async fn set_manifest(&self, manifest: &[u8]) -> Result<Hash> {
        self.set_content_addressed("manifests", manifest).await
    }

    /// Returns the policy bytes for the given hash.
    pub async fn get_policy(&self, hash: &Hash) -> Result<Vec<u8>> {
        self.get_content_addressed("policies", hash).await
    }

    /// Stores the policy bytes and returns their hash.
    pub async fn set_policy(&self, policy: &[u8]) -> Result<Hash> {
        self.set_content_addressed("policies", policy).await
    }

    /// Returns the transition for the given hash.
    pub async fn get_transition(&self, hash: &Hash) -> Result<Transition> {
        let bytes = self.get_content_addressed("transitions", hash).await?;
        Transition::from_bytes(&bytes)
    }

    /// Stores the transition and returns its hash.
    pub async fn set_transition(&self, transition: &Transition) -> Result<Hash> {
        self.set_content_addressed("transitions", &transition.to_bytes())
            .await
    }

    /// Returns the latest transition, verified against the given public key.
    pub async fn get_latest(&self, key: &VerifyingKey) -> Result<LatestTransition> {
        let latest = self.get_latest_insecure().await?;
        latest.verify(key)?;
        Ok(latest)
    }

    /// Returns the latest transition without verifying its signature.
    ///
    /// Only used to bootstrap recovery, where no public key is known yet.
    /// Never a basis for authorizing state changes.
    pub async fn get_latest_insecure(&self) -> Result<LatestTransition> {
        let bytes = self.store.get(LATEST_KEY).await?;
        LatestTransition::from_bytes(&bytes)
    }

    /// Returns whether a latest transition exists, without reading or
    /// verifying it.
    pub async fn has_latest(&self) -> Result<bool> {
        Ok(self.store.has(LATEST_KEY).await?)
    }

    /// Signs `new` and installs it as the latest transition if the current
    /// latest still equals `old`.
    ///
    /// `None` for `old` means "no previous value": the compare-and-swap
    /// predicate is the empty byte string.
    pub async fn set_latest(
        &self,
        old: Option<&LatestTransition>,
        new: &mut LatestTransition,
        signing_key: &SigningKey,
    ) -> Result<()> {
        new.sign(signing_key)?;
        let old_bytes = LatestTransition::encode_optional(old);
        self.store
            .compare_and_swap(LATEST_KEY, &old_bytes, &new.to_bytes())
            .await?;
        Ok(())
    }

    /// Walks the transition chain from `transition_hash` to the root,
    /// invoking `consume` for every node.
    ///
    /// The all-zero root hash terminates the walk and is not passed to the
    /// closure. Any error from the closure or a missing transition aborts
    /// the walk.
    pub async fn walk_transitions<F>(&self, mut transition_hash: Hash, mut consume: F) -> Result<()>
    where
        F: FnMut(Hash, &Transition) -> Result<()>,
    {
        while transition_hash != ROOT_HASH {
            let transition = self.get_transition(&transition_hash).await?;
            consume(transition_hash, &transition)?;
            transition_hash = transition.previous_transition_hash;
        }
        Ok(())
    }

    /// Re-publishes parsed latest-transition values whenever the backend
    /// reports a change to the latest pointer.
    ///
    /// The returned channel closes when the backend watch ends; the watch is
    /// cancelled by dropping the receiver. Malformed values are logged and
    /// skipped.
    pub fn watch_latest_transitions(&self) -> Result<mpsc::UnboundedReceiver<LatestTransition>> {
        let mut raw = self.store.watch(LATEST_KEY)?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(bytes) = raw.recv().await {
                match LatestTransition::from_bytes(&bytes) {
                    Ok(latest) => {
                        if tx.send(latest).is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "store watcher delivered a malformed latest transition");
                    }
                }
            }
            warn!("store watcher closed");
        });
        Ok(rx)
    }

    async fn get_content_addressed(&self, kind: &str, hash: &Hash) -> Result<Vec<u8>> {
        let key = format!("{kind}/{}", hex::encode(hash));
        let data = self.store.get(&key).await?;
        let actual: Hash = Sha256::digest(&data).into();
        if &actual != hash {
            return Err(HistoryError::HashMismatch {
                expected: *hash,
                actual,
            });
        }
        Ok(data)
    }

    async fn set_content_addressed(&self, kind: &str, data: &[u8]) -> Result<Hash> {
        let hash: Hash = Sha256::digest(data).into();
        let key = format!("{kind}/{}", hex::encode(hash));
        self.store.set(&key, data).await?;
        Ok(hash)
    }
}
