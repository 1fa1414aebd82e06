//! Periodic stale-state recovery loop

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use cordon_guard::{Guard, GuardError};

use crate::authorizer::{PeerAuthorizer, RecoveryClient};
use crate::error::{RecoveryError, Result};

/// How often the recoverer checks whether the local state went stale.
pub const PEER_RECOVERY_INTERVAL: Duration = Duration::from_secs(15);

/// Discovers peer coordinators to recover from.
#[async_trait]
pub trait PeerDiscovery: Send + Sync {
    /// Returns the addresses of the currently known peer coordinators,
    /// excluding this replica itself.
    async fn get_peers(&self) -> anyhow::Result<Vec<String>>;
}

/// Periodically recovers the guard's state from peer coordinators.
///
/// The recoverer only ever acts when the guard reports a stale state; a
/// healthy replica pays nothing beyond the periodic check. Failures are
/// logged and retried on the next tick, indefinitely.
pub struct Recoverer {
    guard: Arc<Guard>,
    peers: Arc<dyn PeerDiscovery>,
    client: Arc<dyn RecoveryClient>,
}

impl Recoverer {
    /// Creates a recoverer for `guard`, discovering peers through `peers`
    /// and fetching secrets through `client`.
    pub fn new(
        guard: Arc<Guard>,
        peers: Arc<dyn PeerDiscovery>,
        client: Arc<dyn RecoveryClient>,
    ) -> Self {
        Self {
            guard,
            peers,
            client,
        }
    }

    /// Runs the recovery loop until `shutdown` flips to true.
    ///
    /// One attempt is made immediately; subsequent attempts follow every
    /// [`PEER_RECOVERY_INTERVAL`].
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if let Err(err) = self.recover_from_available_peers().await {
                warn!(%err, "peer recovery attempt failed");
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("peer recovery loop shutting down");
                        return;
                    }
                }
                _ = tokio::time::sleep(PEER_RECOVERY_INTERVAL) => {}
            }
        }
    }

    /// Checks the guard once and, if its state is stale, tries each
    /// discovered peer in order until one recovery succeeds.
    pub async fn recover_from_available_peers(&self) -> Result<()> {
        let old_state = match self.guard.get_state().await {
            Ok(_) => {
                debug!("state is current, nothing to recover");
                return Ok(());
            }
            Err(GuardError::StaleState(state)) => state,
            // A fresh coordinator with no history yet has nothing to recover
            // either; recovery starts once a first manifest exists somewhere.
            Err(GuardError::NoState) => {
                debug!("coordinator is not initialized, nothing to recover");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        let peers = self
            .peers
            .get_peers()
            .await
            .map_err(RecoveryError::PeerDiscovery)?;
        if peers.is_empty() {
            return Err(RecoveryError::NoPeers);
        }

        let mut failures = Vec::new();
        for peer in peers {
            match self.recover_from_peer(&peer, old_state.as_ref()).await {
                Ok(()) => {
                    info!(peer, "recovered state from peer");
                    return Ok(());
                }
                Err(err) => {
                    warn!(peer, %err, "recovery from peer failed");
                    failures.push((peer, err));
                }
            }
        }
        Err(RecoveryError::AllPeersFailed(failures))
    }

    async fn recover_from_peer(
        &self,
        peer: &str,
        old_state: Option<&Arc<cordon_guard::State>>,
    ) -> Result<()> {
        info!(peer, "attempting recovery from peer");
        let authorizer = PeerAuthorizer::new(peer, Arc::clone(&self.client));
        self.guard.reset_state(old_state, &authorizer).await?;
        Ok(())
    }
}
