//! Peer-backed secret source

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use p256::ecdsa::SigningKey;
use zeroize::Zeroizing;

use cordon_guard::SecretSourceAuthorizer;
use cordon_manifest::Manifest;
use cordon_seed::SeedEngine;

/// Secret material handed back by a peer coordinator.
///
/// The seed and the mesh CA key are wiped from memory when the response is
/// dropped. The salt is public and travels alongside the persisted history.
pub struct RecoverResponse {
    /// The cluster's secret seed.
    pub seed: Zeroizing<Vec<u8>>,
    /// The public salt the seed engine was created with.
    pub salt: Vec<u8>,
    /// The current mesh CA key, as a SEC1 PEM document.
    pub mesh_ca_key_pem: Zeroizing<String>,
}

/// Transport for fetching secrets from a peer coordinator.
///
/// Implementations must establish an attested channel to the peer and
/// verify, against the given manifest's reference values, that the peer is
/// a legitimate coordinator before accepting any secrets from it.
#[async_trait]
pub trait RecoveryClient: Send + Sync {
    /// Requests the secret seed and mesh CA key from `peer`.
    async fn recover(&self, peer: &str, manifest: &Manifest) -> anyhow::Result<RecoverResponse>;
}

/// A [`SecretSourceAuthorizer`] that obtains the seed from a single peer.
///
/// One authorizer is built per recovery attempt, bound to the peer chosen
/// for that attempt.
pub struct PeerAuthorizer {
    peer: String,
    client: Arc<dyn RecoveryClient>,
}

impl PeerAuthorizer {
    /// Creates an authorizer that recovers from `peer` via `client`.
    pub fn new(peer: impl Into<String>, client: Arc<dyn RecoveryClient>) -> Self {
        Self {
            peer: peer.into(),
            client,
        }
    }
}

#[async_trait]
impl SecretSourceAuthorizer for PeerAuthorizer {
    async fn authorize_by_manifest(
        &self,
        manifest: &Manifest,
    ) -> anyhow::Result<(Arc<SeedEngine>, SigningKey)> {
        let response = self
            .client
            .recover(&self.peer, manifest)
            .await
            .with_context(|| format!("recovering from peer {}", self.peer))?;

        let seed_engine = SeedEngine::new(&response.seed, &response.salt)
            .context("creating seed engine from recovered seed")?;

        let mesh_ca_key = p256::SecretKey::from_sec1_pem(&response.mesh_ca_key_pem)
            .context("parsing recovered mesh CA key")?;

        Ok((Arc::new(seed_engine), SigningKey::from(mesh_ca_key)))
    }
}
