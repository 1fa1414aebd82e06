//! Error types for peer recovery

use thiserror::Error;

use cordon_guard::GuardError;

/// Recovery error types
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// Peer discovery returned no peers to recover from.
    #[error("no peers found")]
    NoPeers,

    /// Peer discovery itself failed.
    #[error("getting peers: {0:#}")]
    PeerDiscovery(anyhow::Error),

    /// Resetting the guard state failed.
    #[error("resetting state: {0}")]
    Guard(#[from] GuardError),

    /// Every discovered peer failed; carries one error per peer.
    #[error("{}", describe_peer_failures(.0))]
    AllPeersFailed(Vec<(String, RecoveryError)>),
}

fn describe_peer_failures(failures: &[(String, RecoveryError)]) -> String {
    let mut message = String::from("recovery failed for all peers");
    for (peer, err) in failures {
        message.push_str(&format!("; {peer}: {err}"));
    }
    message
}

/// Result type for recovery operations
pub type Result<T> = std::result::Result<T, RecoveryError>;
