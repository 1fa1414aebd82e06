//! # Cordon Recovery
//!
//! Automatic peer recovery for coordinator replicas.
//!
//! A replica that restarts, or that falls behind the persisted history,
//! holds no usable secret seed: it can read the history but cannot verify
//! or extend it. The [`Recoverer`] closes that gap without operator
//! intervention. On a fixed interval it checks whether the local guard
//! reports a stale state, discovers peer coordinators, and asks one of them
//! for the seed material over an attested channel.
//!
//! Trust is anchored in the manifest being recovered to: the
//! [`RecoveryClient`] must only hand back secrets obtained from a peer that
//! attests as a legitimate coordinator under that manifest's reference
//! values. The attested transport itself lives outside this workspace.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authorizer;
pub mod error;
pub mod recoverer;

pub use authorizer::{PeerAuthorizer, RecoverResponse, RecoveryClient};
pub use error::{RecoveryError, Result};
pub use recoverer::{PeerDiscovery, Recoverer, PEER_RECOVERY_INTERVAL};
