//! # Cordon Guard
//!
//! The single source of truth for the currently enforced manifest.
//!
//! [`Guard`] manages an immutable [`State`] snapshot that can be handed out
//! to other components. A `State` never changes once published and can be
//! used for as long as necessary, but callers must consistently operate on a
//! single snapshot: decisions derived from one `State` must not be mixed
//! with data from another.
//!
//! State manipulation follows a compare-and-swap discipline. Callers first
//! obtain the current state with [`Guard::get_state`], decide based on it,
//! and pass it back as the `old` argument of [`Guard::update_state`] or
//! [`Guard::reset_state`]. If the guard's state moved in between, the
//! operation reports a concurrent update instead of clobbering it.
//!
//! For deployments with multiple coordinator replicas,
//! [`Guard::watch_history`] tracks the persisted history and marks the
//! current snapshot stale when another replica moves it forward. A stale
//! state remains usable for reads, since it was valid at some point, but
//! this replica must recover before it can update the state again.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ca;
pub mod error;
pub mod guard;
pub mod metrics;
pub mod probes;
pub mod state;

pub use ca::CertAuthority;
pub use error::{GuardError, Result};
pub use guard::{Guard, SecretSourceAuthorizer};
pub use metrics::GuardMetrics;
pub use state::State;
