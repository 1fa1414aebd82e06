//! Health signals for external probing.
//!
//! The HTTP plumbing lives outside this workspace; these functions supply
//! the answers. The distinction between "never configured" and "degraded,
//! recovering" is deliberately preserved so operators can tell a fresh
//! deployment from a replica that lost its state.

use cordon_history::History;

use crate::error::GuardError;
use crate::guard::Guard;

/// Readiness of a coordinator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// A current state is installed; the instance can serve.
    Ready,
    /// No state was ever configured. Expected for a fresh deployment.
    NotInitialized,
    /// State exists but is behind the persisted history; recovery is
    /// in progress.
    Recovering,
}

/// Liveness: the history backend answers at all.
pub async fn liveness(history: &History) -> bool {
    history.has_latest().await.is_ok()
}

/// Readiness of the given guard.
///
/// Backend failures propagate as errors, distinct from the three regular
/// readiness outcomes.
pub async fn readiness(guard: &Guard) -> Result<Readiness, GuardError> {
    match guard.get_state().await {
        Ok(_) => Ok(Readiness::Ready),
        Err(GuardError::NoState) => Ok(Readiness::NotInitialized),
        Err(GuardError::StaleState(_)) => Ok(Readiness::Recovering),
        Err(err) => Err(err),
    }
}
