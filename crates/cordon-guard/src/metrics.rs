//! Guard metrics.
//!
//! Plain atomics following Prometheus naming conventions; an exporter
//! surfaces them under the `cordon_coordinator` subsystem.

use std::sync::atomic::{AtomicI64, Ordering};

/// A gauge backed by a plain atomic.
#[derive(Debug, Default)]
pub struct Gauge(AtomicI64);

impl Gauge {
    /// Sets the gauge.
    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Relaxed);
    }

    /// Reads the gauge.
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Metrics exported by a [`Guard`](crate::Guard) instance.
#[derive(Debug, Default)]
pub struct GuardMetrics {
    /// `manifest_generation`: the current state's chain depth. Updated only
    /// when an update is actually installed as current, never by the loser
    /// of a concurrent-update race.
    pub manifest_generation: Gauge,
}
