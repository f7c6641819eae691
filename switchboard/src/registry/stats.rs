//! Per-destination delivery counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Delivery counters for one destination.
///
/// Tracked with relaxed atomics; counters are monotonic and independent, so
/// a snapshot is not required to be a consistent cut.
#[derive(Debug, Default)]
pub struct DestinationStats {
    sent: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of a destination's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Envelopes accepted by the send path (inline or enqueued).
    pub sent: u64,
    /// Envelopes whose handlers all completed.
    pub delivered: u64,
    /// Envelopes whose handling failed.
    pub failed: u64,
    /// Failed envelopes dropped or dead-lettered without a waiting caller.
    pub dropped: u64,
}

impl DestinationStats {
    pub(crate) fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
