//! Observability counters for the WAL engine.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared atomic counters incremented by the WAL engine.
///
/// All accesses use `Ordering::Relaxed` — the counters are advisory.
#[derive(Debug, Default)]
pub struct WalCounters {
    /// Records appended to the sample log.
    pub records_logged: AtomicU64,
    /// Checkpoint passes that completed, including their truncations.
    pub checkpoints_completed: AtomicU64,
    /// Checkpoint passes aborted by an error.
    pub checkpoints_failed: AtomicU64,
    /// Series snapshots written across all passes.
    pub series_checkpointed: AtomicU64,
}

impl WalCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a point-in-time snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> WalCountersSnapshot {
        WalCountersSnapshot {
            records_logged: self.records_logged.load(Ordering::Relaxed),
            checkpoints_completed: self.checkpoints_completed.load(Ordering::Relaxed),
            checkpoints_failed: self.checkpoints_failed.load(Ordering::Relaxed),
            series_checkpointed: self.series_checkpointed.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of [`WalCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalCountersSnapshot {
    /// Records appended to the sample log.
    pub records_logged: u64,
    /// Checkpoint passes completed.
    pub checkpoints_completed: u64,
    /// Checkpoint passes aborted by an error.
    pub checkpoints_failed: u64,
    /// Series snapshots written.
    pub series_checkpointed: u64,
}
