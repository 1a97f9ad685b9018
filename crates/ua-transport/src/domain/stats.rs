//! Transport counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for a transport channel
#[derive(Debug, Default)]
pub struct TransportStats {
    /// Requests accepted by dispatch
    pub dispatched: AtomicU64,
    /// Requests completed with a response
    pub succeeded: AtomicU64,
    /// Requests completed with an error other than timeout/cancel
    pub failed: AtomicU64,
    /// Requests expired by the timeout sweep
    pub timed_out: AtomicU64,
    /// Requests cancelled by the caller or by close
    pub cancelled: AtomicU64,
    /// Completions that lost the race to another path
    pub late_completions_discarded: AtomicU64,
    /// Times the shared timeout timer was (re)armed
    pub timers_armed: AtomicU64,
}

/// Point-in-time copy of [`TransportStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub cancelled: u64,
    pub late_completions_discarded: u64,
    pub timers_armed: u64,
}

impl StatsSnapshot {
    /// Requests that reached a final state.
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed + self.timed_out + self.cancelled
    }
}

impl TransportStats {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            late_completions_discarded: self.late_completions_discarded.load(Ordering::Relaxed),
            timers_armed: self.timers_armed.load(Ordering::Relaxed),
        }
    }
}
