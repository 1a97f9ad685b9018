//! Timeout Scheduler - one shared timer for every pending deadline.
//!
//! ## State
//!
//! ```text
//!            reschedule: earliest = d               fire(gen)
//!   ┌────────┐ ─────────────────────▶ ┌─────────────┐ ──────────▶ disarm(gen)
//!   │ IDLE   │                        │ ARMED(d,gen)│              sweep deadline <= now
//!   └────────┘ ◀───────────────────── └─────────────┘              reschedule
//!        reschedule: no deadline left     │   ▲
//!                                         └───┘ reschedule: earliest != d
//!                                               (abort old task, arm new gen)
//! ```
//!
//! The earliest deadline is re-derived from a table snapshot under the slot
//! lock, so two racing reschedules cannot leave a stale timer armed.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Owner of the deadlines a [`TimeoutScheduler`] watches.
pub trait DeadlineSource: Send + Sync + 'static {
    fn scheduler(&self) -> &TimeoutScheduler;

    /// Earliest deadline among the currently pending requests.
    fn earliest_deadline(&self) -> Option<Instant>;

    /// Time out every request whose deadline is `<= now`. Returns how many were expired.
    fn expire(&self, now: Instant) -> usize;
}

struct ArmedTimer {
    generation: u64,
    deadline: Instant,
    task: AbortHandle,
}

/// Single re-armable timer.
pub struct TimeoutScheduler {
    armed: Mutex<Option<ArmedTimer>>,
    generation: AtomicU64,
    shut_down: AtomicBool,
    timers_armed: AtomicU64,
    runtime: Handle,
}

impl TimeoutScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            armed: Mutex::new(None),
            generation: AtomicU64::new(0),
            shut_down: AtomicBool::new(false),
            timers_armed: AtomicU64::new(0),
            runtime,
        }
    }

    /// Point the timer at the earliest deadline of `source`.
    ///
    /// Disarms when nothing has a deadline; re-arms when the armed deadline is
    /// not the earliest one; otherwise leaves the timer alone.
    pub fn reschedule<S: DeadlineSource>(&self, source: &Arc<S>) {
        let mut armed = self.armed.lock();
        if self.shut_down.load(Ordering::Acquire) {
            Self::disarm(&mut armed);
            return;
        }

        let Some(deadline) = source.earliest_deadline() else {
            if Self::disarm(&mut armed) {
                trace!("Timeout timer disarmed, no deadlines pending");
            }
            return;
        };

        if armed.as_ref().is_some_and(|timer| timer.deadline == deadline) {
            return;
        }
        Self::disarm(&mut armed);

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let weak = Arc::downgrade(source);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            fire(weak, generation);
        });

        *armed = Some(ArmedTimer {
            generation,
            deadline,
            task: task.abort_handle(),
        });
        self.timers_armed.fetch_add(1, Ordering::Relaxed);
        trace!(generation = generation, "Timeout timer armed");
    }

    /// Clear the slot if it still holds timer `generation`.
    fn disarm_if(&self, generation: u64) {
        let mut armed = self.armed.lock();
        if armed
            .as_ref()
            .is_some_and(|timer| timer.generation == generation)
        {
            *armed = None;
        }
    }

    /// Abort the armed timer, if any.
    pub fn cancel(&self) {
        Self::disarm(&mut self.armed.lock());
    }

    /// Abort the armed timer and refuse to arm again.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        self.cancel();
    }

    fn disarm(armed: &mut Option<ArmedTimer>) -> bool {
        match armed.take() {
            Some(timer) => {
                timer.task.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.lock().is_some()
    }

    /// Deadline the timer is currently armed for.
    pub fn armed_deadline(&self) -> Option<Instant> {
        self.armed.lock().as_ref().map(|timer| timer.deadline)
    }

    /// How many times a timer has been armed.
    pub fn timers_armed(&self) -> u64 {
        self.timers_armed.load(Ordering::Relaxed)
    }
}

impl Drop for TimeoutScheduler {
    fn drop(&mut self) {
        Self::disarm(self.armed.get_mut());
    }
}

fn fire<S: DeadlineSource>(source: Weak<S>, generation: u64) {
    let Some(source) = source.upgrade() else {
        return;
    };
    let scheduler = source.scheduler();

    // Release our own slot first so the reschedule below starts clean.
    scheduler.disarm_if(generation);

    let expired = source.expire(Instant::now());
    if expired > 0 {
        debug!(expired = expired, "Timeout sweep expired pending requests");
    }

    scheduler.reschedule(&source);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct FakeSource {
        scheduler: TimeoutScheduler,
        deadlines: Mutex<Vec<Instant>>,
        expired: Mutex<Vec<Instant>>,
    }

    impl FakeSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                scheduler: TimeoutScheduler::new(Handle::current()),
                deadlines: Mutex::new(Vec::new()),
                expired: Mutex::new(Vec::new()),
            })
        }

        fn add(self: &Arc<Self>, after: Duration) -> Instant {
            let deadline = Instant::now() + after;
            self.deadlines.lock().push(deadline);
            self.scheduler.reschedule(self);
            deadline
        }

        fn remove(self: &Arc<Self>, deadline: Instant) {
            self.deadlines.lock().retain(|d| *d != deadline);
            self.scheduler.reschedule(self);
        }
    }

    impl DeadlineSource for FakeSource {
        fn scheduler(&self) -> &TimeoutScheduler {
            &self.scheduler
        }

        fn earliest_deadline(&self) -> Option<Instant> {
            self.deadlines.lock().iter().min().copied()
        }

        fn expire(&self, now: Instant) -> usize {
            let mut deadlines = self.deadlines.lock();
            let (due, keep): (Vec<Instant>, Vec<Instant>) =
                deadlines.drain(..).partition(|d| *d <= now);
            *deadlines = keep;
            self.expired.lock().extend(due.iter().copied());
            due.len()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_arms_for_earliest_deadline_only() {
        let source = FakeSource::new();

        let late = source.add(Duration::from_millis(500));
        assert_eq!(source.scheduler.armed_deadline(), Some(late));
        assert_eq!(source.scheduler.timers_armed(), 1);

        // A later deadline leaves the armed timer alone.
        source.add(Duration::from_millis(900));
        assert_eq!(source.scheduler.armed_deadline(), Some(late));
        assert_eq!(source.scheduler.timers_armed(), 1);

        // An earlier one replaces it.
        let early = source.add(Duration::from_millis(100));
        assert_eq!(source.scheduler.armed_deadline(), Some(early));
        assert_eq!(source.scheduler.timers_armed(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_in_deadline_order_and_rearms() {
        let source = FakeSource::new();
        let third = source.add(Duration::from_millis(300));
        let first = source.add(Duration::from_millis(100));
        let second = source.add(Duration::from_millis(200));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(*source.expired.lock(), vec![first]);
        assert_eq!(source.scheduler.armed_deadline(), Some(second));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*source.expired.lock(), vec![first, second, third]);
        assert!(!source.scheduler.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_deadline_expires_together() {
        let source = FakeSource::new();
        let deadline = Instant::now() + Duration::from_millis(50);
        source.deadlines.lock().extend([deadline, deadline, deadline]);
        source.scheduler.reschedule(&source);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(source.expired.lock().len(), 3);
        assert_eq!(source.scheduler.timers_armed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removing_earliest_moves_timer() {
        let source = FakeSource::new();
        let early = source.add(Duration::from_millis(100));
        let late = source.add(Duration::from_millis(400));

        source.remove(early);
        assert_eq!(source.scheduler.armed_deadline(), Some(late));

        source.remove(late);
        assert!(!source.scheduler.is_armed());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(source.expired.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_arming() {
        let source = FakeSource::new();
        source.add(Duration::from_millis(100));
        source.scheduler.shutdown();
        assert!(!source.scheduler.is_armed());

        source.add(Duration::from_millis(50));
        assert!(!source.scheduler.is_armed());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(source.expired.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_source_does_not_fire() {
        let source = FakeSource::new();
        source.add(Duration::from_millis(10));
        let weak = Arc::downgrade(&source);
        drop(source);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(weak.upgrade().is_none());
    }
}
