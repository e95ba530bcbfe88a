//! Monotonic time source consumed by [`crate::schedule::Schedule`].
//!
//! The scheduler never reads the wall clock directly so that tests can
//! substitute a [`VirtualClock`] and drive due dates deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::{Condvar, MutexGuard};

use crate::schedule::Inner;

/// Seconds since an arbitrary but fixed epoch. Only relative comparisons and
/// differences are meaningful; the scheduler never interprets this as a
/// calendar date.
pub type Seconds = u64;

/// A monotonic time source.
///
/// Resolution is whole seconds at this boundary; callers that need finer
/// scheduling precision should quantize their own due dates accordingly.
pub trait Clock: Send + Sync {
    fn now(&self) -> Seconds;

    /// Park `guard` on `cond` until `deadline` (in this clock's own units)
    /// is reached or `cond` is notified, whichever comes first. Mirrors
    /// the original `ods_thread_wait(cond, lock, time_t wait)`, but routed
    /// through the clock so a virtual clock can drive the wakeup itself
    /// instead of real wall-clock time.
    fn wait_until(&self, cond: &Condvar, guard: &mut MutexGuard<'_, Inner>, deadline: Seconds);
}

/// Wall-clock backed implementation used by the running daemon.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Seconds {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the epoch")
            .as_secs()
    }

    fn wait_until(&self, cond: &Condvar, guard: &mut MutexGuard<'_, Inner>, deadline: Seconds) {
        let delta = deadline.saturating_sub(self.now());
        let instant_deadline = Instant::now() + Duration::from_secs(delta);
        cond.wait_until(guard, instant_deadline);
    }
}

/// Deterministic clock for tests: advances only when told to.
///
/// `wait_until` polls rather than computing a single real-time deadline,
/// so that advancing the clock's value from another thread (with `set` or
/// `advance`) wakes a parked `pop()` within one poll interval, without
/// needing the advancing thread to know about the schedule's condition
/// variable.
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: AtomicU64,
}

impl VirtualClock {
    const POLL_INTERVAL: Duration = Duration::from_millis(5);

    pub fn new(start: Seconds) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn set(&self, value: Seconds) {
        self.now.store(value, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: Seconds) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Seconds {
        self.now.load(Ordering::SeqCst)
    }

    fn wait_until(&self, cond: &Condvar, guard: &mut MutexGuard<'_, Inner>, deadline: Seconds) {
        loop {
            if self.now() >= deadline {
                return;
            }
            let timed_out = cond.wait_for(guard, Self::POLL_INTERVAL).timed_out();
            if !timed_out {
                return;
            }
        }
    }
}
