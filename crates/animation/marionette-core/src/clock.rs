//! Time sources for the playback loop.
//!
//! Timing is soft real-time: the monotonic clock plus a best-effort sleep keep
//! the tick period on a general-purpose OS, but a late wake-up just delays the
//! next tick.

use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

/// Monotonic time plus a way to wait.
pub trait Clock {
    /// Time since an arbitrary fixed origin. Never decreases.
    fn now(&self) -> Duration;

    /// Block for about `duration`.
    fn sleep(&mut self, duration: Duration);
}

/// Wall-clock time from [`Instant`], sleeping the current thread.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Simulated clock: time moves only when slept or advanced, plus an optional
/// fixed cost charged on every reading to model per-tick processing time.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
    cost_per_read: Duration,
    sleeps: RefCell<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each call to [`Clock::now`] advances time by `cost` after reading.
    pub fn with_cost_per_read(cost: Duration) -> Self {
        Self {
            cost_per_read: cost,
            ..Self::default()
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Every sleep requested so far.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    pub fn elapsed(&self) -> Duration {
        self.now.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        let t = self.now.get();
        self.now.set(t + self.cost_per_read);
        t
    }

    fn sleep(&mut self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        self.advance(duration);
    }
}
