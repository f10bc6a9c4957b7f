use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Time source for the search deadline.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock started.
    fn elapsed(&self) -> Duration;
}

pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Clock driven by hand. With a step set, every reading advances it by that
/// step, which makes a deadline fire after a known number of checks.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
    step: u64,
}

impl ManualClock {
    pub const fn new() -> Self {
        ManualClock {
            nanos: AtomicU64::new(0),
            step: 0,
        }
    }

    pub fn stepping(step: Duration) -> Self {
        ManualClock {
            nanos: AtomicU64::new(0),
            step: step.as_nanos() as u64,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.nanos
            .fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.nanos.fetch_add(self.step, Ordering::SeqCst))
    }
}

/// Wall-clock budget checked cooperatively by the search loop.
#[derive(Clone, Copy)]
pub struct Deadline<'a> {
    clock: &'a dyn Clock,
    limit: Duration,
}

impl<'a> Deadline<'a> {
    pub fn new(clock: &'a dyn Clock, limit: Duration) -> Self {
        Deadline { clock, limit }
    }

    pub fn expired(&self) -> bool {
        self.clock.elapsed() >= self.limit
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }
}
