use std::time::{Duration, Instant};

/// Source of the simulation's remaining per-tick time budget.
///
/// Streaming uses this as a cooperative yield signal: once it reports zero the
/// caller stops doing optional work and leaves the rest for the next tick.
pub trait TickClock {
    /// Time left in the current tick. Zero once the tick is over budget.
    fn remaining_tick_time(&self) -> Duration;

    fn has_time_remaining(&self) -> bool {
        !self.remaining_tick_time().is_zero()
    }
}

/// Wall-clock deadline for one tick.
#[derive(Debug, Clone, Copy)]
pub struct TickDeadline {
    start: Instant,
    length: Duration,
}

impl TickDeadline {
    /// Start a tick of the given length now.
    pub fn start(length: Duration) -> Self {
        Self {
            start: Instant::now(),
            length,
        }
    }

    /// Begin the next tick with the same length.
    pub fn restart(&mut self) {
        self.start = Instant::now();
    }

    pub fn length(&self) -> Duration {
        self.length
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl TickClock for TickDeadline {
    fn remaining_tick_time(&self) -> Duration {
        self.length.saturating_sub(self.start.elapsed())
    }
}

/// A clock that never runs out. Useful for tools and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl TickClock for Unbounded {
    fn remaining_tick_time(&self) -> Duration {
        Duration::MAX
    }
}
