use std::cell::Cell;
use std::time::Instant;

/// Milliseconds on the caller's clock. Only differences are meaningful.
pub type Millis = u64;

/// Source of "now" for the engine. All timing flows through the caller.
pub trait Clock {
    fn now_ms(&self) -> Millis;
}

/// Monotonic clock anchored at construction
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
    fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }
}

/// Hand-driven clock for tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Millis>,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn set(&self, now: Millis) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Millis) -> Millis {
        let next = self.now.get().saturating_add(by);
        self.now.set(next);
        next
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.get()
    }
}

/// Elapsed milliseconds between two instants on the same clock, never negative
pub fn elapsed_between(start: Millis, end: Millis) -> Millis {
    end.saturating_sub(start)
}
