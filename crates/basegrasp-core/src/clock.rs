//! Time sources for search budgets.
//!
//! Searches measure elapsed time through the [`Clock`] trait so timeouts
//! can be exercised deterministically with a [`ManualClock`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotone time source.
pub trait Clock {
    /// Time since an arbitrary, fixed origin.
    fn now(&self) -> Duration;
}

// ---------------------------------------------------------------------------
// MonotonicClock
// ---------------------------------------------------------------------------

/// Wall clock backed by [`Instant`].
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
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

// ---------------------------------------------------------------------------
// ManualClock
// ---------------------------------------------------------------------------

/// Integer-nanosecond clock that only moves when told to.
///
/// Clones share the same counter, so a collaborator holding a clone can
/// advance the time the search observes.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn set(&self, at: Duration) {
        self.nanos.store(at.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

// ---------------------------------------------------------------------------
// Stopwatch
// ---------------------------------------------------------------------------

/// Measures time since the last reset against an optional limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stopwatch {
    started: Duration,
    limit: Option<Duration>,
}

impl Stopwatch {
    pub fn start(clock: &dyn Clock, limit: Option<Duration>) -> Self {
        Self {
            started: clock.now(),
            limit,
        }
    }

    pub fn reset(&mut self, clock: &dyn Clock) {
        self.started = clock.now();
    }

    pub fn elapsed(&self, clock: &dyn Clock) -> Duration {
        clock.now().saturating_sub(self.started)
    }

    pub const fn limit(&self) -> Option<Duration> {
        self.limit
    }

    /// Strictly past the limit. Never true without a limit.
    pub fn expired(&self, clock: &dyn Clock) -> bool {
        self.limit
            .is_some_and(|limit| self.elapsed(clock) > limit)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_shares_counter() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance(Duration::from_millis(250));
        assert_eq!(clock.now(), Duration::from_millis(250));
        clock.set(Duration::from_secs(2));
        assert_eq!(handle.now(), Duration::from_secs(2));
    }

    #[test]
    fn monotonic_clock_moves_forward() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn stopwatch_expires_strictly_after_limit() {
        let clock = ManualClock::new();
        let mut watch = Stopwatch::start(&clock, Some(Duration::from_secs(1)));
        clock.advance(Duration::from_secs(1));
        assert!(!watch.expired(&clock));
        clock.advance(Duration::from_millis(1));
        assert!(watch.expired(&clock));

        watch.reset(&clock);
        assert_eq!(watch.elapsed(&clock), Duration::ZERO);
        assert!(!watch.expired(&clock));
    }

    #[test]
    fn stopwatch_without_limit_never_expires() {
        let clock = ManualClock::new();
        let watch = Stopwatch::start(&clock, None);
        clock.advance(Duration::from_secs(1_000_000));
        assert!(!watch.expired(&clock));
        assert_eq!(watch.limit(), None);
    }
}
