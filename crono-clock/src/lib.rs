//! Clock abstraction for crono.
//!
//! Every rotation decision is derived from the instant returned by a [`Clock`].
//! Production code uses [`SystemClock`]; tests inject [`MockClock`] or
//! [`AdvancingClock`] so that file boundaries can be crossed deterministically.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, TimeDelta, Utc};

/// Trait for getting the current instant.
pub trait Clock: Send + Sync {
    /// Returns the current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for testing.
///
/// Holds a fixed instant until moved with [`MockClock::set`] or
/// [`MockClock::advance`]. Cloning creates a new handle to the same instant,
/// so a test can keep one copy while the writer owns another.
#[derive(Debug, Clone)]
pub struct MockClock {
    instant: Arc<RwLock<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a mock clock fixed at `instant`.
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Arc::new(RwLock::new(instant)),
        }
    }

    /// Move the clock to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.write().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    /// Move the clock forward (or backward, for a negative delta).
    pub fn advance(&self, delta: TimeDelta) {
        let mut instant = self.instant.write().unwrap_or_else(PoisonError::into_inner);
        *instant += delta;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Mock clock that auto-advances time on each call.
///
/// Useful for testing loops where every write should land one step later
/// than the previous one.
#[derive(Debug)]
pub struct AdvancingClock {
    start: DateTime<Utc>,
    step: TimeDelta,
    calls: AtomicI64,
}

impl AdvancingClock {
    /// Create an advancing clock starting at `start` and moving by `step` each call.
    pub fn new(start: DateTime<Utc>, step: TimeDelta) -> Self {
        Self {
            start,
            step,
            calls: AtomicI64::new(0),
        }
    }
}

impl Clock for AdvancingClock {
    fn now(&self) -> DateTime<Utc> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        i32::try_from(n)
            .ok()
            .and_then(|n| self.step.checked_mul(n))
            .and_then(|offset| self.start.checked_add_signed(offset))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
