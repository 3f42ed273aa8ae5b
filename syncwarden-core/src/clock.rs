//! Wall-clock abstraction.
//!
//! Grace-window and `active_since` arithmetic is done against a [`Clock`] so
//! tests can move time explicitly instead of sleeping. [`WakeDetector`]
//! compares that wall clock with a monotonic one to notice host standby.

use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real UTC clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Standby detection
// ---------------------------------------------------------------------------

/// Notices host standby by sampling wall and monotonic time.
///
/// The monotonic clock stops while the machine sleeps; the wall clock does
/// not. When wall time has moved ahead of monotonic time by more than the
/// threshold between two samples, the host resumed in between.
#[derive(Debug, Clone)]
pub struct WakeDetector {
    threshold: Duration,
    last_wall: DateTime<Utc>,
    last_monotonic: Instant,
}

impl WakeDetector {
    pub fn new(threshold: Duration, wall: DateTime<Utc>, monotonic: Instant) -> Self {
        Self {
            threshold,
            last_wall: wall,
            last_monotonic: monotonic,
        }
    }

    /// Record a sample. Returns the wake-up time when a standby gap was seen.
    pub fn observe(&mut self, wall: DateTime<Utc>, monotonic: Instant) -> Option<DateTime<Utc>> {
        let wall_elapsed = wall - self.last_wall;
        let monotonic_elapsed = monotonic.saturating_duration_since(self.last_monotonic);
        self.last_wall = wall;
        self.last_monotonic = monotonic;
        let gap = wall_elapsed.checked_sub(&Duration::from_std(monotonic_elapsed).ok()?)?;
        (gap > self.threshold).then_some(wall)
    }
}
