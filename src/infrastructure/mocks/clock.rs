//! Mock clock for testing.

use crate::application::ports::Clock;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Manually advanced clock.
///
/// Lets tests step over dedup windows and refill periods without sleeping.
///
/// # Examples
///
/// ```ignore
/// use escrow_gate::infrastructure::mocks::MockClock;
/// use escrow_gate::application::ports::Clock;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let clock = MockClock::new(start);
///
/// clock.advance(Duration::from_millis(3_100));
/// assert_eq!(clock.now(), start + Duration::from_millis(3_100));
/// ```
///
/// # Thread Safety
///
/// Clones share the same underlying time value, so advancing one clone is
/// observed by every gate holding another.
#[derive(Debug, Clone)]
pub struct MockClock {
    current_time: Arc<Mutex<Instant>>,
}

impl MockClock {
    /// Create a mock clock starting at a specific instant.
    pub fn new(start: Instant) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(start)),
        }
    }

    /// Create a mock clock starting at the real current instant.
    pub fn starting_now() -> Self {
        Self::new(Instant::now())
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        *self.lock() += duration;
    }

    /// Advance the clock by a number of milliseconds.
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Set the clock to a specific instant.
    ///
    /// Setting an earlier instant simulates a clock regression.
    pub fn set(&self, instant: Instant) {
        *self.lock() = instant;
    }

    fn lock(&self) -> MutexGuard<'_, Instant> {
        self.current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.lock()
    }
}
