//! Mock clock for testing.

use crate::application::ports::Clock;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Mock clock for testing.
///
/// Lets tests move time explicitly so window starts recorded by a limiter are
/// deterministic.
///
/// # Examples
///
/// ```
/// use publish_throttle::infrastructure::mocks::MockClock;
/// use publish_throttle::{PublishRate, PublishRateLimiter};
/// use std::sync::Arc;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let clock = MockClock::new(start);
/// let limiter = PublishRateLimiter::builder()
///     .with_rate(PublishRate::messages(1))
///     .with_clock(Arc::new(clock.clone()))
///     .build()
///     .unwrap();
///
/// clock.advance(Duration::from_secs(1));
/// limiter.on_window_reset();
/// assert_eq!(limiter.snapshot().window_start, start + Duration::from_secs(1));
/// ```
///
/// # Thread Safety
///
/// All clones share the same underlying time value, so advancing time in
/// one clone affects all clones.
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

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        *self.current_time.lock() += duration;
    }

    /// Set the clock to a specific instant.
    pub fn set(&self, instant: Instant) {
        *self.current_time.lock() = instant;
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.current_time.lock()
    }
}
