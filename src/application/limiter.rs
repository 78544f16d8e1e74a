//! Per-topic publish rate limiter.
//!
//! The limiter owns one topic's [`WindowBudget`] and serializes every access
//! to it behind a single lock: publish attempts, the window reset tick, and
//! rate changes. Each entry point holds the lock only for the accounting
//! itself; logging, metrics and listener callbacks run after it is released.
//!
//! Listener delivery has its own lock. Whoever delivers reads the block state
//! at that moment and only reports a change from what listeners last heard,
//! so notifications never arrive out of order and the last one always matches
//! [`PublishRateLimiter::is_blocked`].

use crate::application::metrics::Metrics;
use crate::application::ports::{Clock, ThrottleListener};
use crate::domain::budget::{Decision, WindowBudget};
use crate::domain::rate::PublishRate;
use crate::infrastructure::clock::SystemClock;

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, trace};

/// Length of an accounting window unless configured otherwise.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

/// Error returned when building a `PublishRateLimiter` fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Window length must be greater than zero
    #[error("window must be greater than 0")]
    ZeroWindow,
}

/// Builder for constructing a `PublishRateLimiter`.
#[derive(Debug)]
pub struct PublishRateLimiterBuilder {
    topic: String,
    rate: PublishRate,
    window: Duration,
    clock: Option<Arc<dyn Clock>>,
}

impl PublishRateLimiterBuilder {
    /// Set the topic this limiter guards. Used in logs and listener callbacks.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Set the initial publish rate.
    pub fn with_rate(mut self, rate: PublishRate) -> Self {
        self.rate = rate;
        self
    }

    /// Set the accounting window length.
    ///
    /// The window will be validated when `build()` is called.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set a custom clock (mainly for testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the limiter with a full budget for its first window.
    ///
    /// # Errors
    /// Returns `BuildError::ZeroWindow` if the window is zero.
    pub fn build(self) -> Result<PublishRateLimiter, BuildError> {
        if self.window.is_zero() {
            return Err(BuildError::ZeroWindow);
        }
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        Ok(PublishRateLimiter::from_parts(
            self.topic,
            self.rate,
            self.window,
            clock,
        ))
    }
}

#[derive(Debug)]
struct LimiterState {
    rate: PublishRate,
    budget: WindowBudget,
}

/// Consistent view of a limiter's state, read under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterSnapshot {
    /// Caps in force
    pub rate: PublishRate,
    /// Messages left in the current window
    pub remaining_messages: i64,
    /// Bytes left in the current window
    pub remaining_bytes: i64,
    /// Whether an attempt has been refused since the window opened
    pub blocked: bool,
    /// When the current window opened
    pub window_start: Instant,
}

/// Admission gate for one topic's publishes.
///
/// # Example
/// ```
/// use publish_throttle::{Decision, PublishRate, PublishRateLimiter};
///
/// let limiter = PublishRateLimiter::new(PublishRate::messages(1));
///
/// assert_eq!(limiter.try_acquire(1, 10), Decision::Admit);
/// assert_eq!(limiter.try_acquire(1, 10), Decision::Reject);
/// assert!(limiter.is_blocked());
///
/// // Normally driven by the reset task once per window
/// limiter.on_window_reset();
/// assert!(!limiter.is_blocked());
/// assert_eq!(limiter.try_acquire(1, 10), Decision::Admit);
/// ```
#[derive(Debug)]
pub struct PublishRateLimiter {
    topic: String,
    window: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<LimiterState>,
    listeners: RwLock<Vec<Arc<dyn ThrottleListener>>>,
    // Block state last delivered to listeners
    notified_blocked: Mutex<bool>,
    metrics: Metrics,
}

impl PublishRateLimiter {
    /// Create a builder for configuring the limiter.
    ///
    /// Defaults:
    /// - Rate: disabled (admit everything)
    /// - Window: 1 second
    /// - Clock: system clock
    pub fn builder() -> PublishRateLimiterBuilder {
        PublishRateLimiterBuilder {
            topic: String::new(),
            rate: PublishRate::disabled(),
            window: DEFAULT_WINDOW,
            clock: None,
        }
    }

    /// Create a limiter with `rate`, a one-second window and the system clock.
    pub fn new(rate: PublishRate) -> Self {
        Self::from_parts(
            String::new(),
            rate,
            DEFAULT_WINDOW,
            Arc::new(SystemClock::new()),
        )
    }

    fn from_parts(topic: String, rate: PublishRate, window: Duration, clock: Arc<dyn Clock>) -> Self {
        let budget = WindowBudget::new(&rate, clock.now());
        Self {
            topic,
            window,
            clock,
            state: Mutex::new(LimiterState { rate, budget }),
            listeners: RwLock::new(Vec::new()),
            notified_blocked: Mutex::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Decide whether to accept a publish of `messages` messages totalling
    /// `bytes` payload bytes.
    ///
    /// On `Reject` the caller must stop reading from the producer until the
    /// topic resumes (see [`is_blocked`](Self::is_blocked) and
    /// [`ThrottleListener`]).
    ///
    /// # Performance
    /// Never blocks beyond a short critical section; no allocation on the
    /// admit path.
    pub fn try_acquire(&self, messages: u32, bytes: u64) -> Decision {
        let (decision, newly_blocked) = {
            let mut state = self.state.lock();
            let rate = state.rate;
            let was_blocked = state.budget.is_blocked();
            let decision = state.budget.try_acquire(&rate, messages, bytes);
            (decision, decision.is_reject() && !was_blocked)
        };

        match decision {
            Decision::Admit => self.metrics.record_admitted(messages, bytes),
            Decision::Reject => self.metrics.record_rejected(),
        }

        if newly_blocked {
            self.notify_listeners();
        }

        decision
    }

    /// Open a new accounting window.
    ///
    /// Refills both dimensions to the current caps and clears the block.
    /// Driven by the reset task; safe to call directly.
    pub fn on_window_reset(&self) {
        let now = self.clock.now();
        let resumed = {
            let mut state = self.state.lock();
            let rate = state.rate;
            state.budget.reset(&rate, now)
        };

        self.metrics.record_window_reset();
        trace!(topic = %self.topic, "publish window reset");

        if resumed {
            self.notify_listeners();
        }
    }

    /// Replace the publish rate.
    ///
    /// The new caps are visible to every attempt that follows. Remaining
    /// budgets of dimensions capped before and after keep their current
    /// accounting until the next window; a newly capped dimension starts with
    /// its full cap. If the change removes what was blocking the topic, it
    /// resumes immediately.
    pub fn update_rate(&self, rate: PublishRate) {
        let (previous, resumed) = {
            let mut state = self.state.lock();
            let previous = std::mem::replace(&mut state.rate, rate);
            let resumed = state.budget.apply_rate_change(&previous, &rate);
            (previous, resumed)
        };

        self.metrics.record_rate_update();
        if previous != rate {
            info!(
                topic = %self.topic,
                previous = %previous,
                current = %rate,
                "publish rate updated"
            );
        }

        if resumed {
            self.notify_listeners();
        }
    }

    /// True while the topic is rejecting publishes.
    pub fn is_blocked(&self) -> bool {
        self.state.lock().budget.is_blocked()
    }

    /// The caps currently in force.
    pub fn rate(&self) -> PublishRate {
        self.state.lock().rate
    }

    /// Read the full state in one critical section.
    pub fn snapshot(&self) -> LimiterSnapshot {
        let state = self.state.lock();
        LimiterSnapshot {
            rate: state.rate,
            remaining_messages: state.budget.remaining_messages(),
            remaining_bytes: state.budget.remaining_bytes(),
            blocked: state.budget.is_blocked(),
            window_start: state.budget.window_start(),
        }
    }

    /// Register a flow-control listener.
    pub fn add_listener(&self, listener: Arc<dyn ThrottleListener>) {
        self.listeners.write().push(listener);
    }

    /// Remove a previously registered listener.
    ///
    /// Returns true if it was registered.
    pub fn remove_listener(&self, listener: &Arc<dyn ThrottleListener>) -> bool {
        let target = Arc::as_ptr(listener) as *const ();
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| Arc::as_ptr(l) as *const () != target);
        listeners.len() != before
    }

    /// The topic this limiter guards.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Length of an accounting window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    // Cloned so callbacks may register or remove listeners
    fn listener_list(&self) -> Vec<Arc<dyn ThrottleListener>> {
        self.listeners.read().clone()
    }

    // Callers hold no state lock. A transition that raced ahead may already
    // have been delivered, or undone, by the time this runs.
    fn notify_listeners(&self) {
        let mut notified = self.notified_blocked.lock();
        let blocked = self.is_blocked();
        if blocked == *notified {
            return;
        }
        *notified = blocked;

        let listeners = self.listener_list();
        if blocked {
            debug!(topic = %self.topic, "publish rate exceeded, throttling producers");
            for listener in listeners {
                listener.on_throttled(&self.topic);
            }
        } else {
            debug!(topic = %self.topic, "publish budget available, resuming producers");
            for listener in listeners {
                listener.on_resumed(&self.topic);
            }
        }
    }
}
