//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use std::fmt::Debug;
use std::time::Instant;

/// Port for obtaining current time.
///
/// This abstraction allows the application layer to work with time
/// without depending on system clock implementation details.
/// Infrastructure provides concrete implementations (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> Instant;
}

/// Port for connection-level flow control.
///
/// A limiter notifies its listeners when its topic transitions into the
/// throttled state (the first rejection of a window) and when it leaves it
/// (a window reset, or a rate change that removes the cause). The connection
/// layer implements this to stop and resume reading from producers.
///
/// Callbacks run outside the limiter's state lock, on whichever thread or
/// task caused the transition. Deliveries for one limiter are serialized and
/// always alternate, so the last call a listener saw matches the limiter's
/// current state. Callbacks must not block, and must not call
/// `try_acquire`, `on_window_reset` or `update_rate` on the same limiter.
pub trait ThrottleListener: Send + Sync + Debug {
    /// The topic started rejecting publishes.
    fn on_throttled(&self, _topic: &str) {}

    /// The topic accepts publishes again.
    fn on_resumed(&self, topic: &str);
}
