//! Observability metrics for publish throttling.
//!
//! Provides counters about a limiter's admission decisions for monitoring and
//! debugging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking publish throttling statistics.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones share the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Publish attempts admitted
    publishes_admitted: AtomicU64,
    /// Publish attempts rejected
    publishes_rejected: AtomicU64,
    /// Messages carried by admitted publishes
    messages_admitted: AtomicU64,
    /// Payload bytes carried by admitted publishes
    bytes_admitted: AtomicU64,
    /// Windows opened by the reset tick
    windows_reset: AtomicU64,
    /// Rate reconfigurations applied
    rate_updates: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                publishes_admitted: AtomicU64::new(0),
                publishes_rejected: AtomicU64::new(0),
                messages_admitted: AtomicU64::new(0),
                bytes_admitted: AtomicU64::new(0),
                windows_reset: AtomicU64::new(0),
                rate_updates: AtomicU64::new(0),
            }),
        }
    }

    /// Record an admitted publish.
    pub(crate) fn record_admitted(&self, messages: u32, bytes: u64) {
        self.inner.publishes_admitted.fetch_add(1, Ordering::Relaxed);
        self.inner
            .messages_admitted
            .fetch_add(u64::from(messages), Ordering::Relaxed);
        self.inner.bytes_admitted.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a rejected publish.
    pub(crate) fn record_rejected(&self) {
        self.inner.publishes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a window reset.
    pub(crate) fn record_window_reset(&self) {
        self.inner.windows_reset.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rate update.
    pub(crate) fn record_rate_update(&self) {
        self.inner.rate_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the total number of publishes admitted.
    pub fn publishes_admitted(&self) -> u64 {
        self.inner.publishes_admitted.load(Ordering::Relaxed)
    }

    /// Get the total number of publishes rejected.
    pub fn publishes_rejected(&self) -> u64 {
        self.inner.publishes_rejected.load(Ordering::Relaxed)
    }

    /// Get the total number of messages admitted.
    pub fn messages_admitted(&self) -> u64 {
        self.inner.messages_admitted.load(Ordering::Relaxed)
    }

    /// Get the total number of payload bytes admitted.
    pub fn bytes_admitted(&self) -> u64 {
        self.inner.bytes_admitted.load(Ordering::Relaxed)
    }

    /// Get the number of window resets.
    pub fn windows_reset(&self) -> u64 {
        self.inner.windows_reset.load(Ordering::Relaxed)
    }

    /// Get the number of rate updates.
    pub fn rate_updates(&self) -> u64 {
        self.inner.rate_updates.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            publishes_admitted: self.publishes_admitted(),
            publishes_rejected: self.publishes_rejected(),
            messages_admitted: self.messages_admitted(),
            bytes_admitted: self.bytes_admitted(),
            windows_reset: self.windows_reset(),
            rate_updates: self.rate_updates(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Publish attempts admitted
    pub publishes_admitted: u64,
    /// Publish attempts rejected
    pub publishes_rejected: u64,
    /// Messages carried by admitted publishes
    pub messages_admitted: u64,
    /// Payload bytes carried by admitted publishes
    pub bytes_admitted: u64,
    /// Windows opened by the reset tick
    pub windows_reset: u64,
    /// Rate reconfigurations applied
    pub rate_updates: u64,
}

impl MetricsSnapshot {
    /// Calculate the rejection rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no publishes have been processed.
    pub fn rejection_rate(&self) -> f64 {
        let total = self.total_publishes();
        if total == 0 {
            0.0
        } else {
            self.publishes_rejected as f64 / total as f64
        }
    }

    /// Get the total number of publish attempts (admitted + rejected).
    pub fn total_publishes(&self) -> u64 {
        self.publishes_admitted
            .saturating_add(self.publishes_rejected)
    }
}
