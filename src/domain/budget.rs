//! Per-window publish budget.
//!
//! [`WindowBudget`] is the accounting core of a topic's limiter: how many
//! messages and bytes are left in the current window, and whether a publisher
//! has been refused since the window opened. It holds no lock and no clock;
//! the owning limiter serializes access and supplies the time.

use crate::domain::rate::PublishRate;
use std::time::Instant;

/// Outcome of a single publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Accept the publish
    Admit,
    /// Refuse the publish; the caller should stop reading from the producer
    Reject,
}

impl Decision {
    /// Check if this decision is Admit.
    pub fn is_admit(&self) -> bool {
        matches!(self, Decision::Admit)
    }

    /// Check if this decision is Reject.
    pub fn is_reject(&self) -> bool {
        matches!(self, Decision::Reject)
    }
}

/// Remaining budget for the current window.
///
/// Remaining counts are signed. An admitted publish may overdraw its
/// dimension once; every later attempt in the same window is rejected.
///
/// # Example
/// ```
/// use publish_throttle::{Decision, PublishRate, WindowBudget};
/// use std::time::Instant;
///
/// let rate = PublishRate::messages(1);
/// let mut budget = WindowBudget::new(&rate, Instant::now());
///
/// assert_eq!(budget.try_acquire(&rate, 1, 10), Decision::Admit);
/// assert_eq!(budget.try_acquire(&rate, 1, 10), Decision::Reject);
/// assert!(budget.is_blocked());
///
/// budget.reset(&rate, Instant::now());
/// assert_eq!(budget.try_acquire(&rate, 1, 10), Decision::Admit);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowBudget {
    remaining_messages: i64,
    remaining_bytes: i64,
    window_start: Instant,
    blocked: bool,
}

impl WindowBudget {
    /// Open a full window for `rate` starting at `now`.
    pub fn new(rate: &PublishRate, now: Instant) -> Self {
        Self {
            remaining_messages: i64::from(rate.max_message_rate),
            remaining_bytes: saturating_i64(rate.max_byte_rate),
            window_start: now,
            blocked: false,
        }
    }

    /// Decide a publish of `messages` messages totalling `bytes` bytes.
    ///
    /// A disabled rate always admits without touching the budget. Otherwise the
    /// attempt is admitted only if every capped dimension still has a strictly
    /// positive remainder, and the admitted amounts are then deducted even if
    /// that drives the remainder below zero.
    pub fn try_acquire(&mut self, rate: &PublishRate, messages: u32, bytes: u64) -> Decision {
        if rate.is_disabled() {
            return Decision::Admit;
        }

        if self.is_exhausted(rate) {
            self.blocked = true;
            return Decision::Reject;
        }

        if rate.limits_messages() {
            self.remaining_messages = self.remaining_messages.saturating_sub(i64::from(messages));
        }
        if rate.limits_bytes() {
            self.remaining_bytes = self.remaining_bytes.saturating_sub(saturating_i64(bytes));
        }
        Decision::Admit
    }

    /// Open a new window: refill both dimensions from `rate` and clear the block.
    ///
    /// Returns true if the budget was blocked before the reset.
    pub fn reset(&mut self, rate: &PublishRate, now: Instant) -> bool {
        let was_blocked = self.blocked;
        self.remaining_messages = i64::from(rate.max_message_rate);
        self.remaining_bytes = saturating_i64(rate.max_byte_rate);
        self.window_start = now;
        self.blocked = false;
        was_blocked
    }

    /// Adjust the budget for a rate change made mid-window.
    ///
    /// Remainders of dimensions capped under both rates are left alone; the new
    /// caps apply from the next reset. A dimension that was uncapped under
    /// `old` and is capped under `new` is seeded with its full new cap so it
    /// neither admits against nor blocks on stale state.
    ///
    /// If the budget was blocked, the block is recomputed against `new`.
    /// Returns true if that lifted the block.
    pub fn apply_rate_change(&mut self, old: &PublishRate, new: &PublishRate) -> bool {
        if !old.limits_messages() && new.limits_messages() {
            self.remaining_messages = i64::from(new.max_message_rate);
        }
        if !old.limits_bytes() && new.limits_bytes() {
            self.remaining_bytes = saturating_i64(new.max_byte_rate);
        }

        if self.blocked && !self.is_exhausted(new) {
            self.blocked = false;
            return true;
        }
        false
    }

    /// True if any dimension capped by `rate` has nothing left.
    pub fn is_exhausted(&self, rate: &PublishRate) -> bool {
        (rate.limits_messages() && self.remaining_messages <= 0)
            || (rate.limits_bytes() && self.remaining_bytes <= 0)
    }

    /// Messages left in the current window.
    pub fn remaining_messages(&self) -> i64 {
        self.remaining_messages
    }

    /// Bytes left in the current window.
    pub fn remaining_bytes(&self) -> i64 {
        self.remaining_bytes
    }

    /// When the current window opened.
    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// True once an attempt has been refused in this window.
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
