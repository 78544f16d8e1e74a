//! Publish rate caps.
//!
//! A [`PublishRate`] caps a topic's accepted publishes per window in two
//! independent dimensions: message count and payload bytes. A zero cap turns
//! that dimension off.

use std::fmt;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Error returned when a rate fails validation at the configuration boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RateError {
    /// Message rate must not be negative
    #[error("message rate must not be negative, got {0}")]
    NegativeMessageRate(i64),
    /// Byte rate must not be negative
    #[error("byte rate must not be negative, got {0}")]
    NegativeByteRate(i64),
    /// Message rate does not fit the supported range
    #[error("message rate {0} exceeds the maximum of {}", u32::MAX)]
    MessageRateOverflow(i64),
}

/// Per-window publish caps for a single topic.
///
/// # Example
/// ```
/// use publish_throttle::PublishRate;
///
/// let rate = PublishRate::new(1, 10);
/// assert!(rate.limits_messages());
/// assert!(rate.limits_bytes());
///
/// assert!(PublishRate::disabled().is_disabled());
/// assert!(PublishRate::from_signed(-1, 0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct PublishRate {
    /// Maximum messages per window, `0` for no message limit
    pub max_message_rate: u32,
    /// Maximum payload bytes per window, `0` for no byte limit
    pub max_byte_rate: u64,
}

impl PublishRate {
    /// Create a rate with the given caps.
    pub const fn new(max_message_rate: u32, max_byte_rate: u64) -> Self {
        Self {
            max_message_rate,
            max_byte_rate,
        }
    }

    /// A rate that admits everything.
    pub const fn disabled() -> Self {
        Self::new(0, 0)
    }

    /// Cap only the message count.
    pub const fn messages(max_message_rate: u32) -> Self {
        Self::new(max_message_rate, 0)
    }

    /// Cap only the payload bytes.
    pub const fn bytes(max_byte_rate: u64) -> Self {
        Self::new(0, max_byte_rate)
    }

    /// Build a rate from signed values as supplied by an administrative surface.
    ///
    /// # Errors
    /// Returns `RateError` if either value is negative or the message rate
    /// does not fit in a `u32`.
    pub fn from_signed(max_message_rate: i64, max_byte_rate: i64) -> Result<Self, RateError> {
        if max_message_rate < 0 {
            return Err(RateError::NegativeMessageRate(max_message_rate));
        }
        if max_byte_rate < 0 {
            return Err(RateError::NegativeByteRate(max_byte_rate));
        }
        let messages = u32::try_from(max_message_rate)
            .map_err(|_| RateError::MessageRateOverflow(max_message_rate))?;

        Ok(Self::new(messages, max_byte_rate as u64))
    }

    /// Replace the message cap, keeping the byte cap.
    pub const fn with_message_rate(self, max_message_rate: u32) -> Self {
        Self::new(max_message_rate, self.max_byte_rate)
    }

    /// Replace the byte cap, keeping the message cap.
    pub const fn with_byte_rate(self, max_byte_rate: u64) -> Self {
        Self::new(self.max_message_rate, max_byte_rate)
    }

    /// True if the message dimension is capped.
    pub const fn limits_messages(&self) -> bool {
        self.max_message_rate > 0
    }

    /// True if the byte dimension is capped.
    pub const fn limits_bytes(&self) -> bool {
        self.max_byte_rate > 0
    }

    /// True if neither dimension is capped.
    pub const fn is_disabled(&self) -> bool {
        !self.limits_messages() && !self.limits_bytes()
    }
}

impl fmt::Display for PublishRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_disabled() {
            return write!(f, "unlimited");
        }
        match (self.limits_messages(), self.limits_bytes()) {
            (true, true) => write!(
                f,
                "{} msg/window, {} bytes/window",
                self.max_message_rate, self.max_byte_rate
            ),
            (true, false) => write!(f, "{} msg/window", self.max_message_rate),
            _ => write!(f, "{} bytes/window", self.max_byte_rate),
        }
    }
}
