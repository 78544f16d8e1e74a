//! Broker-level publish throttling settings.
//!
//! These are the defaults every topic falls back to when neither the topic nor
//! its namespace sets a publish rate. They can be changed at runtime by key,
//! the way a broker's dynamic configuration surface delivers them.

use crate::domain::rate::{PublishRate, RateError};
use std::collections::BTreeMap;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Dynamic key for the broker-wide per-topic message rate.
pub const MAX_PUBLISH_RATE_PER_TOPIC_IN_MESSAGES: &str = "maxPublishRatePerTopicInMessages";
/// Dynamic key for the broker-wide per-topic byte rate.
pub const MAX_PUBLISH_RATE_PER_TOPIC_IN_BYTES: &str = "maxPublishRatePerTopicInBytes";
/// Dynamic key for switching precise throttling on or off.
pub const PRECISE_TOPIC_PUBLISH_RATE_LIMITER_ENABLE: &str = "preciseTopicPublishRateLimiterEnable";

/// Error returned when a dynamic setting is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// No dynamic setting has this name
    #[error("unknown dynamic setting `{0}`")]
    UnknownKey(String),
    /// The value could not be parsed for this setting
    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue {
        /// Setting name
        key: String,
        /// Rejected value
        value: String,
    },
    /// The value parsed but is not a valid rate
    #[error(transparent)]
    Rate(#[from] RateError),
}

/// Broker-wide publish throttling settings.
///
/// # Example
/// ```
/// use publish_throttle::{BrokerSettings, PublishRate};
///
/// let mut settings = BrokerSettings::default();
/// settings.set("maxPublishRatePerTopicInMessages", "10").unwrap();
/// assert_eq!(settings.default_publish_rate(), PublishRate::messages(10));
///
/// assert!(settings.set("maxPublishRatePerTopicInBytes", "-1").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct BrokerSettings {
    /// When false, topics are loaded with a pass-through limiter
    pub precise_topic_publish_rate_limiter_enable: bool,
    /// Default per-topic message cap, `0` for none
    pub max_publish_rate_per_topic_in_messages: u32,
    /// Default per-topic byte cap, `0` for none
    pub max_publish_rate_per_topic_in_bytes: u64,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            precise_topic_publish_rate_limiter_enable: true,
            max_publish_rate_per_topic_in_messages: 0,
            max_publish_rate_per_topic_in_bytes: 0,
        }
    }
}

impl BrokerSettings {
    /// The rate a topic gets when no topic or namespace policy applies.
    pub fn default_publish_rate(&self) -> PublishRate {
        PublishRate::new(
            self.max_publish_rate_per_topic_in_messages,
            self.max_publish_rate_per_topic_in_bytes,
        )
    }

    /// Update one setting from its string form.
    ///
    /// # Errors
    /// Returns `SettingsError` for unknown keys, unparseable values and
    /// negative or out-of-range rates. The settings are unchanged on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let value = value.trim();
        match key {
            MAX_PUBLISH_RATE_PER_TOPIC_IN_MESSAGES => {
                let rate = PublishRate::from_signed(parse_int(key, value)?, 0)?;
                self.max_publish_rate_per_topic_in_messages = rate.max_message_rate;
            }
            MAX_PUBLISH_RATE_PER_TOPIC_IN_BYTES => {
                let rate = PublishRate::from_signed(0, parse_int(key, value)?)?;
                self.max_publish_rate_per_topic_in_bytes = rate.max_byte_rate;
            }
            PRECISE_TOPIC_PUBLISH_RATE_LIMITER_ENABLE => {
                self.precise_topic_publish_rate_limiter_enable =
                    value.parse().map_err(|_| invalid(key, value))?;
            }
            _ => return Err(SettingsError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Read one setting in its string form.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            MAX_PUBLISH_RATE_PER_TOPIC_IN_MESSAGES => {
                Some(self.max_publish_rate_per_topic_in_messages.to_string())
            }
            MAX_PUBLISH_RATE_PER_TOPIC_IN_BYTES => {
                Some(self.max_publish_rate_per_topic_in_bytes.to_string())
            }
            PRECISE_TOPIC_PUBLISH_RATE_LIMITER_ENABLE => {
                Some(self.precise_topic_publish_rate_limiter_enable.to_string())
            }
            _ => None,
        }
    }

    /// All dynamic settings with their current values.
    pub fn dynamic_values(&self) -> BTreeMap<String, String> {
        [
            MAX_PUBLISH_RATE_PER_TOPIC_IN_MESSAGES,
            MAX_PUBLISH_RATE_PER_TOPIC_IN_BYTES,
            PRECISE_TOPIC_PUBLISH_RATE_LIMITER_ENABLE,
        ]
        .into_iter()
        .filter_map(|key| self.get(key).map(|value| (key.to_string(), value)))
        .collect()
    }
}

fn parse_int(key: &str, value: &str) -> Result<i64, SettingsError> {
    value.parse().map_err(|_| invalid(key, value))
}

fn invalid(key: &str, value: &str) -> SettingsError {
    SettingsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
