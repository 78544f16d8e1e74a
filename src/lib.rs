//! # publish-throttle
//!
//! Precise per-topic publish-rate limiting for a message broker's ingestion
//! path.
//!
//! Every loaded topic gets a [`PublishRateLimiter`] that caps accepted
//! publishes per window (one second by default) by message count, by payload
//! bytes, or both. The ingestion path asks the limiter before appending each
//! publish; when the answer is [`Decision::Reject`] the connection layer stops
//! reading from the producer until the next window reopens capacity.
//!
//! ## Quick Start
//!
//! ```rust
//! use publish_throttle::{Decision, PublishRate, PublishRateLimiter};
//!
//! // 1 message and 10 bytes per second
//! let limiter = PublishRateLimiter::builder()
//!     .with_topic("persistent://prop/ns-abc/orders")
//!     .with_rate(PublishRate::new(1, 10))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(limiter.try_acquire(1, 10), Decision::Admit);
//! assert_eq!(limiter.try_acquire(1, 10), Decision::Reject);
//! assert!(limiter.is_blocked());
//! ```
//!
//! In a running broker the window is reopened by a reset task, and limiters
//! are owned by a [`TopicRegistry`] that keeps them in line with topic,
//! namespace and broker-wide policies:
//!
//! ```rust,no_run
//! use publish_throttle::{PublishRate, TopicRegistry};
//!
//! # async fn example() -> Result<(), publish_throttle::RegistryError> {
//! let registry = TopicRegistry::builder().build()?;
//! registry.set_namespace_publish_rate("prop/ns-abc", PublishRate::new(1, 10))?;
//!
//! let limiter = registry.load_topic("persistent://prop/ns-abc/orders")?;
//! if limiter.try_acquire(1, 10).is_reject() {
//!     // pause reads on this producer's connection
//! }
//!
//! // Broker-wide dynamic configuration
//! registry.update_dynamic_configuration("maxPublishRatePerTopicInMessages", "10")?;
//!
//! registry.unload_topic("persistent://prop/ns-abc/orders").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Admission Rules
//!
//! - A rate with both caps at zero is disabled: everything is admitted and no
//!   budget is tracked.
//! - An attempt is admitted only while every capped dimension has a strictly
//!   positive remainder. The admitted amounts are then deducted, even past
//!   zero, so a single large publish may overdraw the window once.
//! - Once any capped dimension is at or below zero, every further attempt in
//!   that window is rejected and the topic is marked blocked.
//! - The reset task refills both dimensions and clears the block every window,
//!   with or without traffic, so a blocked producer waits at most one window.
//!
//! ## Rate Changes
//!
//! [`PublishRateLimiter::update_rate`] takes effect for the very next attempt,
//! but does not rewrite the current window's accounting: the new caps are
//! applied by the next reset. Two cases act immediately:
//!
//! - A dimension that was uncapped and becomes capped starts with its full
//!   new cap.
//! - If the topic is blocked and the new rate removes the cause (for example
//!   the exhausted dimension is uncapped), the block is lifted at once.
//!
//! ## Flow Control
//!
//! Poll [`PublishRateLimiter::is_blocked`], or register a
//! [`ThrottleListener`] to be told when a topic starts throttling and when it
//! resumes. Listeners are called outside the limiter's lock. Deliveries are
//! serialized per limiter and alternate, so the last call a listener received
//! always matches `is_blocked`.
//!
//! ## Cargo Features
//!
//! - `async` (default): the tokio window reset task and [`TopicRegistry`].
//! - `serde` (default): `Serialize`/`Deserialize` for [`PublishRate`] and
//!   [`BrokerSettings`], with camelCase keys.
//! - `test-helpers`: `infrastructure::mocks` (controllable clock, recording
//!   listener, capturing tracing layer) for use in downstream tests.
//!
//! ## Observability
//!
//! Limiters log with `tracing`: throttle and resume transitions at `DEBUG`,
//! window resets at `TRACE`, rate changes and topic load/unload at `INFO`,
//! refused dynamic settings at `WARN`. Counters are available through
//! [`PublishRateLimiter::metrics`]:
//!
//! ```rust
//! # use publish_throttle::{PublishRate, PublishRateLimiter};
//! # let limiter = PublishRateLimiter::new(PublishRate::messages(1));
//! # limiter.try_acquire(1, 0);
//! # limiter.try_acquire(1, 0);
//! let snapshot = limiter.metrics().snapshot();
//! assert_eq!(snapshot.publishes_rejected, 1);
//! assert!((snapshot.rejection_rate() - 0.5).abs() < f64::EPSILON);
//! ```

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    budget::{Decision, WindowBudget},
    rate::{PublishRate, RateError},
    topic::{NamespaceName, TopicDomain, TopicName, TopicNameError},
};

pub use application::{
    limiter::{
        BuildError, LimiterSnapshot, PublishRateLimiter, PublishRateLimiterBuilder,
        DEFAULT_WINDOW,
    },
    metrics::{Metrics, MetricsSnapshot},
    ports::{Clock, ThrottleListener},
};

#[cfg(feature = "async")]
pub use application::reset::{ResetHandle, ShutdownError, WindowResetter};

pub use infrastructure::{
    clock::SystemClock,
    settings::{BrokerSettings, SettingsError},
};

#[cfg(feature = "async")]
pub use infrastructure::registry::{RegistryError, TopicRegistry, TopicRegistryBuilder};
