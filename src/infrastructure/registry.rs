//! Topic registry.
//!
//! Owns one [`PublishRateLimiter`] and its reset task per loaded topic, and
//! keeps every limiter's rate in line with the publish-rate policies in force.
//!
//! A topic's effective rate is resolved in order:
//! 1. the topic's own policy, if set
//! 2. its namespace's policy, if set
//! 3. the broker-wide defaults in [`BrokerSettings`]
//!
//! When precise throttling is switched off broker-wide, every topic gets a
//! pass-through rate instead.
//!
//! Policy and setting changes are serialized together with pushing their
//! result to loaded topics, so the last change made is the one limiters end
//! up with.

use crate::application::limiter::{BuildError, PublishRateLimiter, DEFAULT_WINDOW};
use crate::application::ports::Clock;
use crate::application::reset::{ResetHandle, ShutdownError};
use crate::domain::rate::PublishRate;
use crate::domain::topic::{NamespaceName, TopicName, TopicNameError};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::settings::{BrokerSettings, SettingsError};

use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

type Map<V> = DashMap<String, V, RandomState>;

/// Error returned by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The topic name could not be parsed
    #[error(transparent)]
    TopicName(#[from] TopicNameError),
    /// A dynamic setting was refused
    #[error(transparent)]
    Settings(#[from] SettingsError),
    /// A limiter could not be built
    #[error(transparent)]
    Build(#[from] BuildError),
    /// A reset task failed while shutting down
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// Builder for constructing a `TopicRegistry`.
#[derive(Debug)]
pub struct TopicRegistryBuilder {
    settings: BrokerSettings,
    window: Duration,
    clock: Option<Arc<dyn Clock>>,
}

impl TopicRegistryBuilder {
    /// Set the initial broker-wide settings.
    pub fn with_settings(mut self, settings: BrokerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the accounting window for every limiter.
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

    /// Build the registry.
    ///
    /// # Errors
    /// Returns `BuildError::ZeroWindow` if the window is zero.
    pub fn build(self) -> Result<TopicRegistry, BuildError> {
        if self.window.is_zero() {
            return Err(BuildError::ZeroWindow);
        }

        Ok(TopicRegistry {
            settings: RwLock::new(self.settings),
            policy_lock: Mutex::new(()),
            namespace_rates: Map::default(),
            topic_rates: Map::default(),
            topics: Map::default(),
            window: self.window,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
        })
    }
}

#[derive(Debug)]
struct LoadedTopic {
    name: TopicName,
    limiter: Arc<PublishRateLimiter>,
    reset: ResetHandle,
}

/// Per-topic limiters and the publish-rate policies that configure them.
///
/// Loading a topic spawns its reset task, so loads must happen inside a tokio
/// runtime. Rate changes reach limiters while a registry-wide lock is held;
/// throttle listeners must not call back into the registry.
///
/// # Example
/// ```
/// use publish_throttle::{PublishRate, TopicRegistry};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), publish_throttle::RegistryError> {
/// let registry = TopicRegistry::builder().build()?;
/// registry.set_namespace_publish_rate("prop/ns-abc", PublishRate::new(1, 10))?;
///
/// let limiter = registry.load_topic("persistent://prop/ns-abc/orders")?;
/// assert!(limiter.try_acquire(1, 10).is_admit());
/// assert!(limiter.try_acquire(1, 10).is_reject());
///
/// registry.update_dynamic_configuration("maxPublishRatePerTopicInMessages", "10")?;
/// registry.shutdown().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TopicRegistry {
    settings: RwLock<BrokerSettings>,
    // Held from a policy or setting change until loaded topics are updated
    policy_lock: Mutex<()>,
    namespace_rates: Map<PublishRate>,
    topic_rates: Map<PublishRate>,
    topics: Map<LoadedTopic>,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl TopicRegistry {
    /// Create a builder for configuring the registry.
    ///
    /// Defaults:
    /// - Settings: `BrokerSettings::default()` (precise throttling on, no caps)
    /// - Window: 1 second
    /// - Clock: system clock
    pub fn builder() -> TopicRegistryBuilder {
        TopicRegistryBuilder {
            settings: BrokerSettings::default(),
            window: DEFAULT_WINDOW,
            clock: None,
        }
    }

    /// Load a topic, creating its limiter and starting its reset task.
    ///
    /// Loading an already-loaded topic returns the existing limiter.
    ///
    /// # Errors
    /// Returns `RegistryError::TopicName` if the name cannot be parsed.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn load_topic(&self, name: &str) -> Result<Arc<PublishRateLimiter>, RegistryError> {
        let topic = TopicName::parse(name)?;

        let (limiter, loaded_rate) = match self.topics.entry(topic.to_string()) {
            Entry::Occupied(entry) => return Ok(Arc::clone(&entry.get().limiter)),
            Entry::Vacant(entry) => {
                let rate = self.resolve_rate(&topic);
                let limiter = Arc::new(
                    PublishRateLimiter::builder()
                        .with_topic(entry.key().clone())
                        .with_rate(rate)
                        .with_window(self.window)
                        .with_clock(Arc::clone(&self.clock))
                        .build()?,
                );
                let reset = limiter.start_reset_task();

                info!(topic = %entry.key(), rate = %rate, "topic publish limiter loaded");
                entry.insert(LoadedTopic {
                    name: topic.clone(),
                    limiter: Arc::clone(&limiter),
                    reset,
                });
                (limiter, rate)
            }
        };

        // A policy change may have landed between resolving and inserting
        let _policy = self.policy_lock.lock();
        let current = self.resolve_rate(&topic);
        if current != loaded_rate {
            limiter.update_rate(current);
        }

        Ok(limiter)
    }

    /// Look up a loaded topic's limiter.
    pub fn limiter(&self, name: &str) -> Option<Arc<PublishRateLimiter>> {
        let topic = TopicName::parse(name).ok()?;
        self.topics
            .get(&topic.to_string())
            .map(|loaded| Arc::clone(&loaded.limiter))
    }

    /// Unload a topic and stop its reset task.
    ///
    /// Callers still holding the limiter can keep using it; it just no longer
    /// receives resets or rate updates. Returns true if the topic was loaded.
    ///
    /// # Errors
    /// Returns `RegistryError::TopicName` for an unparseable name and
    /// `RegistryError::Shutdown` if the reset task failed.
    pub async fn unload_topic(&self, name: &str) -> Result<bool, RegistryError> {
        let topic = TopicName::parse(name)?;
        let Some((key, loaded)) = self.topics.remove(&topic.to_string()) else {
            return Ok(false);
        };

        loaded.reset.shutdown().await?;
        info!(topic = %key, "topic publish limiter unloaded");
        Ok(true)
    }

    /// Unload every topic.
    ///
    /// All topics are unloaded even if some reset tasks fail; the first
    /// failure is returned.
    ///
    /// # Errors
    /// Returns `RegistryError::Shutdown` if any reset task failed.
    pub async fn shutdown(&self) -> Result<(), RegistryError> {
        let keys: Vec<String> = self.topics.iter().map(|e| e.key().clone()).collect();
        let mut first_error = None;

        for key in keys {
            if let Some((_, loaded)) = self.topics.remove(&key) {
                if let Err(e) = loaded.reset.shutdown().await {
                    warn!(topic = %key, error = %e, "reset task failed during shutdown");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Set the publish rate for every topic in `namespace` (`tenant/namespace`)
    /// that has no topic-level policy.
    ///
    /// # Errors
    /// Returns `RegistryError::TopicName` if the namespace cannot be parsed.
    pub fn set_namespace_publish_rate(
        &self,
        namespace: &str,
        rate: PublishRate,
    ) -> Result<(), RegistryError> {
        let key = NamespaceName::parse(namespace)?.to_string();
        let _policy = self.policy_lock.lock();
        self.namespace_rates.insert(key.clone(), rate);
        info!(namespace = %key, rate = %rate, "namespace publish rate set");
        self.refresh(|topic| topic.namespace() == key);
        Ok(())
    }

    /// Remove a namespace's publish rate policy.
    ///
    /// # Errors
    /// Returns `RegistryError::TopicName` if the namespace cannot be parsed.
    pub fn remove_namespace_publish_rate(&self, namespace: &str) -> Result<(), RegistryError> {
        let key = NamespaceName::parse(namespace)?.to_string();
        let _policy = self.policy_lock.lock();
        if self.namespace_rates.remove(&key).is_some() {
            info!(namespace = %key, "namespace publish rate removed");
            self.refresh(|topic| topic.namespace() == key);
        }
        Ok(())
    }

    /// Get a namespace's publish rate policy.
    pub fn namespace_publish_rate(&self, namespace: &str) -> Option<PublishRate> {
        let key = NamespaceName::parse(namespace).ok()?.to_string();
        self.namespace_rates.get(&key).map(|rate| *rate)
    }

    /// Set a topic-level publish rate, overriding its namespace and the broker.
    ///
    /// The policy may be set before the topic is loaded.
    ///
    /// # Errors
    /// Returns `RegistryError::TopicName` if the name cannot be parsed.
    pub fn set_topic_publish_rate(&self, name: &str, rate: PublishRate) -> Result<(), RegistryError> {
        let topic = TopicName::parse(name)?;
        let key = topic.to_string();
        let _policy = self.policy_lock.lock();
        self.topic_rates.insert(key.clone(), rate);
        info!(topic = %key, rate = %rate, "topic publish rate set");
        self.refresh(|loaded| *loaded == topic);
        Ok(())
    }

    /// Remove a topic-level publish rate policy.
    ///
    /// # Errors
    /// Returns `RegistryError::TopicName` if the name cannot be parsed.
    pub fn remove_topic_publish_rate(&self, name: &str) -> Result<(), RegistryError> {
        let topic = TopicName::parse(name)?;
        let _policy = self.policy_lock.lock();
        if self.topic_rates.remove(&topic.to_string()).is_some() {
            info!(topic = %topic, "topic publish rate removed");
            self.refresh(|loaded| *loaded == topic);
        }
        Ok(())
    }

    /// Change a broker-wide setting and push the result to every loaded topic.
    ///
    /// # Errors
    /// Returns `RegistryError::Settings` if the key is unknown or the value is
    /// invalid; nothing changes in that case.
    pub fn update_dynamic_configuration(&self, key: &str, value: &str) -> Result<(), RegistryError> {
        let _policy = self.policy_lock.lock();
        {
            let mut settings = self.settings.write();
            if let Err(e) = settings.set(key, value) {
                warn!(key, value, error = %e, "dynamic setting refused");
                return Err(e.into());
            }
        }

        info!(key, value, "dynamic setting updated");
        self.refresh(|_| true);
        Ok(())
    }

    /// Current broker-wide dynamic settings by key.
    pub fn dynamic_configuration(&self) -> BTreeMap<String, String> {
        self.settings.read().dynamic_values()
    }

    /// Copy of the current broker-wide settings.
    pub fn settings(&self) -> BrokerSettings {
        self.settings.read().clone()
    }

    /// The rate a topic would get if loaded now.
    ///
    /// # Errors
    /// Returns `RegistryError::TopicName` if the name cannot be parsed.
    pub fn effective_rate(&self, name: &str) -> Result<PublishRate, RegistryError> {
        Ok(self.resolve_rate(&TopicName::parse(name)?))
    }

    /// Names of all loaded topics.
    pub fn topics(&self) -> Vec<String> {
        self.topics.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of loaded topics.
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// True if no topic is loaded.
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    fn resolve_rate(&self, topic: &TopicName) -> PublishRate {
        let settings = self.settings.read();
        if !settings.precise_topic_publish_rate_limiter_enable {
            return PublishRate::disabled();
        }

        if let Some(rate) = self.topic_rates.get(&topic.to_string()) {
            return *rate;
        }
        if let Some(rate) = self.namespace_rates.get(&topic.namespace()) {
            return *rate;
        }
        settings.default_publish_rate()
    }

    // Callers hold the policy lock. Map locks are released before limiters
    // run listener callbacks.
    fn refresh<F>(&self, mut affected: F)
    where
        F: FnMut(&TopicName) -> bool,
    {
        let targets: Vec<(TopicName, Arc<PublishRateLimiter>)> = self
            .topics
            .iter()
            .filter(|e| affected(&e.value().name))
            .map(|e| (e.value().name.clone(), Arc::clone(&e.value().limiter)))
            .collect();

        for (topic, limiter) in targets {
            let rate = self.resolve_rate(&topic);
            if limiter.rate() != rate {
                limiter.update_rate(rate);
            }
        }
    }
}
