//! Integration tests for policy and dynamic configuration changes reaching
//! loaded topics.

#![cfg(feature = "async")]

use publish_throttle::infrastructure::mocks::MockThrottleListener;
use publish_throttle::{BrokerSettings, PublishRate, RegistryError, TopicRegistry};
use std::sync::Arc;
use std::time::Duration;

const TOPIC: &str = "persistent://prop/ns-abc/testPrecisTopicPublishRateLimiting";
const NAMESPACE: &str = "prop/ns-abc";

#[tokio::test(start_paused = true)]
async fn test_dynamic_update_reaches_loaded_topic() {
    let registry = TopicRegistry::builder().build().unwrap();
    let limiter = registry.load_topic(TOPIC).unwrap();
    assert!(limiter.rate().is_disabled());

    registry
        .update_dynamic_configuration("maxPublishRatePerTopicInMessages", "10")
        .unwrap();
    assert_eq!(limiter.rate(), PublishRate::messages(10));

    registry
        .update_dynamic_configuration("maxPublishRatePerTopicInBytes", "20")
        .unwrap();
    assert_eq!(limiter.rate(), PublishRate::new(10, 20));

    let config = registry.dynamic_configuration();
    assert_eq!(config["maxPublishRatePerTopicInMessages"], "10");
    assert_eq!(config["maxPublishRatePerTopicInBytes"], "20");

    registry.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_namespace_rate_throttles_until_window_reset() {
    let registry = TopicRegistry::builder().build().unwrap();
    registry.set_namespace_publish_rate(NAMESPACE, PublishRate::new(1, 10)).unwrap();

    let limiter = registry.load_topic(TOPIC).unwrap();
    let listener = MockThrottleListener::new();
    limiter.add_listener(Arc::new(listener.clone()));

    assert!(limiter.try_acquire(1, 10).is_admit());
    assert!(limiter.try_acquire(1, 10).is_reject());
    assert!(limiter.is_blocked());

    // The reset task reopens the window with no traffic
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(!limiter.is_blocked());
    assert!(limiter.try_acquire(1, 10).is_admit());

    assert_eq!(listener.throttled_count(), 1);
    assert_eq!(listener.resumed_count(), 1);

    registry.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_precise_limiter_disabled_admits_everything() {
    let mut settings = BrokerSettings::default();
    settings.precise_topic_publish_rate_limiter_enable = false;
    let registry = TopicRegistry::builder()
        .with_settings(settings)
        .build()
        .unwrap();
    registry.set_namespace_publish_rate(NAMESPACE, PublishRate::new(1, 10)).unwrap();

    let limiter = registry.load_topic(TOPIC).unwrap();
    assert!(limiter.try_acquire(1, 10).is_admit());
    assert!(limiter.try_acquire(1, 10).is_admit());
    assert!(!limiter.is_blocked());

    // Turning it back on applies the namespace rate
    registry
        .update_dynamic_configuration("preciseTopicPublishRateLimiterEnable", "true")
        .unwrap();
    assert_eq!(limiter.rate(), PublishRate::new(1, 10));
    assert!(limiter.try_acquire(1, 10).is_admit());
    assert!(limiter.try_acquire(1, 10).is_reject());

    registry.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_topic_policy_overrides_namespace() {
    let registry = TopicRegistry::builder().build().unwrap();
    registry.set_namespace_publish_rate(NAMESPACE, PublishRate::messages(1)).unwrap();
    registry
        .set_topic_publish_rate(TOPIC, PublishRate::messages(3))
        .unwrap();

    // Policies set before load apply at load
    let limiter = registry.load_topic(TOPIC).unwrap();
    let sibling = registry.load_topic("persistent://prop/ns-abc/sibling").unwrap();

    assert_eq!(limiter.rate(), PublishRate::messages(3));
    assert_eq!(sibling.rate(), PublishRate::messages(1));

    registry.remove_namespace_publish_rate(NAMESPACE).unwrap();
    assert_eq!(limiter.rate(), PublishRate::messages(3));
    assert!(sibling.rate().is_disabled());

    registry.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_lowered_rate_applies_from_next_window() {
    let registry = TopicRegistry::builder().build().unwrap();
    registry.set_namespace_publish_rate(NAMESPACE, PublishRate::messages(10)).unwrap();
    let limiter = registry.load_topic(TOPIC).unwrap();

    assert!(limiter.try_acquire(1, 0).is_admit());
    registry.set_namespace_publish_rate(NAMESPACE, PublishRate::messages(2)).unwrap();

    // Current window still has 9 left under the old accounting
    assert_eq!(limiter.snapshot().remaining_messages, 9);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(limiter.snapshot().remaining_messages, 2);
    let admitted = (0..10).filter(|_| limiter.try_acquire(1, 0).is_admit()).count();
    assert_eq!(admitted, 2);

    registry.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_refused_updates_leave_configuration_unchanged() {
    let registry = TopicRegistry::builder().build().unwrap();
    let limiter = registry.load_topic(TOPIC).unwrap();

    for (key, value) in [
        ("maxPublishRatePerTopicInMessages", "-1"),
        ("maxPublishRatePerTopicInBytes", "lots"),
        ("preciseTopicPublishRateLimiterEnable", "yes"),
        ("notARealSetting", "1"),
    ] {
        let result = registry.update_dynamic_configuration(key, value);
        assert!(matches!(result, Err(RegistryError::Settings(_))), "{key}={value}");
    }

    assert_eq!(registry.settings(), BrokerSettings::default());
    assert!(limiter.rate().is_disabled());

    registry.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_dynamic_updates_converge() {
    let registry = Arc::new(TopicRegistry::builder().build().unwrap());
    let limiter = registry.load_topic(TOPIC).unwrap();

    let updaters: Vec<_> = [
        ("maxPublishRatePerTopicInMessages", 10u64),
        ("maxPublishRatePerTopicInBytes", 20u64),
    ]
    .into_iter()
    .map(|(key, last)| {
        let registry = Arc::clone(&registry);
        std::thread::spawn(move || {
            for value in (1..=last).cycle().take(500).chain(std::iter::once(last)) {
                registry
                    .update_dynamic_configuration(key, &value.to_string())
                    .unwrap();
            }
        })
    })
    .collect();

    for updater in updaters {
        updater.join().unwrap();
    }

    let config = registry.dynamic_configuration();
    assert_eq!(config["maxPublishRatePerTopicInMessages"], "10");
    assert_eq!(config["maxPublishRatePerTopicInBytes"], "20");
    assert_eq!(limiter.rate(), registry.effective_rate(TOPIC).unwrap());
    assert_eq!(limiter.rate(), PublishRate::new(10, 20));

    registry.shutdown().await.unwrap();
}
