//! Integration tests for publish admission across windows.

use publish_throttle::infrastructure::mocks::{FlowEvent, MockClock, MockThrottleListener};
use publish_throttle::{Decision, PublishRate, PublishRateLimiter};
use std::sync::Arc;
use std::time::{Duration, Instant};

const TOPIC: &str = "persistent://prop/ns-abc/orders";

fn limiter(rate: PublishRate) -> PublishRateLimiter {
    PublishRateLimiter::builder()
        .with_topic(TOPIC)
        .with_rate(rate)
        .build()
        .unwrap()
}

#[test]
fn test_disabled_rate_admits_everything() {
    let limiter = limiter(PublishRate::disabled());

    for _ in 0..10_000 {
        assert_eq!(limiter.try_acquire(100, 1 << 20), Decision::Admit);
    }
    assert!(!limiter.is_blocked());

    let snapshot = limiter.metrics().snapshot();
    assert_eq!(snapshot.publishes_admitted, 10_000);
    assert_eq!(snapshot.publishes_rejected, 0);
}

#[test]
fn test_one_message_per_window() {
    let limiter = limiter(PublishRate::new(1, 10));

    assert_eq!(limiter.try_acquire(1, 10), Decision::Admit);
    assert_eq!(limiter.try_acquire(1, 10), Decision::Reject);
    assert!(limiter.is_blocked());

    limiter.on_window_reset();
    assert!(!limiter.is_blocked());
    assert_eq!(limiter.try_acquire(1, 10), Decision::Admit);
}

#[test]
fn test_single_overdraft_then_reject() {
    let limiter = limiter(PublishRate::bytes(10));

    // One publish may exceed the whole window's byte cap
    assert_eq!(limiter.try_acquire(1, 1_000), Decision::Admit);
    assert_eq!(limiter.snapshot().remaining_bytes, -990);

    assert_eq!(limiter.try_acquire(1, 1), Decision::Reject);
    assert_eq!(limiter.try_acquire(0, 0), Decision::Reject);

    // The overdraft is forgiven at the next window
    limiter.on_window_reset();
    assert_eq!(limiter.snapshot().remaining_bytes, 10);
    assert_eq!(limiter.try_acquire(1, 5), Decision::Admit);
}

#[test]
fn test_either_dimension_blocks() {
    let limiter = limiter(PublishRate::new(100, 10));

    // Bytes run out long before messages
    assert!(limiter.try_acquire(1, 6).is_admit());
    assert!(limiter.try_acquire(1, 6).is_admit());
    assert!(limiter.try_acquire(1, 6).is_reject());

    let snapshot = limiter.snapshot();
    assert_eq!(snapshot.remaining_messages, 98);
    assert_eq!(snapshot.remaining_bytes, -2);
    assert!(snapshot.blocked);
}

#[test]
fn test_message_dimension_alone() {
    let limiter = limiter(PublishRate::messages(3));

    for _ in 0..3 {
        assert!(limiter.try_acquire(1, u64::MAX).is_admit());
    }
    assert!(limiter.try_acquire(1, 0).is_reject());
}

#[test]
fn test_exhausting_admit_does_not_block() {
    let limiter = limiter(PublishRate::messages(2));

    assert!(limiter.try_acquire(2, 0).is_admit());
    assert_eq!(limiter.snapshot().remaining_messages, 0);
    assert!(!limiter.is_blocked());

    assert!(limiter.try_acquire(1, 0).is_reject());
    assert!(limiter.is_blocked());
}

#[test]
fn test_blocked_producer_recovers_within_one_window() {
    let start = Instant::now();
    let clock = MockClock::new(start);
    let listener = MockThrottleListener::new();
    let limiter = PublishRateLimiter::builder()
        .with_topic(TOPIC)
        .with_rate(PublishRate::messages(5))
        .with_clock(Arc::new(clock.clone()))
        .build()
        .unwrap();
    limiter.add_listener(Arc::new(listener.clone()));

    for window in 1..=3u32 {
        let admitted = (0..20).filter(|_| limiter.try_acquire(1, 0).is_admit()).count();
        assert_eq!(admitted, 5);
        assert!(limiter.is_blocked());
        assert!(listener.is_paused());

        clock.advance(Duration::from_secs(1));
        limiter.on_window_reset();
        assert!(!limiter.is_blocked());
        assert_eq!(
            limiter.snapshot().window_start,
            start + Duration::from_secs(u64::from(window))
        );
    }

    assert_eq!(listener.throttled_count(), 3);
    assert_eq!(listener.resumed_count(), 3);
    assert_eq!(listener.events().first(), Some(&FlowEvent::Throttled(TOPIC.into())));
    assert_eq!(limiter.metrics().windows_reset(), 3);
}

#[test]
fn test_reset_without_block_does_not_notify() {
    let listener = MockThrottleListener::new();
    let limiter = limiter(PublishRate::messages(5));
    limiter.add_listener(Arc::new(listener.clone()));

    limiter.try_acquire(1, 0);
    limiter.on_window_reset();
    limiter.on_window_reset();

    assert!(listener.events().is_empty());
    assert_eq!(limiter.snapshot().remaining_messages, 5);
}

#[test]
fn test_removed_listener_is_not_called() {
    let listener = MockThrottleListener::new();
    let handle: Arc<dyn publish_throttle::ThrottleListener> = Arc::new(listener.clone());
    let limiter = limiter(PublishRate::messages(1));

    limiter.add_listener(Arc::clone(&handle));
    assert!(limiter.remove_listener(&handle));
    assert!(!limiter.remove_listener(&handle));

    limiter.try_acquire(1, 0);
    limiter.try_acquire(1, 0);
    assert!(listener.events().is_empty());
}

#[test]
fn test_rate_increase_waits_for_next_window() {
    let limiter = limiter(PublishRate::messages(1));
    limiter.try_acquire(1, 0);

    limiter.update_rate(PublishRate::messages(10));
    assert_eq!(limiter.rate(), PublishRate::messages(10));
    // The current window keeps its accounting
    assert!(limiter.try_acquire(1, 0).is_reject());

    limiter.on_window_reset();
    let admitted = (0..20).filter(|_| limiter.try_acquire(1, 0).is_admit()).count();
    assert_eq!(admitted, 10);
}

#[test]
fn test_disabling_rate_lifts_block_immediately() {
    let listener = MockThrottleListener::new();
    let limiter = limiter(PublishRate::messages(1));
    limiter.add_listener(Arc::new(listener.clone()));

    limiter.try_acquire(1, 0);
    limiter.try_acquire(1, 0);
    assert!(limiter.is_blocked());

    limiter.update_rate(PublishRate::disabled());
    assert!(!limiter.is_blocked());
    assert!(!listener.is_paused());
    assert!(limiter.try_acquire(1_000, 1_000).is_admit());
}

#[test]
fn test_newly_capped_dimension_starts_full() {
    let limiter = limiter(PublishRate::messages(100));
    for _ in 0..5 {
        limiter.try_acquire(1, 1_000);
    }

    limiter.update_rate(PublishRate::new(100, 10));
    let snapshot = limiter.snapshot();
    assert_eq!(snapshot.remaining_bytes, 10);
    assert_eq!(snapshot.remaining_messages, 95);

    assert!(limiter.try_acquire(1, 10).is_admit());
    assert!(limiter.try_acquire(1, 10).is_reject());
}
