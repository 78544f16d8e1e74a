//! Concurrency tests: admission stays exact under contention.

use publish_throttle::infrastructure::mocks::MockThrottleListener;
use publish_throttle::{PublishRate, PublishRateLimiter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn contend(limiter: &Arc<PublishRateLimiter>, threads: usize, attempts: usize) -> usize {
    let admitted = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let limiter = Arc::clone(limiter);
            let admitted = Arc::clone(&admitted);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..attempts {
                    if limiter.try_acquire(1, 0).is_admit() {
                        admitted.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    admitted.load(Ordering::Relaxed)
}

#[test]
fn test_exactly_cap_admitted_under_contention() {
    let limiter = Arc::new(PublishRateLimiter::new(PublishRate::messages(100)));

    let admitted = contend(&limiter, 16, 50);

    assert_eq!(admitted, 100);
    assert!(limiter.is_blocked());
    let snapshot = limiter.metrics().snapshot();
    assert_eq!(snapshot.publishes_admitted, 100);
    assert_eq!(snapshot.publishes_rejected, 16 * 50 - 100);
}

#[test]
fn test_single_throttle_notification_under_contention() {
    let listener = MockThrottleListener::new();
    let limiter = Arc::new(
        PublishRateLimiter::builder()
            .with_topic("persistent://prop/ns-abc/hot")
            .with_rate(PublishRate::messages(10))
            .build()
            .unwrap(),
    );
    limiter.add_listener(Arc::new(listener.clone()));

    contend(&limiter, 8, 100);

    assert_eq!(listener.throttled_count(), 1);
    assert_eq!(listener.resumed_count(), 0);
}

#[test]
fn test_each_window_admits_exactly_cap() {
    let limiter = Arc::new(PublishRateLimiter::new(PublishRate::messages(25)));

    for _ in 0..5 {
        assert_eq!(contend(&limiter, 4, 20), 25);
        limiter.on_window_reset();
    }
}

#[test]
fn test_concurrent_rate_updates_and_resets_stay_consistent() {
    let limiter = Arc::new(PublishRateLimiter::new(PublishRate::messages(10)));
    let barrier = Arc::new(Barrier::new(3));

    let updater = {
        let limiter = Arc::clone(&limiter);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for i in 0..200u32 {
                limiter.update_rate(PublishRate::messages(1 + i % 20));
            }
        })
    };
    let resetter = {
        let limiter = Arc::clone(&limiter);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..200 {
                limiter.on_window_reset();
            }
        })
    };

    barrier.wait();
    for _ in 0..1_000 {
        limiter.try_acquire(1, 0);
    }
    updater.join().unwrap();
    resetter.join().unwrap();

    // Whatever interleaving happened, a reset restores the last rate's full cap
    limiter.on_window_reset();
    let snapshot = limiter.snapshot();
    assert_eq!(snapshot.rate, PublishRate::messages(1 + 199 % 20));
    assert_eq!(snapshot.remaining_messages, i64::from(1 + 199 % 20));
    assert!(!snapshot.blocked);
}

#[test]
fn test_listener_ends_in_step_with_limiter() {
    let listener = MockThrottleListener::new();
    let limiter = Arc::new(PublishRateLimiter::new(PublishRate::messages(3)));
    limiter.add_listener(Arc::new(listener.clone()));
    let barrier = Arc::new(Barrier::new(5));

    let resetter = {
        let limiter = Arc::clone(&limiter);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for i in 0..500u32 {
                if i % 7 == 0 {
                    limiter.update_rate(PublishRate::messages(1 + i % 5));
                } else {
                    limiter.on_window_reset();
                }
            }
        })
    };
    let publishers: Vec<_> = (0..4)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..2_000 {
                    limiter.try_acquire(1, 0);
                }
            })
        })
        .collect();

    resetter.join().unwrap();
    for publisher in publishers {
        publisher.join().unwrap();
    }

    // Notifications strictly alternate and the last one matches the limiter
    let events = listener.events();
    assert!(events
        .windows(2)
        .all(|pair| std::mem::discriminant(&pair[0]) != std::mem::discriminant(&pair[1])));
    assert_eq!(listener.is_paused(), limiter.is_blocked());
}
