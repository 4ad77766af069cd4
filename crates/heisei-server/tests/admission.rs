//! Token bucket admission and idle reclamation.
#![allow(clippy::expect_used, clippy::unwrap_used)]

use heisei_server::limiter::{AdmissionDecision, LimiterConfig, VisitorLimiter};
use heisei_server::ShutdownSignal;
use heisei_testkit::ManualClock;
use std::sync::Arc;
use std::time::Duration;

fn limiter_with(capacity: u32, rate: f64, clock: &Arc<ManualClock>) -> VisitorLimiter {
    VisitorLimiter::new(
        LimiterConfig {
            capacity,
            refill_per_second: rate,
            retention_secs: 3600,
            reclaim_interval_secs: 60,
            shards: 8,
        },
        clock.clone(),
    )
}

#[test]
fn burst_then_sustained_rate() {
    let clock = ManualClock::new();
    let limiter = limiter_with(3, 2.0, &clock);

    for _ in 0..3 {
        assert!(limiter.admit("203.0.113.7"));
    }
    assert!(!limiter.admit("203.0.113.7"));

    clock.advance(Duration::from_millis(500));
    assert!(limiter.admit("203.0.113.7"));
    assert!(!limiter.admit("203.0.113.7"));
}

#[test]
fn refill_is_capped_at_capacity() {
    let clock = ManualClock::new();
    let limiter = limiter_with(3, 2.0, &clock);

    for _ in 0..3 {
        limiter.admit("a");
    }
    clock.advance(Duration::from_secs(3600));

    let admitted = (0..10).filter(|_| limiter.admit("a")).count();
    assert_eq!(admitted, 3);
}

#[test]
fn identities_have_independent_buckets() {
    let clock = ManualClock::new();
    let limiter = limiter_with(1, 1.0, &clock);

    assert!(limiter.admit("a"));
    assert!(!limiter.admit("a"));
    assert!(limiter.admit("b"));
    assert_eq!(limiter.tracked_visitors(), 2);
}

#[test]
fn denial_carries_retry_hint() {
    let clock = ManualClock::new();
    let limiter = limiter_with(1, 2.0, &clock);

    limiter.admit("a");
    clock.advance(Duration::from_millis(250));
    assert_eq!(
        limiter.check("a"),
        AdmissionDecision::Denied {
            retry_after: Duration::from_millis(250)
        }
    );
}

#[test]
fn idle_visitors_are_reclaimed_and_return_with_full_bucket() {
    let clock = ManualClock::new();
    let limiter = limiter_with(2, 0.5, &clock);

    limiter.admit("idle");
    limiter.admit("idle");
    assert!(!limiter.admit("idle"));

    clock.advance(Duration::from_secs(3601));
    assert_eq!(limiter.reclaim_idle(), 1);
    assert_eq!(limiter.tracked_visitors(), 0);

    // Forgotten visitors start over with a full bucket.
    assert!(limiter.admit("idle"));
    assert!(limiter.admit("idle"));
}

#[test]
fn visitors_inside_retention_survive_reclamation() {
    let clock = ManualClock::new();
    let limiter = limiter_with(2, 1.0, &clock);

    limiter.admit("recent");
    clock.advance(Duration::from_secs(3599));
    assert_eq!(limiter.reclaim_idle(), 0);
    assert!(limiter.visitor("recent").is_some());
}

#[tokio::test(start_paused = true)]
async fn reclaimer_task_sweeps_periodically() {
    let clock = ManualClock::new();
    let limiter = Arc::new(limiter_with(2, 1.0, &clock));
    let shutdown = ShutdownSignal::new();
    let reclaimer = limiter.spawn_reclaimer(&shutdown);

    limiter.admit("visitor");
    clock.advance(Duration::from_secs(7200));
    tokio::time::sleep(Duration::from_secs(61)).await;

    assert_eq!(limiter.tracked_visitors(), 0);
    assert_eq!(limiter.statistics().reclaimed, 1);
    assert!(reclaimer.is_running());
    reclaimer.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checks_never_exceed_capacity() {
    let clock = ManualClock::new();
    let limiter = Arc::new(limiter_with(25, 1.0, &clock));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.admit("shared") })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 25);
    assert_eq!(limiter.statistics().rejected, 75);
}
