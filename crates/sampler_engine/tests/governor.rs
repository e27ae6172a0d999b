use std::time::Duration;

use sampler_engine::{GovernorSettings, QuotaSignal, RateGovernor};
use tokio::time::Instant;

fn signal(remaining: u64, reset_in: Duration) -> QuotaSignal {
    QuotaSignal {
        remaining: Some(remaining),
        reset_in: Some(reset_in),
        retry_after: None,
    }
}

#[tokio::test(start_paused = true)]
async fn acquire_waits_for_quota_reset() {
    let governor = RateGovernor::new(GovernorSettings::default());
    governor.update(signal(0, Duration::from_secs(30))).await;

    let before = Instant::now();
    governor.acquire().await;
    assert!(
        before.elapsed() >= Duration::from_secs(30),
        "permit handed out {:?} before the reset",
        Duration::from_secs(30) - before.elapsed()
    );
}

#[tokio::test(start_paused = true)]
async fn acquire_waits_when_remaining_is_within_safety_margin() {
    let settings = GovernorSettings {
        safety_margin: 5,
        ..GovernorSettings::default()
    };
    let governor = RateGovernor::new(settings);
    governor.update(signal(5, Duration::from_secs(10))).await;

    let before = Instant::now();
    governor.acquire().await;
    assert!(before.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn enforces_minimum_inter_request_spacing() {
    let governor = RateGovernor::new(GovernorSettings::default());
    governor.update(signal(4000, Duration::from_secs(3600))).await;

    let before = Instant::now();
    governor.acquire().await;
    governor.acquire().await;
    assert!(before.elapsed() >= Duration::from_millis(720));
}

#[tokio::test(start_paused = true)]
async fn disabled_governor_never_waits() {
    let settings = GovernorSettings {
        enabled: false,
        ..GovernorSettings::default()
    };
    let governor = RateGovernor::new(settings);
    governor.update(signal(0, Duration::from_secs(3600))).await;

    let before = Instant::now();
    governor.acquire().await;
    governor.acquire().await;
    assert_eq!(before.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn retry_after_takes_precedence_over_reset() {
    let governor = RateGovernor::new(GovernorSettings::default());
    governor
        .update(QuotaSignal {
            remaining: Some(0),
            reset_in: Some(Duration::from_secs(3600)),
            retry_after: Some(Duration::from_secs(10)),
        })
        .await;

    let before = Instant::now();
    governor.acquire().await;
    let elapsed = before.elapsed();
    assert!(elapsed >= Duration::from_secs(10));
    assert!(elapsed < Duration::from_secs(3600));
}

#[tokio::test(start_paused = true)]
async fn window_tracks_signals_and_clears_after_a_waited_reset() {
    let governor = RateGovernor::new(GovernorSettings::default());
    governor.update(signal(42, Duration::from_secs(600))).await;
    let window = governor.window().await;
    assert_eq!(window.remaining, Some(42));
    assert!(window.reset_at.is_some());

    // Once acquire has waited out an exhausted window, the stale counts
    // must be gone.
    governor.update(signal(0, Duration::from_secs(30))).await;
    governor.acquire().await;
    let window = governor.window().await;
    assert_eq!(window.remaining, None);
    assert_eq!(window.reset_at, None);
}

#[tokio::test(start_paused = true)]
async fn exhaust_forces_the_next_acquire_to_wait() {
    let governor = RateGovernor::new(GovernorSettings::default());
    governor.exhaust(Duration::from_secs(60)).await;

    let before = Instant::now();
    governor.acquire().await;
    assert!(before.elapsed() >= Duration::from_secs(60));
}
