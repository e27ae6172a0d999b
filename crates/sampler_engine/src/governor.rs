use std::time::Duration;

use log::{debug, warn};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::types::QuotaSignal;

/// Remaining request quota and when it replenishes, refreshed from every
/// provider response. Owned exclusively by the governor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaWindow {
    pub remaining: Option<u64>,
    pub reset_at: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct GovernorSettings {
    /// When false, `acquire` never waits. Configuration toggle for trusted
    /// high-quota contexts, not a separate code path.
    pub enabled: bool,
    /// Steady minimum spacing between requests, smoothing bursts that
    /// trigger secondary abuse limits. 720 ms keeps a run under ~5000
    /// requests per hour.
    pub min_interval: Duration,
    /// Quota level at or below which the governor waits for the reset.
    pub safety_margin: u64,
    /// Slack added past the reported reset instant.
    pub reset_pad: Duration,
}

impl Default for GovernorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval: Duration::from_millis(720),
            safety_margin: 2,
            reset_pad: Duration::from_secs(2),
        }
    }
}

struct GovernorState {
    window: QuotaWindow,
    last_permit: Option<Instant>,
}

/// The single synchronization point shared by every fetch. Permits are
/// serialized through one async mutex because quota is a single
/// provider-wide counter.
pub struct RateGovernor {
    settings: GovernorSettings,
    state: Mutex<GovernorState>,
}

impl RateGovernor {
    pub fn new(settings: GovernorSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(GovernorState {
                window: QuotaWindow::default(),
                last_permit: None,
            }),
        }
    }

    /// Wait until the next request is allowed to go out.
    ///
    /// Suspends the caller until the quota reset when the window is at or
    /// below the safety margin, otherwise enforces the minimum
    /// inter-request spacing. The internal lock is held across the waits so
    /// concurrent fetchers queue up behind a single permit line.
    pub async fn acquire(&self) {
        if !self.settings.enabled {
            return;
        }
        let mut state = self.state.lock().await;

        if let (Some(remaining), Some(reset_at)) =
            (state.window.remaining, state.window.reset_at)
        {
            if remaining <= self.settings.safety_margin {
                let now = Instant::now();
                if reset_at > now {
                    let wait = reset_at - now + self.settings.reset_pad;
                    warn!(
                        "quota exhausted (remaining {remaining}), waiting {}s for reset",
                        wait.as_secs()
                    );
                    tokio::time::sleep(wait).await;
                }
                // The window is stale once the reset has passed.
                state.window = QuotaWindow::default();
            }
        }

        if let Some(last) = state.last_permit {
            let elapsed = last.elapsed();
            if elapsed < self.settings.min_interval {
                tokio::time::sleep(self.settings.min_interval - elapsed).await;
            }
        }
        state.last_permit = Some(Instant::now());
    }

    /// Refresh the quota window from a provider response.
    pub async fn update(&self, signal: QuotaSignal) {
        let mut state = self.state.lock().await;
        if let Some(remaining) = signal.remaining {
            state.window.remaining = Some(remaining);
        }
        // Retry-After takes precedence: it is the provider telling us
        // exactly how long to back off.
        let reset_in = signal.retry_after.or(signal.reset_in);
        if let Some(reset_in) = reset_in {
            state.window.reset_at = Some(Instant::now() + reset_in);
        }
        debug!("quota window now {:?}", state.window);
    }

    /// Force the window empty so the next `acquire` waits out `reset_in`.
    /// Used when the provider answers with an explicit rate-limit error.
    pub async fn exhaust(&self, reset_in: Duration) {
        let mut state = self.state.lock().await;
        state.window.remaining = Some(0);
        state.window.reset_at = Some(Instant::now() + reset_in);
    }

    pub async fn window(&self) -> QuotaWindow {
        self.state.lock().await.window
    }
}
