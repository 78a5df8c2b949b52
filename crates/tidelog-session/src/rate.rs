//! Send-rate limiting

use std::time::{Duration, Instant};

use tidelog_core::Clock;
use tracing::trace;

/// Spaces sends at least `1 / max_fps` apart
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    period: Option<Duration>,
    last: Option<Instant>,
}

impl RateLimiter {
    /// Limit to `max_fps` sends per second
    ///
    /// `None`, zero, non-finite, or a rate whose period does not fit a
    /// [`Duration`] disables limiting.
    pub fn new(max_fps: Option<f64>) -> Self {
        let period = max_fps.and_then(|fps| period_for(fps).ok().flatten());
        Self { period, last: None }
    }

    /// Configured minimum spacing
    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// Sleep out the rest of the period since the previous call, then restart it
    pub async fn pace<C: Clock>(&mut self, clock: &C) {
        let Some(period) = self.period else {
            return;
        };
        if let Some(last) = self.last {
            let elapsed = clock.now().saturating_duration_since(last);
            if let Some(remaining) = period.checked_sub(elapsed).filter(|d| !d.is_zero()) {
                trace!(?remaining, "Rate limiting");
                clock.sleep(remaining).await;
            }
        }
        self.last = Some(clock.now());
    }
}

/// Spacing for `fps` sends per second
///
/// `Ok(None)` for rates that disable limiting, `Err` when the period is too
/// long to represent.
pub fn period_for(fps: f64) -> Result<Option<Duration>, std::time::TryFromFloatSecsError> {
    if !fps.is_finite() || fps <= 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(1.0 / fps).map(Some)
}
