use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A uniformly jittered delay, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JitterRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl JitterRange {
    pub const ZERO: JitterRange = JitterRange {
        min_secs: 0.0,
        max_secs: 0.0,
    };

    pub fn from_secs(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.min_secs.is_finite() || !self.max_secs.is_finite() {
            return Err("bounds must be finite".to_string());
        }
        if self.min_secs < 0.0 {
            return Err(format!("min_secs must be >= 0, got {}", self.min_secs));
        }
        if self.min_secs > self.max_secs {
            return Err(format!(
                "min_secs ({}) is greater than max_secs ({})",
                self.min_secs, self.max_secs
            ));
        }
        Ok(())
    }

    /// Draw a delay from the range.
    pub fn sample(&self) -> Duration {
        // validate() guarantees this for loaded configs; clamp for hand-built ones
        let min = self.min_secs.max(0.0);
        let max = self.max_secs.max(min);
        if max == min {
            return Duration::from_secs_f64(min);
        }
        let secs = rand::thread_rng().gen_range(min..=max);
        Duration::from_secs_f64(secs)
    }
}

/// Sleep for a delay drawn from `range`.
///
/// Returns `false` if `cancel` fired before the delay elapsed.
pub async fn pause(range: &JitterRange, cancel: &CancellationToken) -> bool {
    let delay = range.sample();
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    debug!(delay_ms = delay.as_millis() as u64, "Pausing");
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
