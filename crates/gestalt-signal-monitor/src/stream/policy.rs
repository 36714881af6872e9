/*
[INPUT]:  Consecutive lost-connection count
[OUTPUT]: Backoff delay before the next connection attempt
[POS]:    Stream layer - reconnection policy (pure)
[UPDATE]: When changing backoff growth, cap, or jitter
*/

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Backoff parameters; `delay(n) = min(base * growth^(n-1), max) + uniform(0, jitter)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub growth: f64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 2_000,
            growth: 1.5,
            max_delay_ms: 30_000,
            jitter_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: BackoffConfig,
}

impl ReconnectPolicy {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Capped exponential delay for the `attempt`-th consecutive retry, without jitter.
    ///
    /// `attempt` is 1-based; 0 is treated as 1.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let raw = self.config.base_delay_ms as f64 * self.config.growth.powi(exponent);
        let capped = raw.min(self.config.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// [`Self::delay`] plus uniform jitter in `[0, jitter_ms)`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.delay(attempt) + self.jitter()
    }

    fn jitter(&self) -> Duration {
        if self.config.jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..self.config.jitter_ms))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

/// Failure streak bookkeeping; reset on every successful open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconnectSchedule {
    pub attempt_count: u32,
    pub last_delay: Option<Duration>,
}

impl ReconnectSchedule {
    /// Count one more lost connection and pick its delay.
    pub fn advance(&mut self, policy: &ReconnectPolicy) -> Duration {
        self.attempt_count = self.attempt_count.saturating_add(1);
        let delay = policy.next_delay(self.attempt_count);
        self.last_delay = Some(delay);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt_count = 0;
    }
}
