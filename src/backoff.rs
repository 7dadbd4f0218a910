use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff strategy for retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Same delay before every attempt
    Fixed,
    /// Delay doubles per attempt up to `max`
    Exponential { max: Duration },
}

/// Retry delay configuration, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first retry
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Delay policy shared by sink reconnection and re-attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub strategy: BackoffStrategy,
}

impl BackoffPolicy {
    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            strategy: BackoffStrategy::Exponential { max: max_delay },
        }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::exponential(
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Delay before retry number `attempt` (1-based). Attempt 0 never waits.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        match self.strategy {
            BackoffStrategy::Fixed => self.initial_delay,
            BackoffStrategy::Exponential { max } => {
                let factor = 2_u32.saturating_pow(attempt - 1);
                self.initial_delay.saturating_mul(factor).min(max)
            }
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}

/// Tracks consecutive attempts against a policy
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempts: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    /// Record an attempt and return how long to wait before making it
    pub fn next_delay(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        self.policy.delay(self.attempts)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Start over after a successful run
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
