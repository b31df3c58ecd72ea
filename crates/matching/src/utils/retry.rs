//! Bounded exponential backoff for optimistic transactions.

use std::future::Future;
use std::time::Duration;

use groupting_config::MatchingConfig;
use rand::Rng;
use tracing::debug;

use crate::types::MatchResult;

const JITTER_FRACTION: f64 = 0.25;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
    jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
            multiplier: multiplier.max(1.0),
            jitter: true,
        }
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.initial_backoff(),
            config.max_backoff(),
            config.backoff_multiplier,
        )
    }

    /// Retry up to `max_attempts` times with no delay between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            jitter: false,
            ..Self::new(max_attempts, Duration::ZERO, Duration::ZERO, 1.0)
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after failed attempt number `attempt` (1-based), before jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(scaled)
            .map(|delay| delay.min(self.max_backoff))
            .unwrap_or(self.max_backoff)
    }

    fn delay(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let extra = rand::thread_rng().gen_range(0.0..=JITTER_FRACTION);
        base.mul_f64(1.0 + extra)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent. The last error is returned as-is.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> MatchResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = MatchResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay(attempt);
                    debug!(
                        operation = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&MatchingConfig::default())
    }
}
