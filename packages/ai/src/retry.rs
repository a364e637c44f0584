// ABOUTME: Bounded retry with exponential backoff for gateway calls
// ABOUTME: Only transient failures are retried; the last error surfaces once attempts run out

use std::future::Future;
use std::time::Duration;

use pmstation_config::{constants, env};
use tracing::warn;

use crate::error::AIServiceResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_LLM_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(constants::DEFAULT_LLM_RETRY_BASE_MS),
            max_delay: Duration::from_millis(constants::DEFAULT_LLM_RETRY_MAX_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_env() -> Self {
        let max_attempts = env::parse_env_in_range(
            constants::PMSTATION_LLM_MAX_ATTEMPTS,
            constants::DEFAULT_LLM_MAX_ATTEMPTS,
            1,
            10,
        );
        let base_ms = env::parse_env_or_default(
            constants::PMSTATION_LLM_RETRY_BASE_MS,
            constants::DEFAULT_LLM_RETRY_BASE_MS,
        );
        let max_ms = env::parse_env_or_default(
            constants::PMSTATION_LLM_RETRY_MAX_MS,
            constants::DEFAULT_LLM_RETRY_MAX_MS,
        );

        Self {
            max_attempts,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms.max(base_ms)),
        }
    }

    /// No waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay after the given failed attempt (1-based): base doubled per attempt, capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails terminally, or attempts are exhausted
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> AIServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AIServiceResult<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Transient gateway failure, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
