//! Retry policy and executor for a single provider candidate
//!
//! Delays grow exponentially: `base_delay * 2^n` before retry `n + 1`. Only
//! retryable errors (see [`ErrorClass`](crate::providers::error::ErrorClass))
//! are retried; anything else ends the loop immediately.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::providers::error::ProviderError;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_retries: u32,

    /// Base of the exponential backoff
    pub base_delay: Duration,

    /// Jitter factor (0.0 to 1.0) to randomize delays
    pub jitter_factor: f64,

    /// Whether to wait for the provider's Retry-After instead of the backoff
    pub respect_retry_after: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_secs(10),
            jitter_factor: 0.0,
            respect_retry_after: false,
        }
    }
}

impl RetryPolicy {
    /// Create a retry policy with the given retry count and backoff base
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Default::default()
        }
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self::default()
    }

    /// Randomize each delay by up to `factor` in either direction
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Prefer the provider's Retry-After hint over the computed backoff
    pub fn respecting_retry_after(mut self) -> Self {
        self.respect_retry_after = true;
        self
    }

    /// Backoff before retry `attempt + 1`, without jitter: `base_delay * 2^attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        match 2u32.checked_pow(attempt) {
            Some(factor) => self.base_delay.checked_mul(factor).unwrap_or(Duration::MAX),
            None if self.base_delay.is_zero() => Duration::ZERO,
            None => Duration::MAX,
        }
    }

    /// Delay actually slept after failed attempt `attempt`
    pub fn calculate_delay(&self, attempt: u32, error: &ProviderError) -> Duration {
        if self.respect_retry_after {
            if let Some(retry_after) = error.retry_after() {
                return retry_after;
            }
        }

        let delay = self.backoff(attempt);
        if self.jitter_factor <= 0.0 {
            return delay;
        }

        let base = delay.as_secs_f64();
        let spread = base * self.jitter_factor;
        let jittered = rand::thread_rng().gen_range(base - spread..=base + spread);
        Duration::try_from_secs_f64(jittered.max(0.0)).unwrap_or(delay)
    }

    /// Check if we should retry based on the error and attempt count
    pub fn should_retry(&self, error: &ProviderError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_retryable()
    }
}

/// Where a single candidate's retry loop stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Attempt `n` (0-based) is about to run or running
    Attempting(u32),
    /// An attempt succeeded
    Success,
    /// No further attempts will be made
    Exhausted,
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for `delay`, then move to `Attempting(next_attempt)`
    Retry { next_attempt: u32, delay: Duration },
    /// Stop; the state is now `Exhausted`
    GiveUp,
}

impl RetryState {
    /// Transition after a successful attempt
    pub fn on_success(self) -> RetryState {
        RetryState::Success
    }

    /// Transition after attempt `n` failed with `error`
    pub fn on_failure(self, error: &ProviderError, policy: &RetryPolicy) -> RetryDecision {
        match self {
            RetryState::Attempting(attempt) if policy.should_retry(error, attempt) => RetryDecision::Retry {
                next_attempt: attempt + 1,
                delay: policy.calculate_delay(attempt, error),
            },
            _ => RetryDecision::GiveUp,
        }
    }
}

/// Something that can wait; swapped for a recording fake in tests
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Result of a retry operation
#[derive(Debug, Clone)]
pub struct RetryResult<T> {
    /// Success value, or the last error
    pub result: Result<T, ProviderError>,

    /// Attempts made, including the first
    pub attempts: u32,

    /// Delays slept between attempts, in order
    pub delays: Vec<Duration>,

    /// Every error encountered, in order
    pub error_history: Vec<ProviderError>,
}

impl<T> RetryResult<T> {
    /// Terminal state of the loop
    pub fn final_state(&self) -> RetryState {
        if self.result.is_ok() {
            RetryState::Success
        } else {
            RetryState::Exhausted
        }
    }

    /// Total time spent sleeping
    pub fn total_delay(&self) -> Duration {
        self.delays.iter().sum()
    }
}

/// Executor for retry operations
pub struct RetryExecutor {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryExecutor {
    /// Create a new retry executor sleeping on the tokio timer
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, Arc::new(TokioSleeper))
    }

    /// Create a new retry executor with a custom sleeper
    pub fn with_sleeper(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    /// The policy in effect
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute an operation with retry logic
    ///
    /// The operation receives the 0-based attempt number.
    pub async fn execute<F, T, Fut>(&self, mut operation: F) -> RetryResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        let mut delays = Vec::new();
        let mut error_history = Vec::new();

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    return RetryResult {
                        result: Ok(value),
                        attempts: attempt + 1,
                        delays,
                        error_history,
                    };
                }
                Err(error) => {
                    error_history.push(error.clone());

                    match RetryState::Attempting(attempt).on_failure(&error, &self.policy) {
                        RetryDecision::Retry { next_attempt, delay } => {
                            info!(
                                "Attempt {} failed with {} error: {}. Retrying in {:.1} seconds...",
                                attempt + 1,
                                error.kind(),
                                error,
                                delay.as_secs_f64()
                            );
                            delays.push(delay);
                            self.sleeper.sleep(delay).await;
                            attempt = next_attempt;
                        }
                        RetryDecision::GiveUp => {
                            if error.is_retryable() {
                                warn!("All {} attempts failed. Last error: {}", attempt + 1, error);
                            } else {
                                warn!("Non-retryable {} error: {}", error.kind(), error);
                            }
                            return RetryResult {
                                result: Err(error),
                                attempts: attempt + 1,
                                delays,
                                error_history,
                            };
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout() -> ProviderError {
        ProviderError::Timeout("slow".into())
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(3, Duration::from_secs(10));
        assert_eq!(policy.backoff(0), Duration::from_secs(10));
        assert_eq!(policy.backoff(1), Duration::from_secs(20));
        assert_eq!(policy.backoff(2), Duration::from_secs(40));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::new(100, Duration::from_secs(10));
        assert_eq!(policy.backoff(64), Duration::MAX);
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let policy = RetryPolicy::new(3, Duration::from_secs(10)).with_jitter(0.5);
        for _ in 0..100 {
            let delay = policy.calculate_delay(0, &timeout());
            assert!(delay >= Duration::from_secs(5) && delay <= Duration::from_secs(15));
        }
    }

    #[test]
    fn test_retry_after_respected_only_when_enabled() {
        let limited = ProviderError::RateLimited {
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(3)),
        };
        let policy = RetryPolicy::new(1, Duration::from_secs(10));
        assert_eq!(policy.calculate_delay(0, &limited), Duration::from_secs(10));
        assert_eq!(
            policy.respecting_retry_after().calculate_delay(0, &limited),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_state_transitions() {
        let policy = RetryPolicy::new(1, Duration::from_secs(1));
        let decision = RetryState::Attempting(0).on_failure(&timeout(), &policy);
        assert_eq!(
            decision,
            RetryDecision::Retry {
                next_attempt: 1,
                delay: Duration::from_secs(1)
            }
        );
        assert_eq!(RetryState::Attempting(1).on_failure(&timeout(), &policy), RetryDecision::GiveUp);
        assert_eq!(
            RetryState::Attempting(0).on_failure(&ProviderError::Unauthorized("no".into()), &policy),
            RetryDecision::GiveUp
        );
        assert_eq!(RetryState::Attempting(0).on_success(), RetryState::Success);
    }
}
