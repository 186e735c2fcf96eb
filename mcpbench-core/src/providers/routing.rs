//! Fallback chain across provider candidates
//!
//! Candidates are tried strictly in order. Each one runs its own retry loop to
//! a terminal state; the first success wins and later candidates are never
//! contacted. When every candidate is exhausted the chain reports the full
//! attempt history instead of failing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::protocol::{validate_request, CanonicalRequest, CanonicalResponse};
use crate::providers::adapter::{AdapterRegistry, ProviderAdapter};
use crate::providers::candidate::ProviderCandidate;
use crate::providers::cost::CostTracker;
use crate::providers::error::{ErrorClass, InvocationError, ProviderError};
use crate::providers::retry::{RetryExecutor, RetryPolicy, Sleeper, TokioSleeper};

/// Default per-call timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Cooperative cancellation for a whole chain run
///
/// Checked before each candidate's first attempt; a call already in flight
/// finishes or times out on its own.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle(Arc<AtomicBool>);

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One exhausted candidate
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub candidate: ProviderCandidate,
    pub last_error: ProviderError,
    /// Calls made against this candidate, including the first
    pub attempts: u32,
}

/// Result of a chain run
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    /// A candidate answered
    Success {
        response: CanonicalResponse,
        /// Label (`provider/model`) of the candidate that answered
        answered_by: String,
        /// Cost recorded for the answering call
        cost: f64,
        /// Candidates exhausted before the one that answered
        attempted: Vec<AttemptRecord>,
    },
    /// Every candidate was exhausted
    Exhausted { attempted: Vec<AttemptRecord> },
    /// The caller cancelled between candidates
    Cancelled { attempted: Vec<AttemptRecord> },
}

impl InvocationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationOutcome::Success { .. })
    }

    /// The response, if a candidate answered
    pub fn response(&self) -> Option<&CanonicalResponse> {
        match self {
            InvocationOutcome::Success { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Consume the outcome, keeping only the response
    pub fn into_response(self) -> Option<CanonicalResponse> {
        match self {
            InvocationOutcome::Success { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Candidates that were tried and failed, in order
    pub fn attempted(&self) -> &[AttemptRecord] {
        match self {
            InvocationOutcome::Success { attempted, .. }
            | InvocationOutcome::Exhausted { attempted }
            | InvocationOutcome::Cancelled { attempted } => attempted,
        }
    }

    /// Last error of the last exhausted candidate
    pub fn last_error(&self) -> Option<&ProviderError> {
        self.attempted().last().map(|record| &record.last_error)
    }
}

/// Ordered fallback over provider candidates
pub struct FallbackChain {
    registry: Arc<AdapterRegistry>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    timeout: Duration,
    cost: Option<Arc<CostTracker>>,
}

impl FallbackChain {
    /// Create a chain with no retries and the default timeout
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self {
            registry,
            policy: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
            timeout: DEFAULT_TIMEOUT,
            cost: None,
        }
    }

    /// Set the retry policy applied to every candidate
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the sleeper used between retries
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Record the cost of successful calls into `tracker`
    pub fn with_cost_tracker(mut self, tracker: Arc<CostTracker>) -> Self {
        self.cost = Some(tracker);
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run the chain
    ///
    /// Only caller mistakes are raised: an empty candidate list, a malformed
    /// conversation, contradictory options or a provider with no adapter.
    /// Operational failures end up in [`InvocationOutcome::Exhausted`].
    pub async fn run(
        &self,
        candidates: &[ProviderCandidate],
        request: &CanonicalRequest,
        cancel: Option<&CancellationHandle>,
    ) -> Result<InvocationOutcome, InvocationError> {
        if candidates.is_empty() {
            return Err(InvocationError::Configuration(
                "no provider candidates configured".to_string(),
            ));
        }
        validate_request(request)?;

        let adapters = candidates
            .iter()
            .map(|candidate| {
                self.registry.get(candidate.provider).ok_or_else(|| {
                    InvocationError::Configuration(format!(
                        "no adapter registered for provider '{}'",
                        candidate.provider
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let executor = RetryExecutor::with_sleeper(self.policy.clone(), self.sleeper.clone());
        let mut attempted = Vec::new();

        for (index, (candidate, adapter)) in candidates.iter().zip(&adapters).enumerate() {
            if cancel.is_some_and(CancellationHandle::is_cancelled) {
                info!("Invocation cancelled before trying {}", candidate.label());
                return Ok(InvocationOutcome::Cancelled { attempted });
            }

            if index > 0 {
                info!("Falling back to {}", candidate.label());
            }

            let adapter: &dyn ProviderAdapter = adapter.as_ref();
            let timeout = self.timeout;
            let result = executor
                .execute(move |_| adapter.invoke(candidate, request, timeout))
                .await;

            match result.result {
                Ok(reply) => {
                    let cost = match (&self.cost, &reply.raw) {
                        (Some(tracker), Some(raw)) => tracker.record_if_available(candidate, raw),
                        _ => 0.0,
                    };
                    return Ok(InvocationOutcome::Success {
                        response: reply.response,
                        answered_by: candidate.label(),
                        cost,
                        attempted,
                    });
                }
                Err(err) if err.class() == ErrorClass::Caller => return Err(err.into()),
                Err(err) => {
                    if matches!(err, ProviderError::Protocol(_)) {
                        error!(
                            "Protocol error from {} via {}: {}",
                            candidate.label(),
                            adapter.name(),
                            err
                        );
                    } else {
                        warn!(
                            "Candidate {} exhausted after {} attempt(s): {}",
                            candidate.label(),
                            result.attempts,
                            err
                        );
                    }
                    attempted.push(AttemptRecord {
                        candidate: candidate.clone(),
                        last_error: err,
                        attempts: result.attempts,
                    });
                }
            }
        }

        warn!("All {} candidates exhausted", attempted.len());
        Ok(InvocationOutcome::Exhausted { attempted })
    }
}
