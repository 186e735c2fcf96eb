//! Spend accounting across invocations
//!
//! One tracker is shared by every invocation of an invoker; concurrent
//! invocations add into the same total.

use std::sync::Mutex;

use tracing::info;

use crate::providers::candidate::ProviderCandidate;
use crate::providers::translate::ProviderReply;

/// Running total of spend, in USD
#[derive(Debug, Default)]
pub struct CostTracker {
    total: Mutex<f64>,
}

impl CostTracker {
    /// Create a tracker starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the cost of `reply` when both pricing and usage are known
    ///
    /// Returns the cost added, 0.0 when either is missing.
    pub fn record_if_available(&self, candidate: &ProviderCandidate, reply: &ProviderReply) -> f64 {
        let (Some(pricing), Some(usage)) = (candidate.pricing, reply.usage()) else {
            return 0.0;
        };

        let cost = pricing.cost(&usage);
        let total = self.add(cost);
        info!(
            model = %candidate.label(),
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            cost,
            total,
            "recorded call cost"
        );
        cost
    }

    /// Add an amount, returning the new total
    pub fn add(&self, amount: f64) -> f64 {
        let mut total = self.total.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *total += amount;
        *total
    }

    /// Current total
    pub fn total(&self) -> f64 {
        *self.total.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reset the total to zero
    pub fn reset(&self) {
        *self.total.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelPricing;
    use crate::providers::registry::{ProviderId, WireProtocol};
    use serde_json::json;

    fn reply(prompt: u32, completion: u32) -> ProviderReply {
        ProviderReply::parse(
            WireProtocol::OpenAiChat,
            json!({
                "choices": [{"message": {"role": "assistant", "content": "ok"}}],
                "usage": {"prompt_tokens": prompt, "completion_tokens": completion, "total_tokens": prompt + completion}
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_records_priced_usage() {
        let tracker = CostTracker::new();
        let candidate = ProviderCandidate::new(ProviderId::OpenAI, "gpt-4o")
            .with_pricing(ModelPricing::new(0.01, 0.03));

        let cost = tracker.record_if_available(&candidate, &reply(1000, 500));
        assert!((cost - 0.025).abs() < 1e-12);
        assert!((tracker.total() - 0.025).abs() < 1e-12);

        tracker.reset();
        assert_eq!(tracker.total(), 0.0);
    }

    #[test]
    fn test_unpriced_model_costs_nothing() {
        let tracker = CostTracker::new();
        let candidate = ProviderCandidate::new(ProviderId::OpenAI, "gpt-4o");
        assert_eq!(tracker.record_if_available(&candidate, &reply(1000, 500)), 0.0);
        assert_eq!(tracker.total(), 0.0);
    }
}
