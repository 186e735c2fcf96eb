//! Cost accounting across calls and tasks

use mcpbench_core::config::ModelPricing;
use mcpbench_core::protocol::Usage;
use mcpbench_core::providers::{CostTracker, ProviderCandidate, ProviderId, ProviderReply, WireProtocol};
use serde_json::json;
use std::sync::Arc;

fn gemini_reply(prompt: u32, completion: u32) -> ProviderReply {
    ProviderReply::parse(
        WireProtocol::GeminiGenerateContent,
        json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "ok"}]}}],
            "usageMetadata": {
                "promptTokenCount": prompt,
                "candidatesTokenCount": completion,
                "totalTokenCount": prompt + completion
            }
        }),
    )
    .unwrap()
}

#[test]
fn test_pricing_formula() {
    let pricing = ModelPricing::new(0.5, 1.5);
    let cost = pricing.cost(&Usage::new(2000, 500));
    assert!((cost - 1.75).abs() < 1e-12);
}

#[test]
fn test_reply_without_usage_costs_nothing() {
    let tracker = CostTracker::new();
    let candidate = ProviderCandidate::new(ProviderId::Vllm, "gpt-oss-20b").with_pricing(ModelPricing::new(1.0, 1.0));
    let reply = ProviderReply::parse(
        WireProtocol::TextCompletion,
        json!({"choices": [{"text": "ok"}]}),
    )
    .unwrap();

    assert_eq!(tracker.record_if_available(&candidate, &reply), 0.0);
    assert_eq!(tracker.total(), 0.0);
}

#[test]
fn test_totals_accumulate_and_reset() {
    let tracker = CostTracker::new();
    let candidate =
        ProviderCandidate::new(ProviderId::Gemini, "gemini-2.0-flash").with_pricing(ModelPricing::new(0.1, 0.4));

    tracker.record_if_available(&candidate, &gemini_reply(1000, 1000));
    tracker.record_if_available(&candidate, &gemini_reply(1000, 1000));
    assert!((tracker.total() - 1.0).abs() < 1e-9);

    tracker.reset();
    assert_eq!(tracker.total(), 0.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_recording() {
    let tracker = Arc::new(CostTracker::new());
    let candidate = Arc::new(
        ProviderCandidate::new(ProviderId::Gemini, "gemini-2.0-flash").with_pricing(ModelPricing::new(1.0, 0.0)),
    );

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let tracker = tracker.clone();
            let candidate = candidate.clone();
            tokio::spawn(async move {
                tracker.record_if_available(&candidate, &gemini_reply(1000, 0));
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    assert!((tracker.total() - 50.0).abs() < 1e-9);
}
