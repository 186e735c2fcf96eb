//! Tests for the fallback chain
//!
//! Adapters are scripted fakes, so these tests exercise ordering, retry
//! classification and cancellation without any network traffic.

use async_trait::async_trait;
use mcpbench_core::config::ModelPricing;
use mcpbench_core::protocol::{
    CanonicalRequest, CanonicalResponse, Message, ResponseSchema, ToolDefinition,
};
use mcpbench_core::providers::{
    AdapterRegistry, AdapterReply, CancellationHandle, CostTracker, FallbackChain, InvocationError,
    InvocationOutcome, ProviderAdapter, ProviderCandidate, ProviderError, ProviderId, ProviderReply,
    RetryPolicy, Sleeper, WireProtocol,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

/// Adapter that replays a script of results, then keeps answering "ok"
#[derive(Default)]
struct ScriptedAdapter {
    script: Mutex<VecDeque<Result<AdapterReply, ProviderError>>>,
    calls: AtomicU32,
    cancel_on_call: Option<CancellationHandle>,
}

impl ScriptedAdapter {
    fn new(script: Vec<Result<&str, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|step| step.map(|text| AdapterReply::canonical(CanonicalResponse::from_text(text))))
                    .collect(),
            ),
            ..Default::default()
        })
    }

    fn with_replies(replies: Vec<AdapterReply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(replies.into_iter().map(Ok).collect()),
            ..Default::default()
        })
    }

    fn cancelling(handle: CancellationHandle, error: ProviderError) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::from([Err(error)])),
            cancel_on_call: Some(handle),
            ..Default::default()
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(
        &self,
        _candidate: &ProviderCandidate,
        _request: &CanonicalRequest,
        _timeout: Duration,
    ) -> Result<AdapterReply, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = &self.cancel_on_call {
            handle.cancel();
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(AdapterReply::canonical(CanonicalResponse::from_text("ok"))))
    }
}

#[derive(Default)]
struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

fn chain_with(adapters: &[(ProviderId, Arc<ScriptedAdapter>)], max_retries: u32) -> (FallbackChain, Arc<RecordingSleeper>) {
    let mut registry = AdapterRegistry::new();
    for (provider, adapter) in adapters {
        registry.register(*provider, adapter.clone());
    }
    let sleeper = Arc::new(RecordingSleeper::default());
    let chain = FallbackChain::new(Arc::new(registry))
        .with_retry_policy(RetryPolicy::new(max_retries, Duration::from_secs(10)))
        .with_sleeper(sleeper.clone());
    (chain, sleeper)
}

fn candidate_a() -> ProviderCandidate {
    ProviderCandidate::new(ProviderId::OpenAI, "gpt-4o")
}

fn candidate_b() -> ProviderCandidate {
    ProviderCandidate::new(ProviderId::Anthropic, "claude-3-5-sonnet")
}

fn hello() -> CanonicalRequest {
    CanonicalRequest::new(vec![Message::user("Hello, world!")])
}

#[tokio::test]
async fn test_retries_on_primary_then_success() {
    let a = ScriptedAdapter::new(vec![
        Err(ProviderError::Timeout("slow".into())),
        Err(ProviderError::Timeout("slow".into())),
        Ok("ok"),
    ]);
    let b = ScriptedAdapter::new(vec![]);
    let (chain, sleeper) = chain_with(&[(ProviderId::OpenAI, a.clone()), (ProviderId::Anthropic, b.clone())], 2);

    let outcome = assert_ok!(chain.run(&[candidate_a(), candidate_b()], &hello(), None).await);

    assert_eq!(outcome.response().and_then(|r| r.text.as_deref()), Some("ok"));
    assert!(outcome.attempted().is_empty());
    assert_eq!(a.calls(), 3);
    assert_eq!(b.calls(), 0);
    assert_eq!(
        *sleeper.delays.lock().unwrap(),
        vec![Duration::from_secs(10), Duration::from_secs(20)]
    );
}

/// The first candidate burns all R+1 attempts on retryable errors, the second
/// answers, and the third is never contacted
#[tokio::test]
async fn test_retryable_exhaustion_advances_and_stops_at_first_success() {
    let overloaded = || ProviderError::ServerError {
        status_code: 503,
        message: "overloaded".into(),
    };
    let a = ScriptedAdapter::new(vec![Err(overloaded()), Err(overloaded()), Err(overloaded())]);
    let b = ScriptedAdapter::new(vec![
        Err(ProviderError::RateLimited {
            message: "slow down".into(),
            retry_after: None,
        }),
        Ok("from b"),
    ]);
    let c = ScriptedAdapter::new(vec![]);
    let (chain, sleeper) = chain_with(
        &[
            (ProviderId::OpenAI, a.clone()),
            (ProviderId::Anthropic, b.clone()),
            (ProviderId::Gemini, c.clone()),
        ],
        2,
    );
    let candidate_c = ProviderCandidate::new(ProviderId::Gemini, "gemini-2.0-flash");

    let outcome = assert_ok!(
        chain
            .run(&[candidate_a(), candidate_b(), candidate_c], &hello(), None)
            .await
    );

    match outcome {
        InvocationOutcome::Success {
            response,
            answered_by,
            attempted,
            ..
        } => {
            assert_eq!(response.text.as_deref(), Some("from b"));
            assert_eq!(answered_by, "anthropic/claude-3-5-sonnet");
            assert_eq!(attempted.len(), 1);
            assert_eq!(attempted[0].attempts, 3);
            assert_eq!(attempted[0].last_error, overloaded());
        }
        other => panic!("expected success, got {:?}", other),
    }
    assert_eq!(a.calls(), 3);
    assert_eq!(b.calls(), 2);
    assert_eq!(c.calls(), 0);
    assert_eq!(
        *sleeper.delays.lock().unwrap(),
        vec![Duration::from_secs(10), Duration::from_secs(20), Duration::from_secs(10)]
    );
}

#[tokio::test]
async fn test_unauthorized_primary_falls_back() {
    let a = ScriptedAdapter::new(vec![Err(ProviderError::Unauthorized("invalid key".into()))]);
    let b = ScriptedAdapter::new(vec![Ok("from b")]);
    let (chain, sleeper) = chain_with(&[(ProviderId::OpenAI, a.clone()), (ProviderId::Anthropic, b.clone())], 3);

    let outcome = assert_ok!(chain.run(&[candidate_a(), candidate_b()], &hello(), None).await);

    match outcome {
        InvocationOutcome::Success {
            response,
            answered_by,
            attempted,
            ..
        } => {
            assert_eq!(response.text.as_deref(), Some("from b"));
            assert_eq!(answered_by, "anthropic/claude-3-5-sonnet");
            assert_eq!(attempted.len(), 1);
            assert_eq!(attempted[0].candidate, candidate_a());
            assert!(matches!(attempted[0].last_error, ProviderError::Unauthorized(_)));
        }
        other => panic!("expected success, got {:?}", other),
    }
    assert_eq!(a.calls(), 1);
    assert!(sleeper.delays.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_all_candidates_exhausted() {
    let a = ScriptedAdapter::new(vec![
        Err(ProviderError::RateLimited {
            message: "busy".into(),
            retry_after: None,
        }),
        Err(ProviderError::RateLimited {
            message: "still busy".into(),
            retry_after: None,
        }),
    ]);
    let b = ScriptedAdapter::new(vec![Err(ProviderError::Protocol("unexpected shape".into()))]);
    let (chain, _) = chain_with(&[(ProviderId::OpenAI, a.clone()), (ProviderId::Anthropic, b.clone())], 1);

    let outcome = assert_ok!(chain.run(&[candidate_a(), candidate_b()], &hello(), None).await);

    match &outcome {
        InvocationOutcome::Exhausted { attempted } => {
            assert_eq!(attempted.len(), 2);
            assert_eq!(attempted[0].attempts, 2);
            assert_eq!(
                attempted[0].last_error,
                ProviderError::RateLimited {
                    message: "still busy".into(),
                    retry_after: None,
                }
            );
            assert_eq!(attempted[1].attempts, 1);
        }
        other => panic!("expected exhausted, got {:?}", other),
    }
    assert!(!outcome.is_success());
    assert!(matches!(outcome.last_error(), Some(ProviderError::Protocol(_))));
}

#[tokio::test]
async fn test_empty_candidate_list_is_configuration_error() {
    let (chain, _) = chain_with(&[], 0);
    let err = assert_err!(chain.run(&[], &hello(), None).await);
    assert!(matches!(err, InvocationError::Configuration(_)));
}

#[tokio::test]
async fn test_schema_with_tools_rejected_before_any_call() {
    let a = ScriptedAdapter::new(vec![]);
    let (chain, _) = chain_with(&[(ProviderId::OpenAI, a.clone())], 0);
    let request = hello()
        .with_tools(vec![ToolDefinition::new(
            "lookup",
            "Look something up",
            json!({"type": "object", "properties": {}}),
        )])
        .with_schema(ResponseSchema::new("answer", json!({"type": "object"})));

    let err = assert_err!(chain.run(&[candidate_a()], &request, None).await);
    assert!(matches!(err, InvocationError::Configuration(_)));
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_malformed_conversation_raised() {
    let a = ScriptedAdapter::new(vec![]);
    let (chain, _) = chain_with(&[(ProviderId::OpenAI, a.clone())], 0);
    let request = CanonicalRequest::new(vec![Message::user("hi"), Message::tool("call_missing", "42")]);

    let err = assert_err!(chain.run(&[candidate_a()], &request, None).await);
    assert!(matches!(err, InvocationError::MalformedInput(_)));
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_cancellation_between_candidates() {
    let handle = CancellationHandle::new();
    let a = ScriptedAdapter::cancelling(handle.clone(), ProviderError::Network("reset".into()));
    let b = ScriptedAdapter::new(vec![Ok("never")]);
    let (chain, _) = chain_with(&[(ProviderId::OpenAI, a.clone()), (ProviderId::Anthropic, b.clone())], 0);

    let outcome = assert_ok!(chain.run(&[candidate_a(), candidate_b()], &hello(), Some(&handle)).await);

    match outcome {
        InvocationOutcome::Cancelled { attempted } => {
            assert_eq!(attempted.len(), 1);
            assert_eq!(attempted[0].candidate, candidate_a());
        }
        other => panic!("expected cancelled, got {:?}", other),
    }
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn test_cost_recorded_for_answering_candidate() {
    let raw = ProviderReply::parse(
        WireProtocol::OpenAiChat,
        json!({
            "choices": [{"message": {"role": "assistant", "content": "priced"}}],
            "usage": {"prompt_tokens": 2000, "completion_tokens": 1000, "total_tokens": 3000}
        }),
    )
    .unwrap();
    let reply = AdapterReply {
        response: CanonicalResponse::from_text("priced"),
        raw: Some(raw),
    };
    let a = ScriptedAdapter::with_replies(vec![reply]);
    let tracker = Arc::new(CostTracker::new());
    let (chain, _) = chain_with(&[(ProviderId::OpenAI, a)], 0);
    let chain = chain.with_cost_tracker(tracker.clone());

    let candidate = candidate_a().with_pricing(ModelPricing::new(0.01, 0.03));
    let outcome = assert_ok!(chain.run(&[candidate], &hello(), None).await);

    match outcome {
        InvocationOutcome::Success { cost, .. } => assert!((cost - 0.05).abs() < 1e-9),
        other => panic!("expected success, got {:?}", other),
    }
    assert!((tracker.total() - 0.05).abs() < 1e-9);
}
