//! Fallback demo
//!
//! Starts two local mock providers: an OpenAI-compatible endpoint that keeps
//! answering 503 and an Anthropic endpoint that answers normally. The invoker
//! retries the primary, falls back, and reports what it spent.
//!
//! Run with: RUST_LOG=mcpbench_core=debug cargo run --example fallback_demo

use std::time::Duration;

use anyhow::Context as _;
use mcpbench_core::config::{Context, LlmConfig, ModelPricing};
use mcpbench_core::protocol::Message;
use mcpbench_core::providers::{InvocationOutcome, ProviderId};
use mcpbench_core::{GenerateOptions, LlmInvoker};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&openai)
        .await;

    let anthropic = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_demo",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-5-haiku-latest",
            "content": [{"type": "text", "text": "A monad is a monoid in the category of endofunctors."}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 1200, "output_tokens": 300}
        })))
        .mount(&anthropic)
        .await;

    let config = LlmConfig::new(ProviderId::OpenAI, "gpt-4o")
        .with_base_url(openai.uri())
        .with_fallback_models(["anthropic/claude-3-5-haiku-latest"])
        .with_retries(2, Duration::from_millis(50))
        .with_pricing("claude-3-5-haiku-latest", ModelPricing::new(0.0008, 0.004));

    let invoker = LlmInvoker::new(config).context("building invoker")?;
    invoker.set_context(
        Context::isolated(Default::default())
            .with_env("OPENAI_API_KEY", "sk-demo")
            .with_env("ANTHROPIC_API_KEY", "ant-demo")
            .with_env("ANTHROPIC_BASE_URL", anthropic.uri()),
    );

    println!("Chain:");
    for candidate in invoker.candidates() {
        println!("  {}", candidate.label());
    }

    let messages = vec![
        Message::system("You are a helpful coding assistant"),
        Message::user("What is a monad in functional programming?"),
    ];
    let outcome = invoker
        .generate(messages, None, Vec::new(), &GenerateOptions::new())
        .await?;

    match &outcome {
        InvocationOutcome::Success {
            response, answered_by, ..
        } => {
            println!("\nAnswered by {}", answered_by);
            println!("  {}", response.text.as_deref().unwrap_or_default());
        }
        InvocationOutcome::Exhausted { .. } => println!("\nEvery candidate failed"),
        InvocationOutcome::Cancelled { .. } => println!("\nCancelled"),
    }

    for record in outcome.attempted() {
        println!(
            "  {} failed after {} attempt(s): {}",
            record.candidate.label(),
            record.attempts,
            record.last_error
        );
    }
    println!("Total cost: ${:.6}", invoker.total_cost());

    Ok(())
}
