//! MCPBench Core Library
//!
//! Multi-provider LLM invocation layer: a canonical conversation model,
//! adapters for each provider's wire format, per-candidate retry with
//! exponential backoff and an ordered fallback chain across providers.

pub mod config;
pub mod http;
pub mod invoker;
pub mod protocol;
pub mod providers;

pub use config::{Context, LlmConfig, ModelPricing, SecretString};
pub use invoker::{GenerateOptions, LlmInvoker};
pub use protocol::{
    CanonicalRequest, CanonicalResponse, Message, ResponseSchema, Role, ToolCall, ToolDefinition, Usage,
};
pub use providers::{
    CancellationHandle, InvocationError, InvocationOutcome, ProviderCandidate, ProviderError, ProviderId,
};

/// Returns the version of the MCPBench Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
