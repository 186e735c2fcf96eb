//! Anthropic Messages dialect
//!
//! System prompts travel outside the message list, tool calls are `tool_use`
//! blocks on assistant turns and tool results are `tool_result` blocks on user
//! turns.

pub mod converter;
pub mod types;

pub use converter::{
    from_anthropic_response, to_anthropic_request, tool_call_from_anthropic, tool_call_to_anthropic,
    DEFAULT_MAX_TOKENS,
};
pub use types::{AnthropicRequest, AnthropicResponse};
