//! OpenAI chat completions dialect
//!
//! Shared by OpenAI and every OpenAI-compatible provider; what differs between
//! them is decided by [`ProviderCapabilities`](crate::providers::ProviderCapabilities).

pub mod converter;
pub mod types;

pub use converter::{from_openai_response, to_openai_request, tool_call_from_openai, tool_call_to_openai};
pub use types::{OpenAIRequest, OpenAIResponse};
