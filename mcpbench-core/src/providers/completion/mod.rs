//! Text completion dialect, used by vLLM deployments

pub mod converter;
pub mod types;

pub use converter::{flatten_prompt, from_completion_response, to_completion_request};
pub use types::{CompletionRequest, CompletionResponse};
