//! Gemini generateContent dialect

pub mod converter;
pub mod types;

pub use converter::{from_gemini_response, to_gemini_request, tool_call_from_gemini, tool_call_to_gemini};
pub use types::{GeminiRequest, GeminiResponse, GeminiSchema, GeminiType};
