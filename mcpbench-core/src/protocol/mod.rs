//! Protocol module for the canonical conversation model
//!
//! This module defines the provider-agnostic data model every adapter
//! translates from and to:
//! - Messages, roles and tool calls
//! - Tool definitions and structured-output schemas
//! - The canonical response with usage and parsed output

pub mod types;
pub mod validation;

pub use types::{
    generate_call_id, Arguments, CanonicalRequest, CanonicalResponse, Message, ResponseSchema,
    Role, ToolCall, ToolCallKind, ToolDefinition, Usage,
};
pub use validation::{validate_messages, validate_request};
