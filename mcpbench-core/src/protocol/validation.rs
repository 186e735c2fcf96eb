//! Structural checks run before any request leaves the process

use std::collections::HashSet;

use crate::protocol::types::{CanonicalRequest, Message, Role};
use crate::providers::error::ProviderError;

/// Check that a conversation is well formed
///
/// Every tool message must answer a tool call issued by an earlier assistant
/// message, and only assistant messages may carry tool calls.
pub fn validate_messages(messages: &[Message]) -> Result<(), ProviderError> {
    if messages.is_empty() {
        return Err(ProviderError::MalformedInput(
            "conversation contains no messages".to_string(),
        ));
    }

    let mut issued: HashSet<&str> = HashSet::new();

    for (index, message) in messages.iter().enumerate() {
        match message.role {
            Role::Assistant => {
                for call in message.calls() {
                    if call.id.is_empty() {
                        return Err(ProviderError::MalformedInput(format!(
                            "messages[{}]: tool call '{}' has an empty id",
                            index, call.name
                        )));
                    }
                    if call.name.is_empty() {
                        return Err(ProviderError::MalformedInput(format!(
                            "messages[{}]: tool call '{}' has an empty name",
                            index, call.id
                        )));
                    }
                    issued.insert(call.id.as_str());
                }
            }
            Role::Tool => {
                let id = message.tool_call_id.as_deref().ok_or_else(|| {
                    ProviderError::MalformedInput(format!(
                        "messages[{}]: tool message has no tool_call_id",
                        index
                    ))
                })?;
                if !issued.contains(id) {
                    return Err(ProviderError::MalformedInput(format!(
                        "messages[{}]: tool_call_id '{}' does not match any earlier assistant tool call",
                        index, id
                    )));
                }
            }
            Role::System | Role::User => {
                if message.tool_calls.is_some() {
                    return Err(ProviderError::MalformedInput(format!(
                        "messages[{}]: only assistant messages may carry tool calls",
                        index
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Check a full request: the conversation, tool definitions and the
/// schema/tools combination
pub fn validate_request(request: &CanonicalRequest) -> Result<(), ProviderError> {
    validate_messages(&request.messages)?;

    let mut names = HashSet::new();
    for tool in &request.tools {
        if tool.name.trim().is_empty() {
            return Err(ProviderError::MalformedInput(
                "tool definition has an empty name".to_string(),
            ));
        }
        if !names.insert(tool.name.as_str()) {
            return Err(ProviderError::MalformedInput(format!(
                "duplicate tool definition '{}'",
                tool.name
            )));
        }
    }

    if request.schema.is_some() && request.has_tools() {
        return Err(ProviderError::Configuration(
            "structured output and tool calling cannot be requested in the same call".to_string(),
        ));
    }

    Ok(())
}
