//! Canonical request/response vocabulary shared by every provider
//!
//! These structures are the provider-agnostic form the invocation layer works
//! in. Adapters translate them to and from each provider's wire format; nothing
//! in here knows about HTTP or a particular vendor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Structured tool-call arguments: a JSON object keyed by parameter name
pub type Arguments = Map<String, Value>;

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that steer the model
    System,
    /// Input from the benchmark agent
    User,
    /// Model output, possibly carrying tool calls
    Assistant,
    /// Result of a tool call issued by an earlier assistant message
    Tool,
}

impl Role {
    /// Wire name shared by most providers
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// Kind of a tool call. Only function calls exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallKind {
    #[default]
    Function,
}

/// A single tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque identifier, provider-issued or generated locally
    pub id: String,

    /// Name of the tool to call
    pub name: String,

    /// Structured arguments
    #[serde(default)]
    pub arguments: Arguments,

    /// Always `function`
    #[serde(rename = "type", default)]
    pub kind: ToolCallKind,
}

impl ToolCall {
    /// Create a tool call with a known id
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            kind: ToolCallKind::Function,
        }
    }

    /// Create a tool call for a provider that does not issue call ids
    pub fn with_local_id(name: impl Into<String>, arguments: Arguments) -> Self {
        Self::new(generate_call_id(), name, arguments)
    }
}

/// Generate a locally unique tool-call id
pub fn generate_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,

    /// Text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool calls (assistant messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Id of the tool call this message answers (tool messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Create an assistant message carrying tool calls and an optional preamble
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Create a tool result message
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Text content, empty when absent
    pub fn content_text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// Tool calls, empty when absent
    pub fn calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}

/// Tool the model may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// JSON-schema-like parameter descriptor
    #[serde(default = "empty_object_schema")]
    pub parameter_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl ToolDefinition {
    /// Create a tool definition
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameter_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameter_schema,
        }
    }
}

/// Schema the caller wants the reply parsed against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSchema {
    /// Schema name (some providers require one)
    pub name: String,

    /// JSON-schema-like descriptor
    pub schema: Value,
}

impl ResponseSchema {
    /// Create a response schema
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// Everything a single invocation sends to a provider
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CanonicalRequest {
    /// Conversation in order
    pub messages: Vec<Message>,

    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Requested structured-output schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<ResponseSchema>,
}

impl CanonicalRequest {
    /// Create a request from a conversation
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            schema: None,
        }
    }

    /// Attach tool definitions
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Attach a structured-output schema
    pub fn with_schema(mut self, schema: ResponseSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Whether tool definitions were supplied
    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }
}

/// Token usage reported by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,

    /// Tokens in the completion
    pub completion_tokens: u32,

    /// Total tokens used
    pub total_tokens: u32,
}

impl Usage {
    /// Create usage, deriving the total
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Provider-agnostic reply
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CanonicalResponse {
    /// Text output (or textual preamble before tool calls)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Tool calls requested by the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Structured value parsed against the requested schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed: Option<Value>,

    /// Token usage, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Model that produced the reply, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Provider's finish/stop reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl CanonicalResponse {
    /// Create a plain-text response
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Whether the model asked for at least one tool call
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }

    /// Turn this response into the assistant message that continues the conversation
    pub fn to_assistant_message(&self) -> Message {
        if self.has_tool_calls() {
            Message::assistant_tool_calls(self.text.clone(), self.tool_calls.clone().unwrap_or_default())
        } else {
            Message::assistant(self.text.clone().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_constructors() {
        let msg = Message::tool("call_1", "42");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.content_text(), "42");
        assert!(msg.calls().is_empty());
    }

    #[test]
    fn test_tool_call_serializes_kind_as_type() {
        let call = ToolCall::new("call_1", "search", Map::new());
        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(value["type"], json!("function"));
    }

    #[test]
    fn test_local_ids_are_unique() {
        let a = ToolCall::with_local_id("f", Map::new());
        let b = ToolCall::with_local_id("f", Map::new());
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("call_"));
    }

    #[test]
    fn test_response_to_assistant_message() {
        let mut args = Map::new();
        args.insert("q".to_string(), json!("rust"));
        let response = CanonicalResponse {
            text: Some("Searching".to_string()),
            tool_calls: Some(vec![ToolCall::new("call_9", "search", args)]),
            ..Default::default()
        };
        let msg = response.to_assistant_message();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.calls()[0].id, "call_9");
        assert_eq!(msg.content_text(), "Searching");
    }
}
