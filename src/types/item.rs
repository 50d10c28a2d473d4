//! Conversation items, the uniform unit of content exchanged with backends.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single part of a message item's content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText { text: String },
    OutputText { text: String },
    #[serde(other)]
    Other,
}

impl ContentPart {
    /// Text carried by this part, if it is a text part.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::InputText { text } | Self::OutputText { text } => Some(text),
            Self::Other => None,
        }
    }
}

/// Nested function payload of a chat-style tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// A unit of conversation content. The variant is decided once, when the
/// wire payload is decoded; downstream code matches on it instead of probing
/// for fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseItem {
    Message {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        role: Role,
        content: Vec<ContentPart>,
    },
    Reasoning {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
    /// Tool call in the flattened shape used by the unified protocol.
    FunctionCall {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        name: String,
        #[serde(default)]
        arguments: String,
    },
    /// Tool call in the nested chat-completions shape.
    ToolCall {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        function: ToolCallFunction,
    },
    /// Output produced for an earlier tool call, paired by `call_id`.
    FunctionCallOutput { call_id: String, output: String },
    /// Bare text input item on the unified path.
    InputText { text: String },
    #[serde(other)]
    Other,
}

impl ResponseItem {
    /// Message item with a single output-text part.
    pub fn message(role: Role, text: impl Into<String>) -> Self {
        Self::Message {
            id: None,
            role,
            content: vec![ContentPart::OutputText { text: text.into() }],
        }
    }

    /// System-role notice shown to the user.
    pub fn system_message(text: impl Into<String>) -> Self {
        Self::message(Role::System, text)
    }

    /// Assistant message item.
    pub fn assistant_message(text: impl Into<String>) -> Self {
        Self::message(Role::Assistant, text)
    }

    /// User message item with a single input-text part.
    pub fn user_message(text: impl Into<String>) -> Self {
        Self::Message {
            id: None,
            role: Role::User,
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }

    /// Output item answering the tool call identified by `call_id`.
    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::FunctionCallOutput {
            call_id: call_id.into(),
            output: output.into(),
        }
    }

    /// Whether this item requests a tool invocation, in either shape.
    pub fn is_tool_call(&self) -> bool {
        matches!(self, Self::FunctionCall { .. } | Self::ToolCall { .. })
    }

    /// Identifier pairing a tool call with its output.
    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::FunctionCall { call_id, id, .. } => call_id.as_deref().or(id.as_deref()),
            Self::ToolCall { id, .. } => id.as_deref(),
            Self::FunctionCallOutput { call_id, .. } => Some(call_id),
            _ => None,
        }
    }

    /// Concatenated text content, for items that carry text.
    pub fn text(&self) -> Option<String> {
        match self {
            Self::Message { content, .. } => Some(
                content
                    .iter()
                    .filter_map(ContentPart::text)
                    .collect::<Vec<_>>()
                    .join(""),
            ),
            Self::InputText { text } => Some(text.clone()),
            _ => None,
        }
    }
}
