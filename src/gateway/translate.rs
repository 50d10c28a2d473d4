//! Translation between the two inbound protocols and the local backend's
//! generate protocol.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::ResponseItem;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TOP_P: f64 = 1.0;
pub const DEFAULT_MAX_TOKENS: u64 = 2048;

/// Role-tagged text line. Roles stay free-form strings here: the gateway
/// forwards whatever the client sent rather than policing vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl TextMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Inbound request body. One struct accepts both protocol shapes; which
/// fields are set decides the normalization path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayRequest {
    #[serde(default)]
    pub model: Option<String>,
    /// Chat-completions shape.
    #[serde(default)]
    pub messages: Option<Vec<TextMessage>>,
    /// Unified shape.
    #[serde(default)]
    pub input: Option<Vec<ResponseItem>>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u64>,
}

impl GatewayRequest {
    /// Collapse either inbound shape to role-tagged lines. Chat `messages`
    /// win when both are present; on the unified path `instructions` lead
    /// as a system line and items map by variant.
    pub fn normalized_messages(&self) -> Vec<TextMessage> {
        if let Some(messages) = &self.messages {
            return messages.clone();
        }
        let mut normalized = Vec::new();
        let Some(input) = &self.input else {
            return normalized;
        };
        if let Some(instructions) = self.instructions.as_deref().filter(|s| !s.is_empty()) {
            normalized.push(TextMessage::new("system", instructions));
        }
        for item in input {
            match item {
                ResponseItem::InputText { text } => {
                    normalized.push(TextMessage::new("user", text.clone()));
                }
                ResponseItem::FunctionCallOutput { output, .. } => {
                    normalized.push(TextMessage::new("assistant", output.clone()));
                }
                ResponseItem::Message { role, .. } => {
                    normalized.push(TextMessage::new(
                        role.to_string(),
                        item.text().unwrap_or_default(),
                    ));
                }
                _ => {}
            }
        }
        normalized
    }

    /// Flatten to the single prompt string the backend understands.
    pub fn prompt(&self) -> String {
        self.normalized_messages()
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Build the backend request, filling defaults for absent knobs.
    pub fn generate_request(&self, model: &str) -> GenerateRequest {
        GenerateRequest {
            model: model.to_string(),
            prompt: self.prompt(),
            stream: self.stream,
            options: GenerateOptions {
                temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
                top_p: self.top_p.unwrap_or(DEFAULT_TOP_P),
                max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            },
        }
    }
}

/// Body for `POST {upstream}/api/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: GenerateOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u64,
}

/// One frame of the backend's line-delimited stream; also the entire body
/// of a non-streaming call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
}

/// Completion object returned on the non-streaming path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: TextMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

pub fn completion_from(model: &str, reply: &GenerateResponse) -> ChatCompletion {
    let prompt_tokens = reply.prompt_eval_count.unwrap_or(0);
    let completion_tokens = reply.eval_count.unwrap_or(0);
    ChatCompletion {
        id: format!("chatcmpl-{}", Utc::now().timestamp_millis()),
        object: "chat.completion".to_string(),
        created: Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![CompletionChoice {
            index: 0,
            message: TextMessage::new("assistant", reply.response.clone()),
            finish_reason: "stop".to_string(),
        }],
        usage: Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        },
    }
}

/// Listing served by `GET /v1/models`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelListing {
    pub object: String,
    pub data: Vec<ModelDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

pub fn describe_models(models: &[String]) -> ModelListing {
    let created = Utc::now().timestamp();
    ModelListing {
        object: "list".to_string(),
        data: models
            .iter()
            .map(|id| ModelDescriptor {
                id: id.clone(),
                object: "model".to_string(),
                created,
                owned_by: "local-user".to_string(),
            })
            .collect(),
    }
}
