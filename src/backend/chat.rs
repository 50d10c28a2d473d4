//! Non-streaming chat-completions client for the compatibility path.

use serde::Deserialize;
use tracing::debug;

use crate::config::{Config, Session};
use crate::error::Result;
use crate::types::ChatMessage;

use super::{default_headers, shared_client, status_to_error};

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Send the full history as one non-streaming request. Returns the
/// assistant text, or `None` when the model produced no content.
pub async fn complete(
    config: &Config,
    session: &Session,
    messages: &[ChatMessage],
) -> Result<Option<String>> {
    let body = serde_json::json!({
        "model": config.model,
        "messages": messages,
        "stream": false,
    });
    let url = format!("{}/chat/completions", config.api_base.trim_end_matches('/'));

    debug!(model = %config.model, history = messages.len(), "chat completion request");

    let resp = shared_client()
        .post(&url)
        .headers(default_headers(config, session))
        .json(&body)
        .send()
        .await?;

    let status = resp.status().as_u16();
    if status != 200 {
        let body_text = resp.text().await.unwrap_or_default();
        return Err(status_to_error(status, &body_text));
    }

    let data: ChatCompletionResponse = resp.json().await?;
    Ok(data
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty()))
}
