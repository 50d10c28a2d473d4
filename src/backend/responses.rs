//! Client for the unified streaming protocol.

use async_stream::stream;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::config::{Config, Session};
use crate::error::{Result, TychoError};
use crate::prompts;
use crate::types::ResponseItem;

use super::{default_headers, shared_client, status_to_error};

/// Summary carried by the terminal `response.completed` event.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseSummary {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Vec<ResponseItem>,
}

/// Event decoded off the unified protocol stream. Everything the
/// orchestrator does not act on collapses to `Ignored`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "response.output_item.done")]
    OutputItemDone { item: ResponseItem },
    #[serde(rename = "response.completed")]
    Completed { response: ResponseSummary },
    #[serde(other)]
    Ignored,
}

/// The one tool advertised on the unified path.
fn shell_tool() -> serde_json::Value {
    serde_json::json!({
        "type": "function",
        "name": "shell",
        "description": "Runs a shell command, and returns its output.",
        "parameters": {
            "type": "object",
            "properties": {
                "command": { "type": "array", "items": { "type": "string" } },
                "workdir": {
                    "type": "string",
                    "description": "The working directory for the command."
                },
                "timeout": {
                    "type": "number",
                    "description": "The maximum time to wait for the command to complete in milliseconds."
                }
            },
            "required": ["command"],
            "additionalProperties": false
        }
    })
}

fn reasoning_params(model: &str) -> Option<serde_json::Value> {
    if !model.starts_with('o') {
        return None;
    }
    let mut reasoning = serde_json::json!({ "effort": "high" });
    if model.starts_with("o3") || model.starts_with("o4-mini") {
        reasoning["summary"] = "auto".into();
    }
    Some(reasoning)
}

fn build_request_body(
    config: &Config,
    input: &[ResponseItem],
    previous_response_id: Option<&str>,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": config.model,
        "instructions": prompts::merged_instructions(config.instructions.as_deref()),
        "input": input,
        "stream": true,
        "parallel_tool_calls": false,
        "tools": [shell_tool()],
        "tool_choice": "auto",
    });
    if let Some(id) = previous_response_id.filter(|id| !id.is_empty()) {
        body["previous_response_id"] = id.into();
    }
    if let Some(reasoning) = reasoning_params(&config.model) {
        body["reasoning"] = reasoning;
    }
    if config.flex_mode {
        body["service_tier"] = "flex".into();
    }
    body
}

/// One establishment attempt against the unified endpoint. Retry decisions
/// belong to the caller; a non-200 status is returned as an error before
/// any event is decoded.
pub async fn stream_turn(
    config: &Config,
    session: &Session,
    input: &[ResponseItem],
    previous_response_id: Option<&str>,
) -> Result<impl Stream<Item = Result<StreamEvent>>> {
    let body = build_request_body(config, input, previous_response_id);
    let url = format!("{}/responses", config.api_base.trim_end_matches('/'));

    debug!(model = %config.model, input_items = input.len(), "opening unified stream");

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

    let byte_stream = resp.bytes_stream();

    Ok(stream! {
        let mut buffer = String::new();
        let mut pending_data: Vec<String> = Vec::new();
        let mut saw_done = false;
        futures::pin_mut!(byte_stream);

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    yield Err(TychoError::Stream(format!("stream closed prematurely: {e}")));
                    break;
                }
            };

            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].to_string();
                buffer = buffer[line_end + 1..].to_string();

                let line = line.trim_end_matches('\r');
                if !line.is_empty() {
                    if let Some(rest) = line.strip_prefix("data:") {
                        pending_data.push(rest.trim_start().to_string());
                    }
                    continue;
                }
                if pending_data.is_empty() {
                    continue;
                }
                let data = pending_data.join("\n");
                pending_data.clear();
                if data == "[DONE]" {
                    saw_done = true;
                    break;
                }
                match serde_json::from_str::<StreamEvent>(&data) {
                    Ok(event) => yield Ok(event),
                    Err(e) => {
                        trace!(error = %e, "skipping undecodable stream event");
                    }
                }
            }

            if saw_done {
                break;
            }
        }

        // Flush a trailing event that arrived without its blank-line
        // terminator.
        if !saw_done && !pending_data.is_empty() {
            let data = pending_data.join("\n");
            if data != "[DONE]" {
                if let Ok(event) = serde_json::from_str::<StreamEvent>(&data) {
                    yield Ok(event);
                }
            }
        }
    })
}
