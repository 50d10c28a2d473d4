//! Maps model-emitted tool calls onto the execution sandbox.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::types::ResponseItem;

use super::sandbox::{ApprovalPolicy, ExecutionSandbox};
use super::types::ShellArgs;

/// Output synthesized for a call whose execution never happened because
/// the turn was canceled.
pub fn aborted_output(call_id: impl Into<String>) -> ResponseItem {
    let wrapped = serde_json::json!({
        "output": "aborted",
        "metadata": { "exit_code": 1, "duration_seconds": 0.0 },
    });
    ResponseItem::function_call_output(call_id, wrapped.to_string())
}

/// Stateless dispatcher from tool-call items to sandbox executions.
pub struct ToolBridge {
    sandbox: Arc<dyn ExecutionSandbox>,
    policy: ApprovalPolicy,
    writable_roots: Vec<PathBuf>,
}

impl ToolBridge {
    pub fn new(
        sandbox: Arc<dyn ExecutionSandbox>,
        policy: ApprovalPolicy,
        writable_roots: Vec<PathBuf>,
    ) -> Self {
        Self {
            sandbox,
            policy,
            writable_roots,
        }
    }

    /// Dispatch one tool-call item. Returns the output item answering the
    /// call plus any side-channel items the sandbox emitted; empty when the
    /// turn is already canceled or the item is not a tool call.
    pub async fn dispatch(
        &self,
        item: &ResponseItem,
        cancel: &CancellationToken,
    ) -> Vec<ResponseItem> {
        if cancel.is_cancelled() {
            return Vec::new();
        }
        let Some((name, raw_args, call_id)) = call_parts(item) else {
            return Vec::new();
        };

        let args: ShellArgs = match serde_json::from_str(raw_args) {
            Ok(args) => args,
            Err(_) => {
                return vec![ResponseItem::function_call_output(
                    call_id,
                    format!("invalid arguments: {raw_args}"),
                )];
            }
        };

        match name {
            "shell" | "container.exec" => {
                debug!(call_id = %call_id, command = ?args.command, "dispatching shell call");
                let outcome = self
                    .sandbox
                    .execute(args, self.policy, &self.writable_roots, cancel.clone())
                    .await;
                let wrapped = serde_json::json!({
                    "output": outcome.output,
                    "metadata": outcome.metadata,
                });
                let mut items = vec![ResponseItem::function_call_output(
                    call_id,
                    wrapped.to_string(),
                )];
                items.extend(outcome.additional_items);
                items
            }
            other => {
                debug!(name = other, "unknown tool requested");
                vec![ResponseItem::function_call_output(
                    call_id,
                    "no function found",
                )]
            }
        }
    }
}

/// Name, raw argument text and call identifier of a tool-call item, for
/// either the flattened or the nested call shape.
fn call_parts(item: &ResponseItem) -> Option<(&str, &str, String)> {
    match item {
        ResponseItem::FunctionCall {
            id,
            call_id,
            name,
            arguments,
        } => {
            let call_id = call_id.clone().or_else(|| id.clone()).unwrap_or_default();
            Some((name, arguments, call_id))
        }
        ResponseItem::ToolCall { id, function } => Some((
            &function.name,
            &function.arguments,
            id.clone().unwrap_or_default(),
        )),
        _ => None,
    }
}
