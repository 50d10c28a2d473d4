//! Tests for tool-call dispatch through the execution bridge.

mod common;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tycho::tools::{
    bridge, ApprovalPolicy, ExecOutcome, ExecutionSandbox, ShellArgs, ToolBridge,
};
use tycho::types::{ResponseItem, ToolCallFunction};

use common::RecordingSandbox;

fn echo_call(call_id: &str) -> ResponseItem {
    ResponseItem::FunctionCall {
        id: None,
        call_id: Some(call_id.to_string()),
        name: "shell".to_string(),
        arguments: r#"{"command":["echo","hello"]}"#.to_string(),
    }
}

fn full_auto_bridge(sandbox: Arc<RecordingSandbox>) -> ToolBridge {
    ToolBridge::new(sandbox, ApprovalPolicy::FullAuto, Vec::new())
}

fn unwrap_output(item: &ResponseItem) -> (&str, &str) {
    match item {
        ResponseItem::FunctionCallOutput { call_id, output } => (call_id, output),
        other => panic!("expected a function call output, got {other:?}"),
    }
}

#[tokio::test]
async fn shell_calls_wrap_the_sandbox_outcome() {
    let sandbox = Arc::new(RecordingSandbox::new());
    sandbox.queue_outcome("hello\n", 0);
    let bridge = full_auto_bridge(sandbox.clone());

    let produced = bridge
        .dispatch(&echo_call("call_1"), &CancellationToken::new())
        .await;

    assert_eq!(produced.len(), 1);
    let (call_id, output) = unwrap_output(&produced[0]);
    assert_eq!(call_id, "call_1");
    let wrapped: Value = serde_json::from_str(output).expect("output should wrap JSON");
    assert_eq!(wrapped["output"], "hello\n");
    assert_eq!(wrapped["metadata"]["exit_code"], 0);
    assert_eq!(sandbox.calls()[0].command, vec!["echo", "hello"]);
}

#[tokio::test]
async fn invalid_arguments_answer_without_executing() {
    let sandbox = Arc::new(RecordingSandbox::new());
    let bridge = full_auto_bridge(sandbox.clone());
    let call = ResponseItem::FunctionCall {
        id: None,
        call_id: Some("call_1".to_string()),
        name: "shell".to_string(),
        arguments: "not json".to_string(),
    };

    let produced = bridge.dispatch(&call, &CancellationToken::new()).await;

    let (call_id, output) = unwrap_output(&produced[0]);
    assert_eq!(call_id, "call_1");
    assert_eq!(output, "invalid arguments: not json");
    assert!(sandbox.calls().is_empty());
}

#[tokio::test]
async fn unknown_tools_answer_no_function_found() {
    let sandbox = Arc::new(RecordingSandbox::new());
    let bridge = full_auto_bridge(sandbox.clone());
    let call = ResponseItem::FunctionCall {
        id: None,
        call_id: Some("call_1".to_string()),
        name: "browse".to_string(),
        arguments: r#"{"command":["ls"]}"#.to_string(),
    };

    let produced = bridge.dispatch(&call, &CancellationToken::new()).await;

    let (_, output) = unwrap_output(&produced[0]);
    assert_eq!(output, "no function found");
    assert!(sandbox.calls().is_empty());
}

#[tokio::test]
async fn cancelled_turns_produce_nothing() {
    let sandbox = Arc::new(RecordingSandbox::new());
    let bridge = full_auto_bridge(sandbox.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let produced = bridge.dispatch(&echo_call("call_1"), &cancel).await;

    assert!(produced.is_empty());
    assert!(sandbox.calls().is_empty());
}

#[tokio::test]
async fn non_tool_items_produce_nothing() {
    let sandbox = Arc::new(RecordingSandbox::new());
    let bridge = full_auto_bridge(sandbox.clone());

    let produced = bridge
        .dispatch(
            &ResponseItem::user_message("hello"),
            &CancellationToken::new(),
        )
        .await;

    assert!(produced.is_empty());
}

#[tokio::test]
async fn nested_call_shape_dispatches_like_the_flat_one() {
    let sandbox = Arc::new(RecordingSandbox::new());
    sandbox.queue_outcome("nested\n", 0);
    let bridge = full_auto_bridge(sandbox.clone());
    let call = ResponseItem::ToolCall {
        id: Some("call_9".to_string()),
        function: ToolCallFunction {
            name: "shell".to_string(),
            arguments: r#"{"command":["pwd"]}"#.to_string(),
        },
    };

    let produced = bridge.dispatch(&call, &CancellationToken::new()).await;

    let (call_id, output) = unwrap_output(&produced[0]);
    assert_eq!(call_id, "call_9");
    let wrapped: Value = serde_json::from_str(output).expect("output should wrap JSON");
    assert_eq!(wrapped["output"], "nested\n");
    assert_eq!(sandbox.calls()[0].command, vec!["pwd"]);
}

#[tokio::test]
async fn container_exec_routes_to_the_shell() {
    let sandbox = Arc::new(RecordingSandbox::new());
    let bridge = full_auto_bridge(sandbox.clone());
    let call = ResponseItem::FunctionCall {
        id: None,
        call_id: Some("call_1".to_string()),
        name: "container.exec".to_string(),
        arguments: r#"{"command":["uname"]}"#.to_string(),
    };

    bridge.dispatch(&call, &CancellationToken::new()).await;

    assert_eq!(sandbox.calls().len(), 1);
}

#[tokio::test]
async fn call_id_falls_back_to_the_item_id() {
    let sandbox = Arc::new(RecordingSandbox::new());
    let bridge = full_auto_bridge(sandbox.clone());
    let call = ResponseItem::FunctionCall {
        id: Some("fc_2".to_string()),
        call_id: None,
        name: "shell".to_string(),
        arguments: r#"{"command":["ls"]}"#.to_string(),
    };

    let produced = bridge.dispatch(&call, &CancellationToken::new()).await;

    let (call_id, _) = unwrap_output(&produced[0]);
    assert_eq!(call_id, "fc_2");
}

struct CapturingSandbox {
    seen: Mutex<Vec<(ShellArgs, ApprovalPolicy, Vec<PathBuf>)>>,
}

#[async_trait]
impl ExecutionSandbox for CapturingSandbox {
    async fn execute(
        &self,
        args: ShellArgs,
        policy: ApprovalPolicy,
        writable_roots: &[PathBuf],
        _cancel: CancellationToken,
    ) -> ExecOutcome {
        self.seen
            .lock()
            .unwrap()
            .push((args, policy, writable_roots.to_vec()));
        ExecOutcome::new("captured", 0, 0.0)
    }
}

#[tokio::test]
async fn policy_and_writable_roots_reach_the_sandbox() {
    let sandbox = Arc::new(CapturingSandbox {
        seen: Mutex::new(Vec::new()),
    });
    let roots = vec![PathBuf::from("/tmp/work")];
    let bridge = ToolBridge::new(sandbox.clone(), ApprovalPolicy::AutoEdit, roots.clone());

    bridge
        .dispatch(&echo_call("call_1"), &CancellationToken::new())
        .await;

    let seen = sandbox.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].1, ApprovalPolicy::AutoEdit);
    assert_eq!(seen[0].2, roots);
}

#[test]
fn aborted_outputs_carry_a_failure_exit_code() {
    let item = bridge::aborted_output("call_7");

    let (call_id, output) = unwrap_output(&item);
    assert_eq!(call_id, "call_7");
    let wrapped: Value = serde_json::from_str(output).expect("output should wrap JSON");
    assert_eq!(wrapped["output"], "aborted");
    assert_eq!(wrapped["metadata"]["exit_code"], 1);
}
