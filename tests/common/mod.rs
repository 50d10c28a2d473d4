//! Shared test helpers and mock sandbox.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use tycho::agent_loop::{EventReceiver, LoopEvent};
use tycho::config::{Config, WireProtocol};
use tycho::tools::{ApprovalPolicy, ExecOutcome, ExecutionSandbox, ShellArgs};
use tycho::types::ResponseItem;

/// Sandbox that returns scripted outcomes and records every dispatch.
#[derive(Default)]
pub struct RecordingSandbox {
    outcomes: Mutex<Vec<ExecOutcome>>,
    calls: Mutex<Vec<ShellArgs>>,
}

impl RecordingSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome returned by the next execution.
    pub fn queue_outcome(&self, output: &str, exit_code: i32) {
        self.outcomes
            .lock()
            .unwrap()
            .push(ExecOutcome::new(output, exit_code, 0.01));
    }

    /// Arguments of every execution so far, in dispatch order.
    pub fn calls(&self) -> Vec<ShellArgs> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionSandbox for RecordingSandbox {
    async fn execute(
        &self,
        args: ShellArgs,
        _policy: ApprovalPolicy,
        _writable_roots: &[PathBuf],
        _cancel: CancellationToken,
    ) -> ExecOutcome {
        self.calls.lock().unwrap().push(args);
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.is_empty() {
            ExecOutcome::new("ok", 0, 0.01)
        } else {
            outcomes.remove(0)
        }
    }
}

/// Config pointed at a mock server, pinned to the native strategy.
pub fn native_config(base: &str) -> Config {
    Config::default()
        .with_api_base(base)
        .with_api_key("test-key")
        .with_wire_protocol(WireProtocol::Responses)
}

/// Config pointed at a mock server, pinned to the command loop.
pub fn command_config(base: &str) -> Config {
    Config::default()
        .with_api_base(base)
        .with_api_key("test-key")
        .with_wire_protocol(WireProtocol::ChatCommands)
}

/// Drain events until the loading state drops, with a hard timeout so a
/// wedged loop fails the test instead of hanging it.
pub async fn drain_until_idle(rx: &mut EventReceiver) -> Vec<LoopEvent> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event stream stalled")
            .expect("event channel closed");
        let done = event == LoopEvent::Loading(false);
        events.push(event);
        if done {
            return events;
        }
    }
}

/// Items delivered to the caller, in delivery order.
pub fn items(events: &[LoopEvent]) -> Vec<ResponseItem> {
    events
        .iter()
        .filter_map(|event| match event {
            LoopEvent::Item(item) => Some(item.clone()),
            _ => None,
        })
        .collect()
}

/// Concatenated text of every message item, for quick assertions.
pub fn message_texts(events: &[LoopEvent]) -> Vec<String> {
    items(events)
        .iter()
        .filter_map(ResponseItem::text)
        .collect()
}
