//! One outbound request attempt: establishment retry, then event decode.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Instant;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::responses::{self, StreamEvent};
use crate::config::{Config, Session};
use crate::error::Result;
use crate::tools::ToolBridge;
use crate::types::ResponseItem;
use crate::util::retry::{self, RetryDecision};

use super::events::{EventSender, LoopEvent};
use super::staging::{TurnGate, TurnStage};

/// What one processed request leaves behind. An empty `next_input` means
/// the turn has no continuation.
#[derive(Debug, Default)]
pub struct StreamOutcome {
    pub next_input: Vec<ResponseItem>,
    pub last_response_id: Option<String>,
}

/// Borrowed view of the loop state one request needs.
pub struct StreamEventProcessor<'a> {
    pub(crate) config: &'a Config,
    pub(crate) session: &'a Session,
    pub(crate) bridge: &'a ToolBridge,
    pub(crate) gate: &'a TurnGate,
    pub(crate) pending_calls: &'a Mutex<HashSet<String>>,
    pub(crate) processed_calls: &'a Mutex<HashSet<String>>,
    pub(crate) events: &'a EventSender,
}

impl StreamEventProcessor<'_> {
    /// Open one request and decode its stream to the end. Only the
    /// establishment step is retried; a failure after the stream is open
    /// either propagates or, when the turn was canceled, ends decoding
    /// silently.
    pub async fn process(
        &self,
        stage: &TurnStage,
        input: Vec<ResponseItem>,
        previous_response_id: Option<String>,
        turn_started: Instant,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome> {
        let mut attempt = 0u32;
        let stream = loop {
            attempt += 1;
            let attempt_result = tokio::select! {
                res = responses::stream_turn(
                    self.config,
                    self.session,
                    &input,
                    previous_response_id.as_deref(),
                ) => res,
                _ = cancel.cancelled() => return Ok(StreamOutcome::default()),
            };
            match attempt_result {
                Ok(stream) => break stream,
                Err(err) => {
                    match retry::classify(
                        &err,
                        attempt,
                        self.config.max_attempts,
                        self.config.rate_limit_base_ms,
                    ) {
                        RetryDecision::Retry => {
                            warn!(attempt, error = %err, "retrying connection");
                        }
                        RetryDecision::WaitAndRetry(wait) => {
                            warn!(
                                attempt,
                                wait_ms = wait.as_millis() as u64,
                                "rate limited, backing off"
                            );
                            tokio::select! {
                                _ = tokio::time::sleep(wait) => {}
                                _ = cancel.cancelled() => return Ok(StreamOutcome::default()),
                            }
                        }
                        RetryDecision::Abort | RetryDecision::PassThrough => return Err(err),
                    }
                }
            }
        };

        let mut outcome = StreamOutcome::default();
        futures::pin_mut!(stream);

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("turn canceled mid-stream");
                    return Ok(StreamOutcome {
                        next_input: Vec::new(),
                        last_response_id: outcome.last_response_id,
                    });
                }
                event = stream.next() => event,
            };
            let Some(event) = event else { break };
            let event = match event {
                Ok(event) => event,
                Err(err) => {
                    if cancel.is_cancelled() || self.gate.is_canceled() {
                        return Ok(StreamOutcome {
                            next_input: Vec::new(),
                            last_response_id: outcome.last_response_id,
                        });
                    }
                    return Err(err);
                }
            };

            match event {
                StreamEvent::OutputItemDone { item } => {
                    self.on_item_done(stage, item, turn_started);
                }
                StreamEvent::Completed { response } => {
                    if self.gate.is_live(stage.generation()) {
                        for item in &response.output {
                            stage.submit(item.clone());
                        }
                    }
                    if response.status.as_deref() == Some("completed") {
                        outcome.next_input = self.collect_outputs(&response.output, cancel).await;
                    }
                    let _ = self
                        .events
                        .send(LoopEvent::LastResponseId(response.id.clone()));
                    outcome.last_response_id = Some(response.id);
                    break;
                }
                StreamEvent::Ignored => {}
            }
        }

        Ok(outcome)
    }

    /// Handle one finished stream item. Tool calls only register in the
    /// pending ledger; their output arrives later from the bridge.
    fn on_item_done(&self, stage: &TurnStage, mut item: ResponseItem, turn_started: Instant) {
        if let ResponseItem::Reasoning { duration_ms, .. } = &mut item {
            *duration_ms = Some(turn_started.elapsed().as_millis() as u64);
        }
        if item.is_tool_call() {
            if let Some(call_id) = item.call_id() {
                self.pending_calls
                    .lock()
                    .unwrap()
                    .insert(call_id.to_string());
            }
            return;
        }
        stage.submit(item);
    }

    /// Run a completed response's tool calls through the bridge, in order,
    /// building the next turn's input. The protocol does not parallelize
    /// tool calls.
    async fn collect_outputs(
        &self,
        output: &[ResponseItem],
        cancel: &CancellationToken,
    ) -> Vec<ResponseItem> {
        let mut next_input = Vec::new();
        for item in output {
            if !item.is_tool_call() {
                continue;
            }
            if let Some(call_id) = item.call_id() {
                let already_dispatched = {
                    let mut processed = self.processed_calls.lock().unwrap();
                    !processed.insert(call_id.to_string())
                };
                if already_dispatched {
                    debug!(call_id, "skipping already dispatched call");
                    continue;
                }
            }
            let produced = self.bridge.dispatch(item, cancel).await;
            for item in &produced {
                if let ResponseItem::FunctionCallOutput { call_id, .. } = item {
                    self.pending_calls.lock().unwrap().remove(call_id);
                }
            }
            next_input.extend(produced);
        }
        next_input
    }
}
