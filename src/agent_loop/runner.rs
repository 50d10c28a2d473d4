//! The top-level conversation loop.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::chat;
use crate::config::{Config, Session, WireProtocol};
use crate::error::{ErrorCategory, Result, TychoError};
use crate::prompts;
use crate::tools::{bridge, ExecutionSandbox, ShellArgs, ToolBridge};
use crate::types::{ChatMessage, CommandReply, ResponseItem};

use super::events::{EventSender, LoopEvent};
use super::processor::StreamEventProcessor;
use super::staging::{TurnGate, TurnStage};

/// Drives one logical conversation: owns the cancellation state, the
/// pending-call ledger and the two turn strategies. One instance runs one
/// turn at a time.
pub struct ConversationLoop {
    config: Config,
    session: Session,
    bridge: ToolBridge,
    events: EventSender,
    gate: Arc<TurnGate>,
    pending_calls: Mutex<HashSet<String>>,
    processed_calls: Mutex<HashSet<String>>,
    history: Mutex<Vec<ChatMessage>>,
    last_response_id: Mutex<Option<String>>,
    turn_cancel: Mutex<CancellationToken>,
    terminated: AtomicBool,
}

impl ConversationLoop {
    pub fn new(config: Config, sandbox: Arc<dyn ExecutionSandbox>, events: EventSender) -> Self {
        let session = Session::new(config.model.clone());
        let bridge = ToolBridge::new(
            sandbox,
            config.approval_policy,
            config.writable_roots.clone(),
        );
        let gate = Arc::new(TurnGate::new());
        let turn_cancel = Mutex::new(gate.hard_abort().child_token());
        Self {
            config,
            session,
            bridge,
            events,
            gate,
            pending_calls: Mutex::new(HashSet::new()),
            processed_calls: Mutex::new(HashSet::new()),
            history: Mutex::new(Vec::new()),
            last_response_id: Mutex::new(None),
            turn_cancel,
            terminated: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run one input batch through to completion.
    pub async fn run(&self, input: Vec<ResponseItem>) -> Result<()> {
        if self.terminated.load(Ordering::SeqCst) {
            return Err(TychoError::Terminated);
        }

        let generation = self.gate.advance();
        self.gate.set_canceled(false);
        let cancel = self.fresh_turn_token();

        // Calls orphaned by an earlier cancel get answered before anything
        // else is sent upstream.
        let mut turn_input = self.synthesize_aborted_outputs();
        turn_input.extend(input);

        let _ = self.events.send(LoopEvent::Loading(true));
        info!(generation, items = turn_input.len(), "starting turn");

        let result = match self.config.wire_protocol() {
            WireProtocol::Responses => self.run_native(generation, turn_input, &cancel).await,
            WireProtocol::ChatCommands => self.run_commands(generation, turn_input, &cancel).await,
        };

        match result {
            Ok(()) => Ok(()),
            Err(err) => self.surface_turn_error(err),
        }
    }

    /// Cancel the current turn. Idempotent; a no-op once terminated.
    pub fn cancel(&self) {
        if self.terminated.load(Ordering::SeqCst) {
            return;
        }
        self.cancel_inner();
    }

    /// Permanently shut the loop down. Idempotent.
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("terminating loop");
        self.gate.hard_abort().cancel();
        self.cancel_inner();
    }

    fn cancel_inner(&self) {
        debug!("canceling current turn");
        // Abort the in-flight transport and exec work, then re-arm so the
        // next run gets a usable token.
        {
            let mut turn = self.turn_cancel.lock().unwrap();
            turn.cancel();
            *turn = self.gate.hard_abort().child_token();
        }
        self.gate.set_canceled(true);

        // With no pending calls there is nothing to pair a continuation
        // with; tell the session tracking to forget it. Pending calls keep
        // the id alive so the next run can answer them against the same
        // response chain.
        let ledger_empty = self.pending_calls.lock().unwrap().is_empty();
        if ledger_empty {
            *self.last_response_id.lock().unwrap() = None;
            let _ = self.events.send(LoopEvent::LastResponseId(String::new()));
        }
        let _ = self.events.send(LoopEvent::Loading(false));
        self.gate.advance();
    }

    fn fresh_turn_token(&self) -> CancellationToken {
        let token = self.gate.hard_abort().child_token();
        *self.turn_cancel.lock().unwrap() = token.clone();
        token
    }

    fn synthesize_aborted_outputs(&self) -> Vec<ResponseItem> {
        let mut orphaned: Vec<String> = {
            let mut pending = self.pending_calls.lock().unwrap();
            pending.drain().collect()
        };
        orphaned.sort();
        orphaned.into_iter().map(bridge::aborted_output).collect()
    }

    /// Multi-request turn over the unified streaming protocol.
    async fn run_native(
        &self,
        generation: u64,
        mut turn_input: Vec<ResponseItem>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let stage = TurnStage::new(Arc::clone(&self.gate), self.events.clone(), generation);
        let turn_started = Instant::now();
        let processor = StreamEventProcessor {
            config: &self.config,
            session: &self.session,
            bridge: &self.bridge,
            gate: &self.gate,
            pending_calls: &self.pending_calls,
            processed_calls: &self.processed_calls,
            events: &self.events,
        };

        while !turn_input.is_empty() {
            if cancel.is_cancelled() || self.gate.is_canceled() {
                break;
            }
            for item in &turn_input {
                stage.submit(item.clone());
            }
            let previous = self.last_response_id.lock().unwrap().clone();
            let input = std::mem::take(&mut turn_input);
            let outcome = processor
                .process(&stage, input, previous, turn_started, cancel)
                .await?;
            if let Some(id) = outcome.last_response_id {
                *self.last_response_id.lock().unwrap() = Some(id);
            }
            turn_input = outcome.next_input;
        }

        stage.flush();
        Ok(())
    }

    /// Structured command loop for backends without native tool calling.
    async fn run_commands(
        &self,
        generation: u64,
        turn_input: Vec<ResponseItem>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.seed_history();
        {
            let mut history = self.history.lock().unwrap();
            for item in &turn_input {
                if let Some(text) = item.text() {
                    if !text.is_empty() {
                        history.push(ChatMessage::user(text));
                    }
                }
            }
        }

        loop {
            if cancel.is_cancelled() || self.gate.is_canceled() {
                return Ok(());
            }
            let messages = self.history.lock().unwrap().clone();
            let reply = tokio::select! {
                res = chat::complete(&self.config, &self.session, &messages) => res?,
                _ = cancel.cancelled() => return Ok(()),
            };
            let Some(content) = reply else {
                debug!("model returned no content, ending command loop");
                break;
            };

            let parsed: CommandReply = match serde_json::from_str(&content) {
                Ok(parsed) => parsed,
                Err(err) => {
                    // Terminal for this turn only: show the model's raw
                    // text instead of failing the run.
                    debug!(error = %err, "reply is not a command object");
                    self.emit_direct(generation, ResponseItem::assistant_message(&content));
                    self.history.lock().unwrap().push(ChatMessage::assistant(content));
                    break;
                }
            };

            if let Some(message) = parsed.message.as_deref().filter(|m| !m.is_empty()) {
                self.emit_direct(generation, ResponseItem::assistant_message(message));
            }
            // The model sees its own protocol replies verbatim.
            self.history
                .lock()
                .unwrap()
                .push(ChatMessage::assistant(content));

            if parsed.has_command() {
                let args = ShellArgs {
                    command: parsed.command.clone().unwrap_or_default(),
                    workdir: parsed.workdir.clone(),
                    timeout: parsed.timeout,
                };
                let call = ResponseItem::FunctionCall {
                    id: None,
                    call_id: Some(format!("call_{}", Uuid::new_v4().simple())),
                    name: "shell".to_string(),
                    arguments: serde_json::to_string(&args)?,
                };
                self.emit_direct(generation, call.clone());

                let produced = self.bridge.dispatch(&call, cancel).await;
                for item in &produced {
                    self.emit_direct(generation, item.clone());
                }
                if let Some(ResponseItem::FunctionCallOutput { output, .. }) = produced.first() {
                    self.history.lock().unwrap().push(ChatMessage::user(output.clone()));
                }
            }

            if parsed.complete {
                break;
            }
        }

        if self.gate.is_live(generation) {
            let _ = self.events.send(LoopEvent::Loading(false));
        }
        Ok(())
    }

    /// Seed the command-loop history once per loop instance.
    fn seed_history(&self) {
        let mut history = self.history.lock().unwrap();
        if history.is_empty() {
            let mut prompt = prompts::COMMAND_PROTOCOL_INSTRUCTIONS.to_string();
            if let Some(extra) = self.config.instructions.as_deref() {
                if !extra.trim().is_empty() {
                    prompt.push_str("\n\n");
                    prompt.push_str(extra);
                }
            }
            history.push(ChatMessage::system(prompt));
        }
    }

    /// Deliver an item immediately, honoring the generation check.
    fn emit_direct(&self, generation: u64, item: ResponseItem) {
        if !self.gate.is_live(generation) {
            return;
        }
        let _ = self.events.send(LoopEvent::Item(item));
    }

    /// Convert recognized degraded-service failures into a single system
    /// message; anything unrecognized propagates to the caller.
    fn surface_turn_error(&self, err: TychoError) -> Result<()> {
        let notice = if err.is_request_too_large() {
            Some(err.to_string())
        } else {
            match err.category() {
                ErrorCategory::Stream => Some(
                    "Connection closed prematurely while waiting for the model. \
                     Please try again."
                        .to_string(),
                ),
                ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Server => Some(
                    format!("Network error while contacting the model: {err}. Please try again."),
                ),
                ErrorCategory::RateLimit => {
                    Some(format!("{err}. Please try again later."))
                }
                _ => None,
            }
        };
        match notice {
            Some(text) => {
                let _ = self
                    .events
                    .send(LoopEvent::Item(ResponseItem::system_message(text)));
                let _ = self.events.send(LoopEvent::Loading(false));
                Ok(())
            }
            None => {
                let _ = self.events.send(LoopEvent::Loading(false));
                Err(err)
            }
        }
    }
}
