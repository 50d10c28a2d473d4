//! Late-cancel-consistent delivery of finished items.
//!
//! Every produced item sits in an ordered slot for a short window before it
//! is released to the event channel. A cancel that lands inside the window
//! advances the generation, and the release task drops the item instead of
//! delivering it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::types::ResponseItem;

use super::events::{EventSender, LoopEvent};

/// Window between an item finishing and its release to the caller.
pub const RELEASE_DELAY: Duration = Duration::from_millis(10);

/// Delay before leftover staged items are flushed at end of turn.
pub const FLUSH_DELAY: Duration = Duration::from_millis(30);

/// Shared gate deciding whether a deferred effect may still fire. One per
/// loop instance. The generation advances on every run and on every cancel;
/// exactly one generation is live at a time.
#[derive(Debug)]
pub struct TurnGate {
    generation: AtomicU64,
    canceled: AtomicBool,
    hard_abort: CancellationToken,
}

impl TurnGate {
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            canceled: AtomicBool::new(false),
            hard_abort: CancellationToken::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Advance to a new generation and return it.
    pub fn advance(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn set_canceled(&self, canceled: bool) {
        self.canceled.store(canceled, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Token cancelled only by loop termination. Per-turn tokens are
    /// children of this one.
    pub fn hard_abort(&self) -> &CancellationToken {
        &self.hard_abort
    }

    /// Whether an effect tagged with `generation` may still be delivered.
    pub fn is_live(&self, generation: u64) -> bool {
        self.generation() == generation
            && !self.is_canceled()
            && !self.hard_abort.is_cancelled()
    }
}

impl Default for TurnGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered staged-item buffer for one turn. Items enter slots in arrival
/// order; each `submit` spawns a generation-tagged release task that
/// re-checks the gate at delivery time. Release tasks drain every slot up
/// to their own, so delivery order matches arrival order no matter how the
/// timers are scheduled.
pub struct TurnStage {
    gate: Arc<TurnGate>,
    events: EventSender,
    generation: u64,
    slots: Arc<Mutex<Vec<Option<ResponseItem>>>>,
    seen_ids: Mutex<HashSet<String>>,
}

impl TurnStage {
    pub fn new(gate: Arc<TurnGate>, events: EventSender, generation: u64) -> Self {
        Self {
            gate,
            events,
            generation,
            slots: Arc::new(Mutex::new(Vec::new())),
            seen_ids: Mutex::new(HashSet::new()),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stage one item for delayed release. Items that already passed
    /// through this turn (same id) are dropped; the terminal response
    /// summary repeats items the stream already delivered one by one.
    pub fn submit(&self, item: ResponseItem) {
        if !self.gate.is_live(self.generation) {
            return;
        }
        if let Some(id) = item_id(&item) {
            if !self.seen_ids.lock().unwrap().insert(id.to_string()) {
                return;
            }
        }

        let index = {
            let mut slots = self.slots.lock().unwrap();
            slots.push(Some(item));
            slots.len() - 1
        };

        let gate = Arc::clone(&self.gate);
        let slots = Arc::clone(&self.slots);
        let events = self.events.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            tokio::time::sleep(RELEASE_DELAY).await;
            if !gate.is_live(generation) {
                trace!(generation, "dropping staged item from stale generation");
                return;
            }
            release_through(&slots, index, &events);
        });
    }

    /// Schedule the end-of-turn flush: after the flush delay, deliver any
    /// leftover staged items in order and lower the loading flag. Both are
    /// gated on the turn still being live.
    pub fn flush(&self) {
        let gate = Arc::clone(&self.gate);
        let slots = Arc::clone(&self.slots);
        let events = self.events.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            tokio::time::sleep(FLUSH_DELAY).await;
            if !gate.is_live(generation) {
                trace!(generation, "dropping turn flush from stale generation");
                return;
            }
            let remaining = slots.lock().unwrap().len();
            if remaining > 0 {
                release_through(&slots, remaining - 1, &events);
            }
            let _ = events.send(LoopEvent::Loading(false));
        });
    }
}

/// Deliver every undelivered slot up to and including `index`, in order.
fn release_through(
    slots: &Mutex<Vec<Option<ResponseItem>>>,
    index: usize,
    events: &EventSender,
) {
    let drained: Vec<ResponseItem> = {
        let mut slots = slots.lock().unwrap();
        slots
            .iter_mut()
            .take(index + 1)
            .filter_map(Option::take)
            .collect()
    };
    for item in drained {
        let _ = events.send(LoopEvent::Item(item));
    }
}

fn item_id(item: &ResponseItem) -> Option<&str> {
    match item {
        ResponseItem::Message { id, .. }
        | ResponseItem::Reasoning { id, .. }
        | ResponseItem::FunctionCall { id, .. }
        | ResponseItem::ToolCall { id, .. } => id.as_deref(),
        _ => None,
    }
}
