//! Events delivered to the presentation layer.

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::types::ResponseItem;

/// Event emitted by the conversation loop. Carries finished items only;
/// anything staged under a stale generation never reaches this channel.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    /// A finished conversation item.
    Item(ResponseItem),
    /// Whether a turn is currently in flight.
    Loading(bool),
    /// Continuation identifier recorded after a completed response. Empty
    /// when a cancel left nothing to continue from.
    LastResponseId(String),
}

/// Sending half of the loop's event channel.
pub type EventSender = mpsc::UnboundedSender<LoopEvent>;

/// Receiving half of the loop's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<LoopEvent>;

/// Create the event channel pair.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Wrap the receiving half as a `Stream`.
pub fn event_stream(rx: EventReceiver) -> UnboundedReceiverStream<LoopEvent> {
    UnboundedReceiverStream::new(rx)
}
