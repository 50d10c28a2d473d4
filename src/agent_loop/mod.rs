//! The conversation loop: turn orchestration, staging, stream decoding.

pub mod events;
pub mod processor;
pub mod runner;
pub mod staging;

pub use events::*;
pub use processor::StreamOutcome;
pub use runner::ConversationLoop;
pub use staging::{TurnGate, TurnStage, FLUSH_DELAY, RELEASE_DELAY};
