//! Convenience re-exports for common use.

pub use crate::agent_loop::{ConversationLoop, EventReceiver, EventSender, LoopEvent};
pub use crate::config::{Config, Session, WireProtocol};
pub use crate::error::{Result, TychoError};
pub use crate::tools::{ApprovalPolicy, ExecOutcome, ExecutionSandbox, ShellArgs, ToolBridge};
pub use crate::types::{ChatMessage, CommandReply, ContentPart, ResponseItem, Role};
