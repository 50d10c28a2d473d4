//! Tool dispatch: from model-emitted calls to the execution sandbox.

pub mod bridge;
pub mod sandbox;
pub mod types;

pub use bridge::ToolBridge;
pub use sandbox::{ApprovalPolicy, ExecMetadata, ExecOutcome, ExecutionSandbox};
pub use types::ShellArgs;
