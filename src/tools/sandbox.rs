//! Boundary to the component that actually runs commands.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::Display;
use tokio_util::sync::CancellationToken;

use crate::types::ResponseItem;

use super::types::ShellArgs;

/// How much autonomy command execution gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ApprovalPolicy {
    Suggest,
    AutoEdit,
    FullAuto,
}

/// Structured facts about one command execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecMetadata {
    pub exit_code: i32,
    pub duration_seconds: f64,
}

/// Result of one command execution.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub output: String,
    pub metadata: ExecMetadata,
    /// Extra items the sandbox wants surfaced alongside the output.
    pub additional_items: Vec<ResponseItem>,
}

impl ExecOutcome {
    pub fn new(output: impl Into<String>, exit_code: i32, duration_seconds: f64) -> Self {
        Self {
            output: output.into(),
            metadata: ExecMetadata {
                exit_code,
                duration_seconds,
            },
            additional_items: Vec::new(),
        }
    }
}

/// Executes commands on behalf of the model. Implementations enforce the
/// approval policy, the writable-roots allowlist and the per-command
/// timeout themselves, and must return promptly once `cancel` fires.
#[async_trait]
pub trait ExecutionSandbox: Send + Sync {
    async fn execute(
        &self,
        args: ShellArgs,
        policy: ApprovalPolicy,
        writable_roots: &[PathBuf],
        cancel: CancellationToken,
    ) -> ExecOutcome;
}
