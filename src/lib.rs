//! Tycho, an orchestration layer for multi-turn, tool-using model
//! conversations.
//!
//! The conversation loop drives one logical session against either the
//! unified streaming protocol or a plain chat-completions backend, staging
//! produced items so late cancellation suppresses delivery. A separate,
//! feature-gated protocol gateway translates both inbound protocols onto a
//! local line-delimited generate backend.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tycho::agent_loop::{self, ConversationLoop, LoopEvent};
//! use tycho::config::Config;
//! use tycho::types::ResponseItem;
//!
//! # use std::path::PathBuf;
//! # use async_trait::async_trait;
//! # use tokio_util::sync::CancellationToken;
//! # use tycho::tools::{ApprovalPolicy, ExecOutcome, ExecutionSandbox, ShellArgs};
//! # struct NoopSandbox;
//! # #[async_trait]
//! # impl ExecutionSandbox for NoopSandbox {
//! #     async fn execute(
//! #         &self,
//! #         _args: ShellArgs,
//! #         _policy: ApprovalPolicy,
//! #         _writable_roots: &[PathBuf],
//! #         _cancel: CancellationToken,
//! #     ) -> ExecOutcome {
//! #         ExecOutcome::new("", 0, 0.0)
//! #     }
//! # }
//! # async fn example() -> tycho::error::Result<()> {
//! let config = Config::from_env();
//! let (events, mut rx) = agent_loop::channel();
//! let conversation = ConversationLoop::new(config, Arc::new(NoopSandbox), events);
//!
//! conversation
//!     .run(vec![ResponseItem::user_message("list the files here")])
//!     .await?;
//! drop(conversation);
//! while let Some(event) = rx.recv().await {
//!     if let LoopEvent::Item(item) = event {
//!         println!("{item:?}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod prelude;
pub mod prompts;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "gateway")]
pub mod gateway;

#[cfg(feature = "cli")]
pub mod cli;
