//! Configuration for the orchestrator and its backends.

pub mod session;

pub use session::Session;

use std::path::PathBuf;

use crate::tools::ApprovalPolicy;
use crate::util::retry::{DEFAULT_RATE_LIMIT_BASE_MS, MAX_ATTEMPTS};

/// Wire protocol spoken by the configured endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireProtocol {
    /// Unified streaming protocol with native tool calling.
    Responses,
    /// Non-streaming chat completions driven through the structured
    /// command protocol.
    ChatCommands,
}

/// Orchestrator configuration, resolved once per session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL, e.g. `https://api.openai.com/v1`.
    pub api_base: String,
    /// Bearer credential. Optional for local backends.
    pub api_key: Option<String>,
    pub model: String,
    /// Caller-supplied instructions appended after the built-in preamble.
    pub instructions: Option<String>,
    /// Request the flex service tier on supported models.
    pub flex_mode: bool,
    pub approval_policy: ApprovalPolicy,
    pub writable_roots: Vec<PathBuf>,
    /// Connection-establishment retry ceiling.
    pub max_attempts: u32,
    /// Base wait for rate-limit backoff, in milliseconds.
    pub rate_limit_base_ms: u64,
    /// Pin the turn strategy instead of inferring it from the endpoint.
    pub protocol_override: Option<WireProtocol>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "o4-mini".to_string(),
            instructions: None,
            flex_mode: false,
            approval_policy: ApprovalPolicy::Suggest,
            writable_roots: Vec::new(),
            max_attempts: MAX_ATTEMPTS,
            rate_limit_base_ms: DEFAULT_RATE_LIMIT_BASE_MS,
            protocol_override: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::default();

        if let Ok(base) =
            std::env::var("TYCHO_API_BASE").or_else(|_| std::env::var("OPENAI_BASE_URL"))
        {
            config.api_base = base;
        }
        config.api_key = std::env::var("TYCHO_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok();
        if let Ok(model) = std::env::var("TYCHO_MODEL") {
            config.model = model;
        }
        config.instructions = std::env::var("TYCHO_INSTRUCTIONS").ok();
        config.flex_mode = std::env::var("TYCHO_FLEX_MODE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if let Ok(roots) = std::env::var("TYCHO_WRITABLE_ROOTS") {
            config.writable_roots = std::env::split_paths(&roots).collect();
        }
        if let Ok(n) = std::env::var("TYCHO_MAX_ATTEMPTS") {
            if let Ok(n) = n.parse() {
                config.max_attempts = n;
            }
        }
        if let Ok(ms) = std::env::var("TYCHO_RATE_LIMIT_BASE_MS") {
            if let Ok(ms) = ms.parse() {
                config.rate_limit_base_ms = ms;
            }
        }
        if let Ok(protocol) = std::env::var("TYCHO_WIRE_PROTOCOL") {
            config.protocol_override = match protocol.to_ascii_lowercase().as_str() {
                "responses" => Some(WireProtocol::Responses),
                "chat" => Some(WireProtocol::ChatCommands),
                _ => None,
            };
        }

        config
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_flex_mode(mut self, flex: bool) -> Self {
        self.flex_mode = flex;
        self
    }

    pub fn with_rate_limit_base_ms(mut self, ms: u64) -> Self {
        self.rate_limit_base_ms = ms;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_wire_protocol(mut self, protocol: WireProtocol) -> Self {
        self.protocol_override = Some(protocol);
        self
    }

    /// Select the turn strategy for the configured endpoint. Loopback
    /// addresses and chat-only vendors get the structured command loop;
    /// everything else speaks the unified streaming protocol.
    pub fn wire_protocol(&self) -> WireProtocol {
        if let Some(protocol) = self.protocol_override {
            return protocol;
        }
        let host = match reqwest::Url::parse(&self.api_base) {
            Ok(url) => url.host_str().map(str::to_string),
            Err(_) => None,
        };
        match host.as_deref() {
            Some("localhost" | "127.0.0.1" | "0.0.0.0" | "::1" | "[::1]") => {
                WireProtocol::ChatCommands
            }
            Some("api.deepseek.com") => WireProtocol::ChatCommands,
            _ => WireProtocol::Responses,
        }
    }
}
