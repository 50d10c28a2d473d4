//! Protocol gateway: accepts chat-completions and unified requests and
//! speaks the line-delimited generate protocol to a local backend.
//!
//! The gateway is independent of the conversation loop; it shares only the
//! wire types and the HTTP client.

pub mod stream;
pub mod translate;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::Sse;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::backend::shared_client;
use crate::error::Result;

pub use stream::{DeltaEncoding, LineAssembler};
pub use translate::{GatewayRequest, GenerateRequest, GenerateResponse};

/// Settings for the protocol gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the local generate backend.
    pub upstream: String,
    /// Models the gateway is willing to serve.
    pub models: Vec<String>,
    /// Model used when a request does not name one.
    pub default_model: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            upstream: "http://localhost:11434".to_string(),
            models: vec!["qwen2.5:0.5b".to_string(), "deepseek-r1:1.5b".to_string()],
            default_model: "qwen2.5:0.5b".to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn with_upstream(mut self, upstream: impl Into<String>) -> Self {
        self.upstream = upstream.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        if let Some(first) = models.first() {
            self.default_model = first.clone();
        }
        self.models = models;
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

/// Build the gateway router over shared settings.
pub fn router(config: GatewayConfig) -> Router {
    Router::new()
        .route("/v1/models", get(list_models))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/responses", post(responses))
        .route("/health", get(health))
        .with_state(Arc::new(config))
}

/// Serve the gateway on an already-bound listener until the task is
/// aborted.
pub async fn serve(config: GatewayConfig, listener: tokio::net::TcpListener) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, upstream = %config.upstream, "gateway listening");
    axum::serve(listener, router(config)).await?;
    Ok(())
}

async fn list_models(State(config): State<Arc<GatewayConfig>>) -> Json<translate::ModelListing> {
    Json(translate::describe_models(&config.models))
}

async fn health(State(config): State<Arc<GatewayConfig>>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "models": config.models }))
}

async fn chat_completions(
    State(config): State<Arc<GatewayConfig>>,
    Json(request): Json<GatewayRequest>,
) -> Response {
    dispatch_generate(&config, request, DeltaEncoding::Chat).await
}

async fn responses(
    State(config): State<Arc<GatewayConfig>>,
    Json(request): Json<GatewayRequest>,
) -> Response {
    dispatch_generate(&config, request, DeltaEncoding::Unified).await
}

/// Shared body of both completion endpoints; only the outbound delta
/// framing differs.
async fn dispatch_generate(
    config: &GatewayConfig,
    request: GatewayRequest,
    encoding: DeltaEncoding,
) -> Response {
    let model = request
        .model
        .clone()
        .unwrap_or_else(|| config.default_model.clone());
    if !config.models.iter().any(|m| m == &model) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            &format!(
                "Model {model} not found. Available models: {}",
                config.models.join(", ")
            ),
            None,
        );
    }

    let body = request.generate_request(&model);
    debug!(model = %model, stream = body.stream, "forwarding generate request");
    let failure_message = if request.stream {
        "An error occurred while processing your streaming request"
    } else {
        "An error occurred while processing your request"
    };

    let upstream = shared_client()
        .post(format!("{}/api/generate", config.upstream))
        .json(&body)
        .send()
        .await
        .and_then(|response| response.error_for_status());
    let upstream = match upstream {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "upstream generate call failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                failure_message,
                Some(err.to_string()),
            );
        }
    };

    if request.stream {
        return Sse::new(stream::sse_events(encoding, model, upstream)).into_response();
    }

    match upstream.json::<GenerateResponse>().await {
        Ok(reply) => Json(translate::completion_from(&model, &reply)).into_response(),
        Err(err) => {
            warn!(error = %err, "upstream reply was not a generate object");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                failure_message,
                Some(err.to_string()),
            )
        }
    }
}

fn error_response(
    status: StatusCode,
    kind: &str,
    message: &str,
    details: Option<String>,
) -> Response {
    let mut error = json!({ "message": message, "type": kind });
    if let Some(details) = details {
        error["details"] = json!(details);
    }
    (status, Json(json!({ "error": error }))).into_response()
}
