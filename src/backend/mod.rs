//! HTTP plumbing shared by the backend clients.

pub mod chat;
pub mod responses;

use std::sync::OnceLock;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;

use crate::config::{Config, Session};
use crate::error::{ApiErrorDetails, TychoError};

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client. No overall request timeout:
/// streamed turns legitimately run for minutes.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(60))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// Default headers for a backend request: content type, bearer credential
/// when configured, session identity.
pub fn default_headers(config: &Config, session: &Session) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = &config.api_key {
        if let Ok(val) = HeaderValue::from_str(&format!("Bearer {key}")) {
            headers.insert(AUTHORIZATION, val);
        }
    }
    for (name, value) in session.header_values() {
        if let Ok(val) = HeaderValue::from_str(&value) {
            headers.insert(name, val);
        }
    }
    headers
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(flatten)]
    details: ApiErrorDetails,
}

fn parse_error_body(body: &str) -> Option<(String, ApiErrorDetails)> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    let message = envelope.error.message.unwrap_or_else(|| body.to_string());
    Some((message, envelope.error.details))
}

fn extract_retry_after(body: &str) -> Option<u64> {
    // Backends put retry_after (seconds) inside the JSON error body.
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}

/// Map a non-200 response to an error, keeping whatever structure the
/// body carried.
pub fn status_to_error(status: u16, body: &str) -> TychoError {
    let parsed = parse_error_body(body);
    match status {
        429 => TychoError::RateLimited {
            message: parsed
                .map(|(message, _)| message)
                .unwrap_or_else(|| body.to_string()),
            retry_after_ms: extract_retry_after(body),
        },
        _ => match parsed {
            Some((message, details)) => TychoError::api_with_details(status, message, details),
            None => TychoError::api(status, body),
        },
    }
}
