//! Tests for connection-retry classification.

use std::time::Duration;

use pretty_assertions::assert_eq;
use tycho::error::{ApiErrorDetails, TychoError};
use tycho::util::retry::{classify, RetryDecision, DEFAULT_RATE_LIMIT_BASE_MS, MAX_ATTEMPTS};

#[test]
fn server_error_retries_immediately_before_the_ceiling() {
    let err = TychoError::api(503, "Service unavailable");

    let decision = classify(&err, 1, MAX_ATTEMPTS, DEFAULT_RATE_LIMIT_BASE_MS);

    assert_eq!(decision, RetryDecision::Retry);
}

#[test]
fn server_error_at_the_ceiling_passes_through() {
    let err = TychoError::api(503, "Service unavailable");

    let decision = classify(&err, MAX_ATTEMPTS, MAX_ATTEMPTS, DEFAULT_RATE_LIMIT_BASE_MS);

    assert_eq!(decision, RetryDecision::PassThrough);
}

#[test]
fn timeout_retries_immediately() {
    let err = TychoError::Timeout(30_000);

    let decision = classify(&err, 2, MAX_ATTEMPTS, DEFAULT_RATE_LIMIT_BASE_MS);

    assert_eq!(decision, RetryDecision::Retry);
}

#[test]
fn rate_limit_waits_for_the_parsed_text_hint() {
    let err = TychoError::api(429, "Rate limit reached, retry in 3.2s");

    let decision = classify(&err, 2, MAX_ATTEMPTS, DEFAULT_RATE_LIMIT_BASE_MS);

    assert_eq!(
        decision,
        RetryDecision::WaitAndRetry(Duration::from_millis(3_200))
    );
}

#[test]
fn structured_retry_after_wins_over_the_text_hint() {
    let err = TychoError::RateLimited {
        message: "Too many requests, retry in 9s".to_string(),
        retry_after_ms: Some(1_200),
    };

    let decision = classify(&err, 1, MAX_ATTEMPTS, DEFAULT_RATE_LIMIT_BASE_MS);

    assert_eq!(
        decision,
        RetryDecision::WaitAndRetry(Duration::from_millis(1_200))
    );
}

#[test]
fn rate_limit_without_hints_follows_the_exponential_schedule() {
    let err = TychoError::RateLimited {
        message: "slow down".to_string(),
        retry_after_ms: None,
    };

    let first = classify(&err, 1, MAX_ATTEMPTS, DEFAULT_RATE_LIMIT_BASE_MS);
    let third = classify(&err, 3, MAX_ATTEMPTS, DEFAULT_RATE_LIMIT_BASE_MS);

    assert_eq!(
        first,
        RetryDecision::WaitAndRetry(Duration::from_millis(2_500))
    );
    assert_eq!(
        third,
        RetryDecision::WaitAndRetry(Duration::from_millis(10_000))
    );
}

#[test]
fn rate_limit_phrase_in_the_message_counts_without_a_429_status() {
    let err = TychoError::api(400, "Rate limit reached for model gpt-4");

    let decision = classify(&err, 1, MAX_ATTEMPTS, DEFAULT_RATE_LIMIT_BASE_MS);

    assert!(matches!(decision, RetryDecision::WaitAndRetry(_)));
}

#[test]
fn rate_limit_at_the_ceiling_aborts() {
    let err = TychoError::api(429, "Rate limit reached");

    let decision = classify(&err, MAX_ATTEMPTS, MAX_ATTEMPTS, DEFAULT_RATE_LIMIT_BASE_MS);

    assert_eq!(decision, RetryDecision::Abort);
}

#[test]
fn request_too_large_aborts_on_the_first_attempt() {
    let err = TychoError::api_with_details(
        400,
        "Requested 250000 tokens",
        ApiErrorDetails {
            code: None,
            kind: Some("invalid_request_error".to_string()),
            param: Some("max_tokens".to_string()),
        },
    );

    let decision = classify(&err, 1, MAX_ATTEMPTS, DEFAULT_RATE_LIMIT_BASE_MS);

    assert_eq!(decision, RetryDecision::Abort);
}

#[test]
fn request_too_large_by_message_phrase_aborts() {
    let err = TychoError::api(429, "max_tokens is too large: 250000");

    let decision = classify(&err, 1, MAX_ATTEMPTS, DEFAULT_RATE_LIMIT_BASE_MS);

    assert_eq!(decision, RetryDecision::Abort);
}

#[test]
fn validation_errors_pass_through() {
    let err = TychoError::api(400, "Invalid value for parameter 'input'");

    let decision = classify(&err, 1, MAX_ATTEMPTS, DEFAULT_RATE_LIMIT_BASE_MS);

    assert_eq!(decision, RetryDecision::PassThrough);
}

#[test]
fn configuration_errors_pass_through() {
    let err = TychoError::Configuration("no API key".to_string());

    let decision = classify(&err, 1, MAX_ATTEMPTS, DEFAULT_RATE_LIMIT_BASE_MS);

    assert_eq!(decision, RetryDecision::PassThrough);
}
