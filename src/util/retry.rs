//! Connection-retry classification and backoff.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::error::TychoError;

/// Connection-establishment retry ceiling, counting the first attempt.
pub const MAX_ATTEMPTS: u32 = 5;

/// Default base wait for rate-limit backoff, in milliseconds.
pub const DEFAULT_RATE_LIMIT_BASE_MS: u64 = 2_500;

/// Verdict for one failed connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Establish again immediately.
    Retry,
    /// Wait, then establish again.
    WaitAndRetry(Duration),
    /// Give up on the turn.
    Abort,
    /// Not a connection-level failure; the caller decides.
    PassThrough,
}

/// Classify a failed connection attempt. `attempt` is 1-based and counts
/// the attempt that just failed.
pub fn classify(
    err: &TychoError,
    attempt: u32,
    max_attempts: u32,
    base_ms: u64,
) -> RetryDecision {
    if err.is_request_too_large() {
        return RetryDecision::Abort;
    }
    if err.is_rate_limit() {
        if attempt >= max_attempts {
            return RetryDecision::Abort;
        }
        return RetryDecision::WaitAndRetry(rate_limit_wait(err, attempt, base_ms));
    }
    if err.is_retryable() && attempt < max_attempts {
        return RetryDecision::Retry;
    }
    RetryDecision::PassThrough
}

/// Wait before the next attempt after a rate limit. A structured
/// retry-after from the backend wins, then a hint parsed from the error
/// text, then the exponential schedule.
fn rate_limit_wait(err: &TychoError, attempt: u32, base_ms: u64) -> Duration {
    if let Some(ms) = err.retry_after_ms() {
        return Duration::from_millis(ms);
    }
    if let Some(hint) = parse_retry_hint(&err.to_string()) {
        return hint;
    }
    compute_backoff(attempt, base_ms)
}

/// Exponential backoff schedule: `base * 2^(attempt-1)`.
pub fn compute_backoff(attempt: u32, base_ms: u64) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor))
}

/// Parse a "retry in 3.2s" / "try again in 3.2s" hint out of backend
/// error text.
pub fn parse_retry_hint(message: &str) -> Option<Duration> {
    static HINT_RE: OnceLock<Regex> = OnceLock::new();
    let re = HINT_RE.get_or_init(|| {
        Regex::new(r"(?i)(?:retry|try)(?: again)? in ([0-9]+(?:\.[0-9]+)?)s")
            .expect("retry hint regex must compile")
    });
    let caps = re.captures(message)?;
    let secs: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(Duration::from_secs_f64(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_retry_hints() {
        assert_eq!(
            parse_retry_hint("Rate limit reached, retry in 3.2s"),
            Some(Duration::from_millis(3200))
        );
        assert_eq!(
            parse_retry_hint("Please try again in 10s."),
            Some(Duration::from_secs(10))
        );
        assert_eq!(parse_retry_hint("no hint here"), None);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(compute_backoff(1, 2_500), Duration::from_millis(2_500));
        assert_eq!(compute_backoff(2, 2_500), Duration::from_millis(5_000));
        assert_eq!(compute_backoff(4, 2_500), Duration::from_millis(20_000));
    }
}
