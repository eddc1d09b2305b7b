//! Backoff for history loads.
//!
//! Only `GET /api/chat/{id}` goes through this policy. Streamed posts start
//! generation on the service and are never repeated.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::StatusCode;

/// One failed history load attempt.
#[derive(Debug, Clone, Copy)]
pub enum LoadFailure<'a> {
    /// The service answered with a non-success status.
    Status { status: StatusCode, body: &'a str },
    /// No response arrived (refused, reset, timed out).
    Transport,
}

impl LoadFailure<'_> {
    /// Whether the same request may succeed a moment later.
    ///
    /// Client errors other than 408/429 are final unless the body reports a
    /// busy message store.
    pub fn is_transient(&self) -> bool {
        match *self {
            Self::Transport => true,
            Self::Status { status, body } => match status {
                StatusCode::REQUEST_TIMEOUT
                | StatusCode::TOO_MANY_REQUESTS
                | StatusCode::INTERNAL_SERVER_ERROR
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT => true,
                _ => store_busy_regex().is_match(body),
            },
        }
    }
}

fn store_busy_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)database.?is.?locked|sqlite_busy|temporarily.?unavailable|try.?again")
            .expect("store busy regex must compile")
    })
}

/// How often and how patiently a history load is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Wait before the first retry; doubled for each later one.
    pub base_delay: Duration,
    /// Upper bound for a single wait.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Whether attempt number `attempt` (zero-based) may be followed by another.
    pub fn should_retry(&self, attempt: u32, failure: &LoadFailure<'_>) -> bool {
        attempt < self.max_retries && failure.is_transient()
    }

    /// Wait after failed attempt `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}
