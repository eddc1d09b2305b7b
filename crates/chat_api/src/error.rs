use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Error as JsonError, Value};
use tool_transcript::TranscriptError;

#[derive(Debug)]
pub enum ChatApiError {
    InvalidBaseUrl(String),
    Request(reqwest::Error),
    Status(StatusCode, String),
    Serde(JsonError),
    Io(std::io::Error),
    /// The service answered `success: false` or without data.
    LoadFailed(String),
    /// A stream is already in flight on this client.
    AlreadyStreaming,
    Cancelled,
    RetryExhausted {
        status: Option<StatusCode>,
        last_error: Option<String>,
    },
    Transcript(TranscriptError),
}

/// Error body shapes the service uses: `{ message }` or `{ error }`, the
/// latter either a string or `{ message }`.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

impl ErrorPayload {
    fn message(&self) -> Option<String> {
        if let Some(message) = self.message.as_deref().and_then(non_empty_string) {
            return Some(message.to_owned());
        }
        match self.error.as_ref()? {
            Value::String(message) => non_empty_string(message).map(str::to_owned),
            Value::Object(fields) => fields
                .get("message")
                .and_then(Value::as_str)
                .and_then(non_empty_string)
                .map(str::to_owned),
            _ => None,
        }
    }
}

impl fmt::Display for ChatApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBaseUrl(value) => write!(f, "invalid base URL: {value}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
            Self::Io(error) => write!(f, "I/O error: {error}"),
            Self::LoadFailed(message) => write!(f, "chat load failed: {message}"),
            Self::AlreadyStreaming => write!(f, "a chat stream is already in progress"),
            Self::Cancelled => write!(f, "request was cancelled"),
            Self::RetryExhausted { status, last_error } => {
                let status = status
                    .map(|status| status.as_u16().to_string())
                    .unwrap_or_else(|| "n/a".to_owned());
                write!(f, "retry exhausted after max attempts (status: {status}, last_error: {last_error:?})")
            }
            Self::Transcript(error) => write!(f, "transcript error: {error}"),
        }
    }
}

impl std::error::Error for ChatApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(error) => Some(error),
            Self::Serde(error) => Some(error),
            Self::Io(error) => Some(error),
            Self::Transcript(error) => Some(error),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ChatApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for ChatApiError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

impl From<std::io::Error> for ChatApiError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<TranscriptError> for ChatApiError {
    fn from(error: TranscriptError) -> Self {
        Self::Transcript(error)
    }
}

/// Human-readable message for a non-success response body.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        if let Some(message) = payload.message() {
            return message;
        }
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

fn non_empty_string(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
