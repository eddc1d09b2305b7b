//! Transport client for the chat completion service.
//!
//! This crate owns request building and response driving only. Frames coming
//! back from the service are handed straight to
//! [`tool_transcript::LiveDecoder`]; persisted rows are replayed through
//! [`tool_transcript::reconstruct`]. Nothing here renders.
//!
//! Cancellation is cooperative: a shared [`CancellationSignal`] is polled
//! while chunks are awaited, and the server-side stop is a separate
//! [`ChatApiClient::abort`] call.

pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod request;
pub mod retry;
pub mod url;

pub use client::{CancellationSignal, ChatApiClient, LoadedChat};
pub use config::ChatApiConfig;
pub use error::ChatApiError;
pub use history::{ChatHistory, ChatMeta};
pub use request::{Attachment, ChatRequest};
pub use retry::RetryPolicy;
pub use url::Endpoints;
