//! Library half of the `chat-transcript` binary.
//!
//! Commands are plain functions over paths and clients so they can be driven
//! from tests without spawning the binary.

pub mod commands;
pub mod config;
pub mod logging;

pub use commands::{decode_file, read_rows, render, replay_file, stream_request, OutputFormat};
pub use config::LogConfig;
