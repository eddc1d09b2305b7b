//! Environment configuration.

use std::env;

pub const LOG_ENV: &str = "CHAT_TRANSCRIPT_LOG";
/// Filter used when neither `RUST_LOG` nor `CHAT_TRANSCRIPT_LOG` is set.
pub const DEFAULT_LOG_DIRECTIVE: &str = "warn,transcript_cli=info";
const VERBOSE_LOG_DIRECTIVE: &str = "info,tool_transcript=debug,chat_api=debug,transcript_cli=debug";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub directive: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directive: DEFAULT_LOG_DIRECTIVE.to_owned(),
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        env_string_opt(LOG_ENV)
            .map(|directive| Self { directive })
            .unwrap_or_default()
    }

    /// `--verbose` wins over the environment.
    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.directive = VERBOSE_LOG_DIRECTIVE.to_owned();
        }
        self
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
