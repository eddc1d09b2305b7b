//! Subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Install the global `tracing` subscriber, writing to stderr so stdout stays
/// the transcript. `RUST_LOG` takes precedence over `config`.
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.directive))
        .unwrap_or_else(|_| EnvFilter::new(crate::config::DEFAULT_LOG_DIRECTIVE));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
