//! Logging setup for hosts and demos.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the binary. [`init_logging`] is a ready-made one.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// How much to log, and how
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber is installed
    Silent,
    /// Compact `info` level lines on stderr
    Development,
    /// Verbose output with source locations, including every bus frame
    Debug,
}

/// Install a global subscriber for `mode`
///
/// `FUSION_LOG_LEVEL`, then `RUST_LOG`, override the mode's default level.
/// Fails if a global subscriber is already set.
pub fn init_logging(mode: LoggingMode) -> Result<(), TryInitError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => Registry::default()
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .with(env_filter("info"))
            .try_init(),
        LoggingMode::Debug => Registry::default()
            .with(
                fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(env_filter("debug"))
            .try_init(),
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    std::env::var("FUSION_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}
