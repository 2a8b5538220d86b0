//! Logging infrastructure for the nightcore pipeline.
//!
//! This module provides:
//! - Per-run loggers with file + tracing + callback output
//! - Unit loggers tagging lines with their variant parameters
//! - Compact mode with progress filtering
//! - Tail buffer for external tool output
//!
//! # Example
//!
//! ```no_run
//! use nightcore_core::logging::{LogConfig, RunLogger};
//!
//! let logger = RunLogger::new("Artist - Song", "/path/to/logs", LogConfig::default()).unwrap();
//!
//! logger.command("ffmpeg -y -loglevel error ...");
//! logger.progress("Uploading", 40);
//! logger.success("All videos rendered");
//! ```

mod run_logger;
mod types;

pub use run_logger::{LogCallback, RunLogger, UnitLogger};
pub use types::{LogConfig, LogLevel, MessagePrefix};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// RUST_LOG takes precedence over `default_level`. Should be called once at
/// startup.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .with(filter)
        .init();
}

/// Initialize tracing for tests (only logs warnings and above).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_filters_are_lowercase() {
        assert_eq!(LogLevel::Debug.as_filter(), "debug");
        assert_eq!(LogLevel::Warn.as_filter(), "warn");
    }
}
