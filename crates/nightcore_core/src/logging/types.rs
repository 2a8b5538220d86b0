//! Run log levels, configuration and line markers.

use serde::{Deserialize, Serialize};

/// Log level for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration for a run logger.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level written to the run log.
    pub level: LogLevel,
    /// Compact mode: filter progress lines, keep tool output in the tail only.
    pub compact: bool,
    /// Progress is only logged at multiples of this percentage.
    pub progress_step: u32,
    /// Number of tool output lines kept for failure diagnosis.
    pub error_tail: usize,
    /// Prefix lines in the log file with a timestamp.
    pub show_timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            compact: true,
            progress_step: 20,
            error_tail: 20,
            show_timestamps: true,
        }
    }
}

/// Marker put in front of a run log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagePrefix {
    /// External tool invocation, `$ ffmpeg ...`.
    Command,
    Success,
    Warning,
    Error,
}

impl MessagePrefix {
    fn marker(&self) -> &'static str {
        match self {
            MessagePrefix::Command => "$",
            MessagePrefix::Success => "[SUCCESS]",
            MessagePrefix::Warning => "[WARNING]",
            MessagePrefix::Error => "[ERROR]",
        }
    }

    pub fn format(&self, message: &str) -> String {
        format!("{} {}", self.marker(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_mark_lines() {
        assert_eq!(MessagePrefix::Command.format("ffmpeg -y"), "$ ffmpeg -y");
        assert_eq!(MessagePrefix::Warning.format("quota"), "[WARNING] quota");
    }

    #[test]
    fn levels_order_by_severity() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }
}
