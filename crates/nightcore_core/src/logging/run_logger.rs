//! Per-run logger with file, tracing and callback output.
//!
//! Each pipeline run gets its own logger that:
//! - Writes to a dedicated log file
//! - Mirrors every line to `tracing` for the console
//! - Sends lines to an optional callback
//! - Supports compact mode with progress filtering
//! - Keeps a tail buffer of external tool output for failure diagnosis

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogConfig, LogLevel, MessagePrefix};

/// Callback receiving every formatted line.
pub type LogCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Logger shared by every stage and unit of one pipeline run.
pub struct RunLogger {
    run_name: String,
    log_path: Option<PathBuf>,
    file_writer: Mutex<Option<BufWriter<File>>>,
    callback: Mutex<Option<LogCallback>>,
    config: LogConfig,
    tail_buffer: Mutex<VecDeque<String>>,
    last_progress: Mutex<u32>,
}

impl RunLogger {
    /// Create a logger writing to `<log_dir>/<run_name>_<timestamp>.log`.
    pub fn new(
        run_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
    ) -> std::io::Result<Self> {
        let run_name = run_name.into();
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("{}_{}.log", sanitize_filename(&run_name), timestamp));
        let file = File::create(&log_path)?;

        let mut logger = Self::console(run_name, config);
        logger.log_path = Some(log_path);
        logger.file_writer = Mutex::new(Some(BufWriter::new(file)));
        Ok(logger)
    }

    /// Create a logger without a log file (console and callback only).
    pub fn console(run_name: impl Into<String>, config: LogConfig) -> Self {
        let tail_capacity = config.error_tail;
        Self {
            run_name: run_name.into(),
            log_path: None,
            file_writer: Mutex::new(None),
            callback: Mutex::new(None),
            config,
            tail_buffer: Mutex::new(VecDeque::with_capacity(tail_capacity)),
            last_progress: Mutex::new(0),
        }
    }

    /// Attach a callback receiving every line.
    pub fn with_callback(self, callback: LogCallback) -> Self {
        *self.callback.lock() = Some(callback);
        self
    }

    /// Wrap in an `Arc` for sharing between concurrent units.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        mirror_to_tracing(level, message);
        if level < self.config.level {
            return;
        }
        self.output(&self.format_message(message));
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    /// Log an external command line.
    pub fn command(&self, command: &str) {
        self.log(LogLevel::Debug, &MessagePrefix::Command.format(command));
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    /// Log a progress update, filtered to step intervals in compact mode.
    ///
    /// Returns true if the progress was logged.
    pub fn progress(&self, label: &str, percent: u32) -> bool {
        if self.config.compact {
            let mut last = self.last_progress.lock();
            let step = self.config.progress_step.max(1);

            let current_step = (percent / step) * step;
            let last_step = (*last / step) * step;

            if current_step <= last_step && percent < 100 {
                return false;
            }
            *last = if percent >= 100 { 0 } else { percent };
        }

        self.info(&format!("{}: {}%", label, percent));
        true
    }

    /// Record a line of external tool output.
    ///
    /// In compact mode, lines only go to the tail buffer.
    pub fn output_line(&self, line: &str, is_stderr: bool) {
        {
            let mut buffer = self.tail_buffer.lock();
            if buffer.len() >= self.config.error_tail {
                buffer.pop_front();
            }
            buffer.push_back(line.to_string());
        }

        if self.config.compact {
            return;
        }

        let prefix = if is_stderr { "[stderr] " } else { "" };
        self.debug(&format!("{}{}", prefix, line));
    }

    /// Dump the tail buffer (typically after an error).
    pub fn show_tail(&self, header: &str) {
        let lines: Vec<String> = self.tail_buffer.lock().iter().cloned().collect();
        if lines.is_empty() {
            return;
        }

        self.log(LogLevel::Error, &format!("[{}/tail]", header));
        for line in &lines {
            self.log(LogLevel::Error, line);
        }
    }

    pub fn clear_tail(&self) {
        self.tail_buffer.lock().clear();
    }

    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    /// Flush the log file.
    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Close the log file.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    fn format_message(&self, message: &str) -> String {
        if self.config.show_timestamps {
            let timestamp = Local::now().format("%H:%M:%S");
            format!("[{}] {}", timestamp, message)
        } else {
            message.to_string()
        }
    }

    fn output(&self, formatted: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
        }

        if let Some(ref callback) = *self.callback.lock() {
            callback(formatted);
        }
    }
}

impl Drop for RunLogger {
    fn drop(&mut self) {
        self.close();
    }
}

fn mirror_to_tracing(level: LogLevel, message: &str) {
    match level {
        LogLevel::Trace => tracing::trace!(target: "nightcore", "{}", message),
        LogLevel::Debug => tracing::debug!(target: "nightcore", "{}", message),
        LogLevel::Info => tracing::info!(target: "nightcore", "{}", message),
        LogLevel::Warn => tracing::warn!(target: "nightcore", "{}", message),
        LogLevel::Error => tracing::error!(target: "nightcore", "{}", message),
    }
}

/// Sanitize a string to be safe for use as a filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

/// View of the run logger for one unit of work.
///
/// Prefixes every line with the unit tag. Progress lines are only emitted
/// by verbose units.
#[derive(Clone)]
pub struct UnitLogger {
    logger: Arc<RunLogger>,
    tag: String,
    verbose: bool,
}

impl UnitLogger {
    pub fn new(logger: Arc<RunLogger>, tag: impl Into<String>, verbose: bool) -> Self {
        Self {
            logger,
            tag: tag.into(),
            verbose,
        }
    }

    pub fn run_logger(&self) -> &Arc<RunLogger> {
        &self.logger
    }

    /// Informational step, only logged for verbose units.
    pub fn step(&self, message: &str) {
        if self.verbose {
            self.logger.info(&self.prefixed(message));
        } else {
            self.logger.debug(&self.prefixed(message));
        }
    }

    pub fn info(&self, message: &str) {
        self.logger.info(&self.prefixed(message));
    }

    pub fn warn(&self, message: &str) {
        self.logger.warn(&self.prefixed(message));
    }

    pub fn error(&self, message: &str) {
        self.logger.error(&self.prefixed(message));
    }

    pub fn success(&self, message: &str) {
        self.logger.success(&self.prefixed(message));
    }

    fn prefixed(&self, message: &str) -> String {
        format!("{}: {}", self.tag, message)
    }
}
