//! Browser session capability.
//!
//! The generator drives the remote effect app through these traits only.
//! Concrete sessions come from a [`BrowserLauncher`].

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a browser session.
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to start browser session: {0}")]
    Launch(String),

    #[error("Timed out after {}s waiting for `{selector}`", .timeout.as_secs_f64())]
    ElementTimeout { selector: String, timeout: Duration },

    #[error("No download finished within {}s", .0.as_secs_f64())]
    DownloadTimeout(Duration),

    #[error("Attribute `{name}` of `{selector}` is unusable: {message}")]
    Attribute {
        selector: String,
        name: String,
        message: String,
    },

    #[error("WebDriver error {status} ({error}): {message}")]
    Protocol {
        status: u16,
        error: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl BrowserError {
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Whether this is one of the bounded waits running out.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            BrowserError::ElementTimeout { .. } | BrowserError::DownloadTimeout(_)
        )
    }
}

pub type BrowserResult<T> = Result<T, BrowserError>;

/// Options for opening a session.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Run without a visible window.
    pub headless: bool,
    /// Extra browser command-line arguments.
    pub args: Vec<String>,
}

/// Opaque reference to an element located in a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    id: String,
    selector: String,
}

impl ElementHandle {
    pub fn new(id: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            selector: selector.into(),
        }
    }

    /// Session-specific element reference.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Selector the element was located with.
    pub fn selector(&self) -> &str {
        &self.selector
    }
}

/// Keys the session can press on an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
}

impl Key {
    /// Code point of the key in the WebDriver key table.
    pub fn webdriver_code(&self) -> char {
        match self {
            Key::ArrowLeft => '\u{E012}',
            Key::ArrowRight => '\u{E014}',
        }
    }
}

/// A finished download inside the session's download area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub path: PathBuf,
    /// File name chosen by the page.
    pub suggested_name: String,
}

/// One independent browser session.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()>;

    /// Submit a local file to a file input.
    async fn submit_file(&mut self, selector: &str, path: &Path) -> BrowserResult<()>;

    /// Wait until an element matching `selector` exists.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> BrowserResult<ElementHandle>;

    async fn click(&mut self, element: &ElementHandle) -> BrowserResult<()>;

    /// Press `key` on `element`, `times` times in a row.
    async fn press_key(&mut self, element: &ElementHandle, key: Key, times: u32)
        -> BrowserResult<()>;

    async fn read_attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> BrowserResult<Option<String>>;

    /// Wait for the next download to finish.
    async fn wait_for_download(&mut self, timeout: Duration) -> BrowserResult<Download>;

    /// Move a finished download to `destination`.
    async fn save(&mut self, download: Download, destination: &Path) -> BrowserResult<()>;

    /// End the session. Safe to call more than once.
    async fn close(&mut self) -> BrowserResult<()>;
}

/// Factory for independent sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open(&self, options: &SessionOptions) -> BrowserResult<Box<dyn BrowserSession>>;
}
