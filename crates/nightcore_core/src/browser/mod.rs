//! Browser automation for the remote effect app.

mod session;
pub mod slider;
mod webdriver;

pub use session::{
    BrowserError, BrowserLauncher, BrowserResult, BrowserSession, Download, ElementHandle, Key,
    SessionOptions,
};
pub use slider::{step_count, Sliders};
pub use webdriver::{WebDriverLauncher, WebDriverSession};
