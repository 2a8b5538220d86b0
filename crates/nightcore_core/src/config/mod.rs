//! Configuration management.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Validation on load with automatic defaults
//!
//! # Example
//!
//! ```no_run
//! use nightcore_core::config::ConfigManager;
//!
//! let mut config = ConfigManager::in_dir(".config/nightcore");
//! config.load_or_create().unwrap();
//!
//! println!("Effect app: {}", config.settings().generator.effect_url);
//! println!("Token cache: {}", config.token_cache_path().display());
//! ```

mod manager;
mod settings;

pub use manager::{validate, ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    GeneratorSettings, LoggingSettings, PathSettings, PublishSettings, RenderSettings, Settings,
    SECTION_NAMES,
};
