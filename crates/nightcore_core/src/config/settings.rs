//! Settings struct with TOML-based sections.
//!
//! Every field carries a serde default so a partial file loads cleanly.

use serde::{Deserialize, Serialize};

use crate::logging::{LogConfig, LogLevel};
use crate::models::Preset;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub generator: GeneratorSettings,

    #[serde(default)]
    pub render: RenderSettings,

    #[serde(default)]
    pub publish: PublishSettings,
}

/// Names of the TOML tables, in file order.
pub const SECTION_NAMES: [&str; 5] = ["paths", "logging", "generator", "render", "publish"];

/// Locations of logs and platform credentials.
///
/// Relative paths are resolved against the configuration directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Folder for per-run log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,

    /// Folder holding the OAuth client secret and the token cache.
    #[serde(default = "default_credentials_folder")]
    pub credentials_folder: String,

    /// OAuth client secret file (installed-app JSON), inside the credentials folder.
    #[serde(default = "default_client_secret_file")]
    pub client_secret_file: String,

    /// Cached OAuth token, inside the credentials folder.
    #[serde(default = "default_token_cache_file")]
    pub token_cache_file: String,
}

fn default_logs_folder() -> String {
    "logs".to_string()
}

fn default_credentials_folder() -> String {
    "credentials".to_string()
}

fn default_client_secret_file() -> String {
    "client_secret.json".to_string()
}

fn default_token_cache_file() -> String {
    "token.json".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            logs_folder: default_logs_folder(),
            credentials_folder: default_credentials_folder(),
            client_secret_file: default_client_secret_file(),
            token_cache_file: default_token_cache_file(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Console level when RUST_LOG is unset, also the run log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Use compact log format.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Number of external tool output lines kept for failures.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,
}

fn default_true() -> bool {
    true
}

fn default_progress_step() -> u32 {
    20
}

fn default_error_tail() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            compact: true,
            progress_step: default_progress_step(),
            error_tail: default_error_tail(),
        }
    }
}

impl LoggingSettings {
    /// Run logger configuration derived from these settings.
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            compact: self.compact,
            progress_step: self.progress_step,
            error_tail: self.error_tail as usize,
            show_timestamps: true,
        }
    }
}

/// Variant generator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSettings {
    /// Remote effect application.
    #[serde(default = "default_effect_url")]
    pub effect_url: String,

    /// WebDriver server endpoint (geckodriver, chromedriver).
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Browser requested from the WebDriver server.
    #[serde(default = "default_browser")]
    pub browser: String,

    /// Seconds to wait for the effect surface to become interactive.
    #[serde(default = "default_surface_timeout")]
    pub surface_timeout_secs: u64,

    /// Seconds to wait for each slider control.
    #[serde(default = "default_control_timeout")]
    pub control_timeout_secs: u64,

    /// Seconds to wait for the export button.
    #[serde(default = "default_export_timeout")]
    pub export_timeout_secs: u64,

    /// Seconds to wait for the exported file to download.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Extra browser arguments (e.g. a user profile).
    #[serde(default)]
    pub browser_args: Vec<String>,
}

fn default_effect_url() -> String {
    "https://nightcore.studio/".to_string()
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_browser() -> String {
    "firefox".to_string()
}

fn default_surface_timeout() -> u64 {
    5
}

fn default_control_timeout() -> u64 {
    3
}

fn default_export_timeout() -> u64 {
    1
}

fn default_download_timeout() -> u64 {
    60
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            effect_url: default_effect_url(),
            webdriver_url: default_webdriver_url(),
            browser: default_browser(),
            surface_timeout_secs: default_surface_timeout(),
            control_timeout_secs: default_control_timeout(),
            export_timeout_secs: default_export_timeout(),
            download_timeout_secs: default_download_timeout(),
            browser_args: Vec::new(),
        }
    }
}

/// Render stage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// ffmpeg executable.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// Video codec passed to `-c:v`.
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Constant rate factor.
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Preset used when `--preset` is not given.
    #[serde(default)]
    pub default_preset: Preset,

    /// Output ratio used when `--ratio` is not given.
    #[serde(default = "default_ratio")]
    pub default_ratio: String,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_crf() -> u8 {
    18
}

fn default_ratio() -> String {
    "16:9".to_string()
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            video_codec: default_video_codec(),
            crf: default_crf(),
            default_preset: Preset::default(),
            default_ratio: default_ratio(),
        }
    }
}

/// Publish stage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishSettings {
    /// Privacy status of uploaded videos (`private`, `unlisted`, `public`).
    #[serde(default = "default_privacy")]
    pub privacy: String,

    /// Platform category id (10 = Music).
    #[serde(default = "default_category_id")]
    pub category_id: String,

    /// Seconds between processing status polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Upload chunk size in KiB, a multiple of 256.
    #[serde(default = "default_chunk_size_kib")]
    pub chunk_size_kib: u32,

    /// Characters separating artists in the track name.
    #[serde(default = "default_artist_separators")]
    pub artist_separators: String,

    /// Declare uploads as made for kids.
    #[serde(default)]
    pub made_for_kids: bool,
}

fn default_privacy() -> String {
    "unlisted".to_string()
}

fn default_category_id() -> String {
    "10".to_string()
}

fn default_poll_interval() -> u64 {
    1
}

fn default_chunk_size_kib() -> u32 {
    8 * 1024
}

fn default_artist_separators() -> String {
    ",&".to_string()
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            privacy: default_privacy(),
            category_id: default_category_id(),
            poll_interval_secs: default_poll_interval(),
            chunk_size_kib: default_chunk_size_kib(),
            artist_separators: default_artist_separators(),
            made_for_kids: false,
        }
    }
}

impl PublishSettings {
    pub fn chunk_size_bytes(&self) -> usize {
        self.chunk_size_kib as usize * 1024
    }
}
