//! Config manager for loading, validating and saving settings.
//!
//! Key features:
//! - Atomic writes (write to temp file, then rename)
//! - Missing keys are filled with defaults and written back
//! - Unknown sections are dropped on load
//! - Paths are resolved against the configuration directory

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::DocumentMut;

use super::settings::{Settings, SECTION_NAMES};
use crate::models::AspectRatio;

/// Privacy statuses accepted by the video platform.
const PRIVACY_STATUSES: [&str; 3] = ["private", "unlisted", "public"];

/// Upload chunks must be multiples of this many KiB.
const CHUNK_GRANULARITY_KIB: u32 = 256;

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Failed to parse config for editing: {0}")]
    EditParseError(#[from] toml_edit::TomlError),

    #[error("Invalid setting {key}: {message}")]
    Invalid { key: String, message: String },
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Manages the settings file.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// File name of the settings file inside the configuration directory.
    pub const FILE_NAME: &'static str = "settings.toml";

    /// Create a manager for the given config file path.
    ///
    /// Settings stay at their defaults until `load_or_create()` runs.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    /// Create a manager for `<config_dir>/settings.toml`.
    pub fn in_dir(config_dir: impl AsRef<Path>) -> Self {
        Self::new(config_dir.as_ref().join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Directory relative paths are resolved against.
    pub fn config_dir(&self) -> PathBuf {
        self.config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Resolve a configured path against the configuration directory.
    pub fn resolve(&self, configured: &str) -> PathBuf {
        let path = PathBuf::from(configured);
        if path.is_absolute() {
            path
        } else {
            self.config_dir().join(path)
        }
    }

    pub fn logs_folder(&self) -> PathBuf {
        self.resolve(&self.settings.paths.logs_folder)
    }

    pub fn credentials_folder(&self) -> PathBuf {
        self.resolve(&self.settings.paths.credentials_folder)
    }

    pub fn client_secret_path(&self) -> PathBuf {
        self.credentials_folder()
            .join(&self.settings.paths.client_secret_file)
    }

    pub fn token_cache_path(&self) -> PathBuf {
        self.credentials_folder()
            .join(&self.settings.paths.token_cache_file)
    }

    /// Load config from file, creating it with defaults if it doesn't exist.
    ///
    /// Saves back when defaults were filled in or unknown sections dropped.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            let (settings, was_modified) = parse_and_clean(&content)?;
            validate(&settings)?;
            self.settings = settings;

            if was_modified {
                self.save()?;
            }
        } else {
            self.settings = Settings::default();
            self.save()?;
        }
        Ok(())
    }

    /// Save the entire config atomically.
    pub fn save(&self) -> ConfigResult<()> {
        let content = self.generate_config_with_comments()?;
        self.atomic_write(&content)?;
        Ok(())
    }

    fn generate_config_with_comments(&self) -> ConfigResult<String> {
        let sections: [(&str, &str, String); 5] = [
            (
                "Log and credential locations (relative to this file)",
                "paths",
                toml::to_string_pretty(&self.settings.paths)?,
            ),
            (
                "Logging configuration",
                "logging",
                toml::to_string_pretty(&self.settings.logging)?,
            ),
            (
                "Variant generation through the remote effect app",
                "generator",
                toml::to_string_pretty(&self.settings.generator)?,
            ),
            (
                "Video rendering with ffmpeg",
                "render",
                toml::to_string_pretty(&self.settings.render)?,
            ),
            (
                "Video platform uploads",
                "publish",
                toml::to_string_pretty(&self.settings.publish)?,
            ),
        ];

        let mut output = String::new();
        output.push_str("# Nightcore pipeline configuration\n");
        output.push_str("# Missing keys are filled with defaults on load.\n");

        for (comment, table, content) in sections {
            output.push('\n');
            output.push_str(&format!("# {}\n[{}]\n", comment, table));
            for line in content.lines() {
                output.push_str(line);
                output.push('\n');
            }
        }

        Ok(output)
    }

    fn atomic_write(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.config_path.with_extension("toml.tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.config_path)?;
        Ok(())
    }
}

/// Parse settings, reporting whether the file needs rewriting.
fn parse_and_clean(content: &str) -> ConfigResult<(Settings, bool)> {
    let doc: DocumentMut = content.parse()?;
    let settings: Settings = toml::from_str(content)?;

    let has_unknown = doc
        .iter()
        .any(|(key, _)| !SECTION_NAMES.contains(&key));

    // A table missing any key re-serializes larger than it was written
    let mut has_missing = false;
    for name in SECTION_NAMES {
        let expected = section_key_count(&settings, name)?;
        let present = doc
            .get(name)
            .and_then(|item| item.as_table_like())
            .map(|table| table.len())
            .unwrap_or(0);
        if present < expected {
            has_missing = true;
            break;
        }
    }

    Ok((settings, has_unknown || has_missing))
}

fn section_key_count(settings: &Settings, name: &str) -> ConfigResult<usize> {
    let value = toml::Value::try_from(settings)?;
    Ok(value
        .get(name)
        .and_then(|section| section.as_table())
        .map(|table| table.len())
        .unwrap_or(0))
}

/// Check values serde cannot constrain.
pub fn validate(settings: &Settings) -> ConfigResult<()> {
    if settings.logging.progress_step == 0 {
        return Err(ConfigError::invalid(
            "logging.progress_step",
            "must be greater than 0",
        ));
    }

    settings
        .render
        .default_ratio
        .parse::<AspectRatio>()
        .map_err(|e| ConfigError::invalid("render.default_ratio", e.to_string()))?;

    if !PRIVACY_STATUSES.contains(&settings.publish.privacy.as_str()) {
        return Err(ConfigError::invalid(
            "publish.privacy",
            format!("expected one of {}", PRIVACY_STATUSES.join(", ")),
        ));
    }

    let chunk = settings.publish.chunk_size_kib;
    if chunk == 0 || chunk % CHUNK_GRANULARITY_KIB != 0 {
        return Err(ConfigError::invalid(
            "publish.chunk_size_kib",
            format!("must be a positive multiple of {}", CHUNK_GRANULARITY_KIB),
        ));
    }

    if settings.publish.poll_interval_secs == 0 {
        return Err(ConfigError::invalid(
            "publish.poll_interval_secs",
            "must be greater than 0",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_or_create_creates_default() {
        let dir = tempdir().unwrap();
        let mut manager = ConfigManager::in_dir(dir.path().join("nightcore"));
        manager.load_or_create().unwrap();

        let content = fs::read_to_string(manager.path()).unwrap();
        for section in SECTION_NAMES {
            assert!(content.contains(&format!("[{}]", section)), "{section}");
        }
        assert_eq!(manager.settings(), &Settings::default());
    }

    #[test]
    fn load_or_create_preserves_existing_and_fills_missing() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");
        fs::write(&config_path, "[render]\ncrf = 23\n").unwrap();

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert_eq!(manager.settings().render.crf, 23);
        assert_eq!(manager.settings().render.ffmpeg_path, "ffmpeg");

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("crf = 23"));
        assert!(content.contains("ffmpeg_path"));
    }

    #[test]
    fn unknown_sections_are_dropped() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");
        fs::write(&config_path, "[legacy]\nkey = 1\n").unwrap();

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(!content.contains("[legacy]"));
    }

    #[test]
    fn saved_defaults_round_trip_unchanged() {
        let dir = tempdir().unwrap();
        let mut manager = ConfigManager::in_dir(dir.path());
        manager.load_or_create().unwrap();
        let first = fs::read_to_string(manager.path()).unwrap();

        let (_, modified) = parse_and_clean(&first).unwrap();
        assert!(!modified);
    }

    #[test]
    fn rejects_invalid_values() {
        let mut settings = Settings::default();
        settings.publish.chunk_size_kib = 300;
        assert!(matches!(validate(&settings), Err(ConfigError::Invalid { .. })));

        let mut settings = Settings::default();
        settings.publish.privacy = "secret".to_string();
        assert!(matches!(validate(&settings), Err(ConfigError::Invalid { .. })));

        let mut settings = Settings::default();
        settings.render.default_ratio = "4:3".to_string();
        assert!(matches!(validate(&settings), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn resolves_credentials_against_config_dir() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::in_dir(dir.path());

        assert_eq!(
            manager.token_cache_path(),
            dir.path().join("credentials").join("token.json")
        );

        let absolute = dir.path().join("elsewhere");
        assert_eq!(manager.resolve(&absolute.to_string_lossy()), absolute);
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let mut manager = ConfigManager::in_dir(dir.path());
        manager.load_or_create().unwrap();

        assert!(!manager.path().with_extension("toml.tmp").exists());
    }
}
