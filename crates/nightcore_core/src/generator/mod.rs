//! Variant generator: one browser session per parameter pair.
//!
//! All sessions run concurrently on the current task and are joined before
//! the stage reports. A failing session never affects its siblings.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::browser::{BrowserError, BrowserLauncher, BrowserSession, SessionOptions, Sliders};
use crate::config::GeneratorSettings;
use crate::logging::{RunLogger, UnitLogger};
use crate::models::VariantParams;
use crate::workdir::{ArtifactKind, DirectoryError, WorkingDirectory, VARIANT_EXTENSION};

/// Selectors of the effect app's controls.
pub mod selectors {
    pub const FILE_INPUT: &str = r#"input[type="file"]"#;

    pub const PAUSE: &str = r"body > main > div.container.mx-auto.px-2.md\:px-5.mt-5.sm\:mt-20.md\:mt-36.text-center > div > div.relative > div.flex.gap-1.items-center.justify-center > button";

    pub const DOWNLOAD: &str = r"body > main > div.container.mx-auto.px-2.md\:px-5.mt-5.sm\:mt-20.md\:mt-36.text-center > div > div.mt-10.space-y-2.max-w-\[300px\].mx-auto > button:nth-child(1)";

    pub const VOLUME_SLIDER: &str = r#"div[role="slider"][aria-valuemin="-60"][aria-valuemax="0"]"#;

    pub const SPEED_SLIDER: &str = r#"div[role="slider"][aria-valuemin="0.5"][aria-valuemax="2"]"#;

    pub const REVERB_SLIDER: &str = r#"div[role="slider"][aria-valuemin="0.01"][aria-valuemax="10"]"#;
}

/// Steps pushed onto the volume slider; more than its full range.
pub const VOLUME_NUDGE_STEPS: i32 = 300;

pub const SPEED_GRANULARITY: f64 = 0.01;

pub const REVERB_GRANULARITY: f64 = 0.05;

/// Speed slider position for a speed percentage.
pub fn speed_target(speed: u32) -> f64 {
    speed as f64 / 100.0
}

/// Reverb slider position for a reverb intensity.
pub fn reverb_target(reverb: u32) -> f64 {
    reverb as f64 / 10.0 + 0.01
}

/// Errors that stop the generator before any session starts.
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("No speed/reverb pairs given")]
    NoParams,

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Generator timing and browser configuration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub effect_url: String,
    pub surface_timeout: Duration,
    pub control_timeout: Duration,
    pub export_timeout: Duration,
    pub download_timeout: Duration,
    pub session: SessionOptions,
}

impl GeneratorConfig {
    pub fn from_settings(settings: &GeneratorSettings, interactive: bool) -> Self {
        Self {
            effect_url: settings.effect_url.clone(),
            surface_timeout: Duration::from_secs(settings.surface_timeout_secs),
            control_timeout: Duration::from_secs(settings.control_timeout_secs),
            export_timeout: Duration::from_secs(settings.export_timeout_secs),
            download_timeout: Duration::from_secs(settings.download_timeout_secs),
            session: SessionOptions {
                headless: !interactive,
                args: settings.browser_args.clone(),
            },
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::from_settings(&GeneratorSettings::default(), false)
    }
}

/// Result of one session.
#[derive(Debug)]
pub struct VariantOutcome {
    pub params: VariantParams,
    pub result: Result<PathBuf, BrowserError>,
}

impl VariantOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Joined outcomes of a generator run, in parameter order.
#[derive(Debug)]
pub struct GenerateReport {
    pub cleared: Vec<String>,
    pub outcomes: Vec<VariantOutcome>,
}

impl GenerateReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(VariantOutcome::is_success)
    }

    pub fn produced(&self) -> Vec<PathBuf> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().cloned())
            .collect()
    }

    pub fn failed(&self) -> Vec<VariantParams> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.params)
            .collect()
    }
}

/// Serializable summary for the run state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateOutput {
    pub produced: Vec<PathBuf>,
    pub failed: Vec<VariantParams>,
}

impl From<&GenerateReport> for GenerateOutput {
    fn from(report: &GenerateReport) -> Self {
        Self {
            produced: report.produced(),
            failed: report.failed(),
        }
    }
}

/// Drives the remote effect app to produce audio variants.
pub struct VariantGenerator {
    launcher: Arc<dyn BrowserLauncher>,
    config: GeneratorConfig,
}

impl VariantGenerator {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, config: GeneratorConfig) -> Self {
        Self { launcher, config }
    }

    /// Clear old variants, then produce one variant per pair.
    ///
    /// Only setup problems are errors; per-pair failures are reported in
    /// the outcomes.
    pub async fn generate(
        &self,
        workdir: &WorkingDirectory,
        params: &[VariantParams],
        logger: Arc<RunLogger>,
    ) -> Result<GenerateReport, GeneratorError> {
        if params.is_empty() {
            return Err(GeneratorError::NoParams);
        }
        let track = workdir.track()?;

        let cleared = workdir.clear(ArtifactKind::Variant)?;
        if !cleared.is_empty() {
            logger.info(&format!("Cleared files: {}", cleared.join(", ")));
        }

        logger.info(&format!("Creating {} nightcore versions concurrently", params.len()));
        let units = params.iter().enumerate().map(|(index, params)| {
            let unit = UnitLogger::new(logger.clone(), params.log_tag(), index == 0);
            self.produce(workdir, &track, *params, unit)
        });
        let outcomes = join_all(units).await;

        Ok(GenerateReport { cleared, outcomes })
    }

    /// Run one session start to finish. The session is always closed.
    async fn produce(
        &self,
        workdir: &WorkingDirectory,
        track: &Path,
        params: VariantParams,
        unit: UnitLogger,
    ) -> VariantOutcome {
        let result = match self.launcher.open(&self.config.session).await {
            Ok(mut session) => {
                let result = self.drive(session.as_mut(), workdir, track, params, &unit).await;
                if let Err(e) = session.close().await {
                    unit.warn(&format!("Failed to close browser session: {}", e));
                }
                result
            }
            Err(e) => Err(e),
        };

        if let Err(ref e) = result {
            unit.error(&failure_message(e));
        }
        VariantOutcome { params, result }
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        workdir: &WorkingDirectory,
        track: &Path,
        params: VariantParams,
        unit: &UnitLogger,
    ) -> Result<PathBuf, BrowserError> {
        let config = &self.config;

        unit.step("Uploading source track");
        session.navigate(&config.effect_url).await?;
        session.submit_file(selectors::FILE_INPUT, track).await?;
        let pause = session
            .wait_for(selectors::PAUSE, config.surface_timeout)
            .await?;
        session.click(&pause).await?;

        unit.step("Setting up nightcore parameters");
        {
            let mut sliders = Sliders::new(session, config.control_timeout);
            sliders
                .nudge(selectors::VOLUME_SLIDER, VOLUME_NUDGE_STEPS)
                .await?;
            sliders
                .set_value(
                    selectors::SPEED_SLIDER,
                    speed_target(params.speed),
                    SPEED_GRANULARITY,
                )
                .await?;
            sliders
                .set_value(
                    selectors::REVERB_SLIDER,
                    reverb_target(params.reverb),
                    REVERB_GRANULARITY,
                )
                .await?;
        }

        unit.step("Downloading nightcore");
        let export = session
            .wait_for(selectors::DOWNLOAD, config.export_timeout)
            .await?;
        session.click(&export).await?;
        let download = session.wait_for_download(config.download_timeout).await?;

        let destination = workdir.artifact_path(params, VARIANT_EXTENSION);
        session.save(download, &destination).await?;

        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        unit.info(&format!("Nightcore saved as: {}", name));
        Ok(destination)
    }
}

/// Log line for a failed variant; timeouts hint at the effect app.
fn failure_message(error: &BrowserError) -> String {
    if error.is_timeout() {
        format!("{} (the effect app did not respond; rerun with -g to watch it)", error)
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_get_an_effect_app_hint() {
        let timeout = BrowserError::ElementTimeout {
            selector: "#pause".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert!(failure_message(&timeout).starts_with("Timed out after 5s waiting for `#pause`"));
        assert!(failure_message(&timeout).contains("rerun with -g"));
        assert!(failure_message(&BrowserError::DownloadTimeout(Duration::from_secs(60)))
            .contains("effect app did not respond"));

        let network = BrowserError::Network("connection refused".to_string());
        assert_eq!(failure_message(&network), "Network error: connection refused");
    }

    #[test]
    fn slider_targets_match_app_scale() {
        assert_eq!(speed_target(150), 1.5);
        assert!((reverb_target(0) - 0.01).abs() < 1e-12);
        assert!((reverb_target(25) - 2.51).abs() < 1e-12);
    }

    #[test]
    fn interactive_mode_shows_the_browser() {
        let settings = GeneratorSettings::default();
        assert!(GeneratorConfig::from_settings(&settings, false).session.headless);
        assert!(!GeneratorConfig::from_settings(&settings, true).session.headless);
        assert_eq!(
            GeneratorConfig::default().download_timeout,
            Duration::from_secs(60)
        );
    }
}
