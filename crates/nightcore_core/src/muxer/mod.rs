//! Video muxer: every variant plus the cover into a video.
//!
//! Jobs run on a dedicated rayon pool sized to
//! `min(available parallelism, variant count)`. A failing job is recorded
//! and never stops its siblings.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encode::{Canvas, EncodeError, EncodeJob, Encoder};
use crate::logging::{RunLogger, UnitLogger};
use crate::models::{AspectRatio, Preset, VariantParams};
use crate::workdir::{
    decode_name, ArtifactKind, DirectoryError, NamingError, WorkingDirectory, RENDERED_EXTENSION,
};

/// Errors that stop the muxer before any job starts.
#[derive(Error, Debug)]
pub enum MuxError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error("Cover art unusable: {0}")]
    Cover(#[source] EncodeError),

    #[error("Failed to build worker pool: {0}")]
    Pool(String),

    #[error("Render workers panicked: {0}")]
    Join(String),
}

/// Result of one encode job.
#[derive(Debug)]
pub struct RenderOutcome {
    pub params: VariantParams,
    pub output: PathBuf,
    pub result: Result<(), EncodeError>,
}

impl RenderOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Joined outcomes of a render run.
#[derive(Debug)]
pub struct RenderReport {
    pub cleared: Vec<String>,
    pub canvas: Canvas,
    pub workers: usize,
    pub outcomes: Vec<RenderOutcome>,
}

impl RenderReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(RenderOutcome::is_success)
    }

    pub fn rendered(&self) -> Vec<PathBuf> {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.output.clone())
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
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderOutput {
    pub canvas: String,
    pub workers: usize,
    pub rendered: Vec<PathBuf>,
    pub failed: Vec<VariantParams>,
}

impl From<&RenderReport> for RenderOutput {
    fn from(report: &RenderReport) -> Self {
        Self {
            canvas: report.canvas.to_string(),
            workers: report.workers,
            rendered: report.rendered(),
            failed: report.failed(),
        }
    }
}

/// Number of encode workers for `jobs` jobs.
pub fn worker_count(jobs: usize) -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    available.min(jobs).max(1)
}

/// Renders variants into videos through an [`Encoder`].
pub struct VideoMuxer {
    encoder: Arc<dyn Encoder>,
}

impl VideoMuxer {
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        Self { encoder }
    }

    /// Clear old videos, then render one video per variant.
    pub async fn render(
        &self,
        workdir: &WorkingDirectory,
        ratio: AspectRatio,
        preset: Preset,
        logger: Arc<RunLogger>,
    ) -> Result<RenderReport, MuxError> {
        // One listing at entry; later writes never change the job set
        let variants = workdir.list(ArtifactKind::Variant, true)?;
        let cover = workdir.cover()?;
        let canvas = Canvas::from_image(&cover, ratio).map_err(MuxError::Cover)?;
        let jobs = build_jobs(&variants, &cover, canvas, preset)?;

        let cleared = workdir.clear(ArtifactKind::Rendered)?;
        if !cleared.is_empty() {
            logger.info(&format!("Cleared files: {}", cleared.join(", ")));
        }

        let workers = worker_count(jobs.len());
        logger.info(&format!(
            "Creating {} videos concurrently ({} workers, {} canvas)",
            jobs.len(),
            workers,
            canvas
        ));

        let encoder = Arc::clone(&self.encoder);
        let pool_logger = Arc::clone(&logger);
        let outcomes =
            tokio::task::spawn_blocking(move || run_pool(encoder, jobs, workers, pool_logger))
                .await
                .map_err(|e| MuxError::Join(e.to_string()))??;

        // Tails are dumped after the join so concurrent jobs never interleave
        for outcome in &outcomes {
            if let Err(EncodeError::CommandFailed { stderr, .. }) = &outcome.result {
                logger.clear_tail();
                for line in stderr {
                    logger.output_line(line, true);
                }
                logger.show_tail(outcome.params.log_tag().trim());
            }
        }

        Ok(RenderReport {
            cleared,
            canvas,
            workers,
            outcomes,
        })
    }
}

fn build_jobs(
    variants: &[PathBuf],
    cover: &Path,
    canvas: Canvas,
    preset: Preset,
) -> Result<Vec<(VariantParams, EncodeJob)>, MuxError> {
    variants
        .iter()
        .map(|audio| {
            let params = decode_name(audio)?;
            let job = EncodeJob {
                audio: audio.clone(),
                cover: cover.to_path_buf(),
                output: audio.with_extension(RENDERED_EXTENSION),
                canvas,
                preset,
            };
            Ok((params, job))
        })
        .collect()
}

fn run_pool(
    encoder: Arc<dyn Encoder>,
    jobs: Vec<(VariantParams, EncodeJob)>,
    workers: usize,
    logger: Arc<RunLogger>,
) -> Result<Vec<RenderOutcome>, MuxError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("nightcore-render-{}", i))
        .build()
        .map_err(|e| MuxError::Pool(e.to_string()))?;

    Ok(pool.install(|| {
        jobs.into_par_iter()
            .map(|(params, job)| {
                let unit = UnitLogger::new(Arc::clone(&logger), params.log_tag(), false);
                render_one(encoder.as_ref(), params, job, &unit)
            })
            .collect()
    }))
}

fn render_one(
    encoder: &dyn Encoder,
    params: VariantParams,
    job: EncodeJob,
    unit: &UnitLogger,
) -> RenderOutcome {
    unit.run_logger().command(&encoder.describe(&job));

    let result = encoder.encode(&job);
    match &result {
        Ok(()) => {
            let name = job
                .output
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            unit.info(&format!("Video saved as: {}", name));
        }
        Err(e) => unit.error(&e.to_string()),
    }

    RenderOutcome {
        params,
        output: job.output,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogConfig;
    use std::fs;
    use tempfile::tempdir;

    /// Writes the output unless the audio name is listed as failing.
    struct StubEncoder {
        failing: Vec<&'static str>,
    }

    impl Encoder for StubEncoder {
        fn name(&self) -> &str {
            "stub"
        }

        fn describe(&self, job: &EncodeJob) -> String {
            format!("stub {}", job.audio.display())
        }

        fn encode(&self, job: &EncodeJob) -> Result<(), EncodeError> {
            let name = job.audio.file_name().unwrap().to_string_lossy().to_string();
            if self.failing.contains(&name.as_str()) {
                return Err(EncodeError::CommandFailed {
                    tool: "stub".to_string(),
                    exit_code: 1,
                    stderr: vec!["Invalid data found when processing input".to_string()],
                });
            }
            fs::write(&job.output, b"video").unwrap();
            Ok(())
        }
    }

    fn workdir_with(names: &[&str]) -> (tempfile::TempDir, WorkingDirectory) {
        let dir = tempdir().unwrap();
        image::RgbImage::new(16, 9)
            .save(dir.path().join("2024_2_w.png"))
            .unwrap();
        for name in names {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let wd = WorkingDirectory::open(dir.path()).unwrap();
        (dir, wd)
    }

    fn logger() -> Arc<RunLogger> {
        RunLogger::console("test", LogConfig::default()).shared()
    }

    fn recording_logger() -> (Arc<RunLogger>, Arc<parking_lot::Mutex<Vec<String>>>) {
        let lines = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let config = LogConfig {
            show_timestamps: false,
            ..LogConfig::default()
        };
        let logger = RunLogger::console("test", config)
            .with_callback(Box::new(move |line| sink.lock().push(line.to_string())))
            .shared();
        (logger, lines)
    }

    #[test]
    fn worker_count_is_bounded_by_jobs() {
        assert_eq!(worker_count(1), 1);
        assert!(worker_count(1000) <= 1000);
        assert_eq!(worker_count(0), 1);
    }

    #[tokio::test]
    async fn failing_job_keeps_sibling_outputs() {
        let (dir, wd) = workdir_with(&["80_0.mp3", "120_5.mp3", "150_0.mp3"]);
        let muxer = VideoMuxer::new(Arc::new(StubEncoder {
            failing: vec!["120_5.mp3"],
        }));

        let report = muxer
            .render(&wd, AspectRatio::default(), Preset::UltraFast, logger())
            .await
            .unwrap();

        assert!(!report.all_succeeded());
        assert_eq!(report.failed(), vec![VariantParams::new(120, 5).unwrap()]);
        assert!(dir.path().join("80_0.mp4").exists());
        assert!(dir.path().join("150_0.mp4").exists());
        assert!(!dir.path().join("120_5.mp4").exists());
    }

    #[tokio::test]
    async fn clears_stale_videos_before_rendering() {
        let (dir, wd) = workdir_with(&["80_0.mp3", "90_0.mp4"]);
        let muxer = VideoMuxer::new(Arc::new(StubEncoder { failing: vec![] }));

        let report = muxer
            .render(&wd, AspectRatio::default(), Preset::UltraFast, logger())
            .await
            .unwrap();

        assert_eq!(report.cleared, vec!["90_0.mp4".to_string()]);
        assert!(!dir.path().join("90_0.mp4").exists());
        assert_eq!(report.canvas, Canvas { width: 16, height: 10 });
        assert!(report.all_succeeded());
    }

    #[tokio::test]
    async fn missing_variants_fail_before_clearing() {
        let (dir, wd) = workdir_with(&["90_0.mp4"]);
        let muxer = VideoMuxer::new(Arc::new(StubEncoder { failing: vec![] }));

        let result = muxer
            .render(&wd, AspectRatio::default(), Preset::UltraFast, logger())
            .await;

        assert!(matches!(
            result,
            Err(MuxError::Directory(DirectoryError::NotFound { .. }))
        ));
        assert!(dir.path().join("90_0.mp4").exists());
    }

    #[tokio::test]
    async fn failing_job_dumps_encoder_tail() {
        let (_dir, wd) = workdir_with(&["80_0.mp3", "120_5.mp3"]);
        let muxer = VideoMuxer::new(Arc::new(StubEncoder {
            failing: vec!["120_5.mp3"],
        }));
        let (logger, lines) = recording_logger();

        muxer
            .render(&wd, AspectRatio::default(), Preset::UltraFast, logger)
            .await
            .unwrap();

        let lines = lines.lock();
        let header = lines
            .iter()
            .position(|l| l == "[120x5/tail]")
            .expect("tail header logged");
        assert_eq!(lines[header + 1], "Invalid data found when processing input");
    }
}
