//! Publisher: uploads rendered videos in release order.
//!
//! Uploads are strictly sequential. Each video's processing must finish
//! before the next upload starts. Running out of quota stops the queue
//! without failing the stage; a processing failure fails it.

mod release;

pub use release::{
    release_order, speed_labels, ReleaseEntry, SpeedFamily, TrackName, SLOWED_LABELS,
    SPED_UP_LABELS,
};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PublishSettings;
use crate::logging::RunLogger;
use crate::models::{Metadata, PublishLimit, SelectionError, VariantParams};
use crate::upload::{
    PlatformConnector, ProcessingStatus, UploadError, VideoMetadata, VideoPlatform,
};
use crate::workdir::{ArtifactKind, DirectoryError, NamingError, WorkingDirectory};

/// Errors that stop the publisher.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Unexpected amount of {family} versions: {count} (at most {max} supported)")]
    LabelTable {
        family: SpeedFamily,
        count: usize,
        max: usize,
    },

    #[error("Track name '{0}' doesn't follow the `artist - title` convention")]
    MalformedTrackName(String),

    #[error("Invalid uploaded video count: {0}")]
    Limit(#[from] SelectionError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Processing failed for '{title}' ({video_id}): {status}")]
    ProcessingFailed {
        title: String,
        video_id: String,
        status: String,
    },
}

pub type PublishResult<T> = Result<T, PublishError>;

/// Upload settings for a publish run.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub privacy: String,
    pub category_id: String,
    pub made_for_kids: bool,
    pub artist_separators: String,
    pub poll_interval: Duration,
}

impl PublishConfig {
    pub fn from_settings(settings: &PublishSettings) -> Self {
        Self {
            privacy: settings.privacy.clone(),
            category_id: settings.category_id.clone(),
            made_for_kids: settings.made_for_kids,
            artist_separators: settings.artist_separators.clone(),
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
        }
    }
}

/// One video that was uploaded and processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedVideo {
    pub params: VariantParams,
    pub label: String,
    pub title: String,
    pub video_id: String,
}

/// What a publish run did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishOutput {
    pub planned: usize,
    pub published: Vec<PublishedVideo>,
    /// Quota reason if the queue was cut short.
    pub stopped_by_quota: Option<String>,
}

/// Uploads videos through a lazily connected platform.
pub struct Publisher {
    connector: Arc<dyn PlatformConnector>,
    config: PublishConfig,
}

impl Publisher {
    pub fn new(connector: Arc<dyn PlatformConnector>, config: PublishConfig) -> Self {
        Self { connector, config }
    }

    /// Release order of the rendered videos, cut down by `limit`.
    pub fn plan(
        &self,
        workdir: &WorkingDirectory,
        limit: Option<PublishLimit>,
    ) -> PublishResult<Vec<ReleaseEntry>> {
        let videos = workdir.list(ArtifactKind::Rendered, true)?;
        let order = release_order(&videos)?;
        match limit {
            Some(limit) => Ok(limit.apply(order)?),
            None => Ok(order),
        }
    }

    /// Upload the planned videos one by one.
    pub async fn publish(
        &self,
        workdir: &WorkingDirectory,
        limit: Option<PublishLimit>,
        logger: Arc<RunLogger>,
    ) -> PublishResult<PublishOutput> {
        let entries = self.plan(workdir, limit)?;
        let track = TrackName::parse(&workdir.track_stem()?)?;
        let metadata = workdir.metadata()?;
        let label_width = entries.iter().map(|e| e.label.len()).max().unwrap_or(0);

        let mut output = PublishOutput {
            planned: entries.len(),
            ..PublishOutput::default()
        };

        let platform = self.connector.connect(&logger).await?;

        for entry in &entries {
            let upload = self.video_metadata(&track, entry, &metadata);
            let quoted = format!("'{}'", entry.label);
            let tags: Vec<String> = upload.tags.iter().map(|t| format!("#{}", t)).collect();
            logger.info(&format!(
                "Uploading: {:<width$} {}",
                quoted,
                tags.join(" "),
                width = label_width + 2
            ));

            let video_id = match self
                .upload_one(platform.as_ref(), &entry.video, &upload, &logger)
                .await
            {
                Ok(id) => id,
                Err(UploadError::QuotaExceeded { reason }) => {
                    logger.warn("Daily upload limit exceeded. Cancelling uploads");
                    output.stopped_by_quota = Some(reason);
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            self.wait_for_processing(platform.as_ref(), &video_id, &upload.title, &logger)
                .await?;

            logger.success(&format!("Published '{}' ({})", upload.title, video_id));
            output.published.push(PublishedVideo {
                params: entry.params,
                label: entry.label.clone(),
                title: upload.title,
                video_id,
            });
        }

        Ok(output)
    }

    fn video_metadata(
        &self,
        track: &TrackName,
        entry: &ReleaseEntry,
        metadata: &Metadata,
    ) -> VideoMetadata {
        VideoMetadata {
            title: track.release_title(&entry.label),
            description: metadata.describe(),
            tags: track.hashtags(&self.config.artist_separators, entry.family),
            category_id: self.config.category_id.clone(),
            privacy: self.config.privacy.clone(),
            made_for_kids: self.config.made_for_kids,
        }
    }

    async fn upload_one(
        &self,
        platform: &dyn VideoPlatform,
        video: &Path,
        metadata: &VideoMetadata,
        logger: &Arc<RunLogger>,
    ) -> Result<String, UploadError> {
        let progress_logger = Arc::clone(logger);
        let progress = move |sent: u64, total: u64| {
            let percent = if total == 0 { 100 } else { (sent * 100 / total) as u32 };
            progress_logger.progress("Uploading", percent);
        };
        platform.upload(video, metadata, &progress).await
    }

    async fn wait_for_processing(
        &self,
        platform: &dyn VideoPlatform,
        video_id: &str,
        title: &str,
        logger: &RunLogger,
    ) -> PublishResult<()> {
        loop {
            match platform.processing_status(video_id).await? {
                ProcessingStatus::Succeeded => return Ok(()),
                ProcessingStatus::Failed(status) => {
                    logger.error("Processing failed");
                    return Err(PublishError::ProcessingFailed {
                        title: title.to_string(),
                        video_id: video_id.to_string(),
                        status,
                    });
                }
                ProcessingStatus::Processing => {
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogConfig;
    use crate::upload::{ProgressFn, UploadResult};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::fs;
    use tempfile::tempdir;

    /// Records uploads; optionally runs out of quota or fails processing.
    #[derive(Default)]
    struct FakePlatform {
        quota_after: Option<usize>,
        fail_processing: bool,
        uploads: Mutex<Vec<VideoMetadata>>,
    }

    #[async_trait]
    impl VideoPlatform for FakePlatform {
        async fn upload(
            &self,
            _video: &Path,
            metadata: &VideoMetadata,
            progress: ProgressFn<'_>,
        ) -> UploadResult<String> {
            let mut uploads = self.uploads.lock();
            if self.quota_after == Some(uploads.len()) {
                return Err(UploadError::QuotaExceeded {
                    reason: "uploadLimitExceeded".to_string(),
                });
            }
            progress(10, 10);
            uploads.push(metadata.clone());
            Ok(format!("vid{}", uploads.len()))
        }

        async fn processing_status(&self, _video_id: &str) -> UploadResult<ProcessingStatus> {
            if self.fail_processing {
                Ok(ProcessingStatus::Failed("failed".to_string()))
            } else {
                Ok(ProcessingStatus::Succeeded)
            }
        }
    }

    struct FakeConnector(Arc<FakePlatform>);

    #[async_trait]
    impl PlatformConnector for FakeConnector {
        async fn connect(&self, _logger: &RunLogger) -> UploadResult<Arc<dyn VideoPlatform>> {
            Ok(self.0.clone())
        }
    }

    fn config() -> PublishConfig {
        PublishConfig::from_settings(&PublishSettings {
            poll_interval_secs: 0,
            ..PublishSettings::default()
        })
    }

    fn workdir(videos: &[&str]) -> (tempfile::TempDir, WorkingDirectory) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Artist A & B - Song (Remix).mp3"), b"a").unwrap();
        fs::write(dir.path().join("2024_2_w.png"), b"c").unwrap();
        for name in videos {
            fs::write(dir.path().join(name), b"v").unwrap();
        }
        let wd = WorkingDirectory::open(dir.path()).unwrap();
        (dir, wd)
    }

    fn logger() -> Arc<RunLogger> {
        RunLogger::console("test", LogConfig::default()).shared()
    }

    #[tokio::test]
    async fn publishes_in_release_order() {
        let (_dir, wd) = workdir(&["130_0.mp4", "80_5.mp4", "100_0.mp4"]);
        let platform = Arc::new(FakePlatform::default());
        let publisher = Publisher::new(Arc::new(FakeConnector(platform.clone())), config());

        let output = publisher.publish(&wd, None, logger()).await.unwrap();

        assert_eq!(output.planned, 3);
        assert_eq!(output.published.len(), 3);
        assert!(output.stopped_by_quota.is_none());

        let uploads = platform.uploads.lock();
        let titles: Vec<&str> = uploads.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Artist A & B - Song (Remix) (Slowed)",
                "Artist A & B - Song (Remix) (Sped Up)",
                "Artist A & B - Song (Remix) (Super Sped Up)",
            ]
        );
        assert_eq!(
            uploads[0].description,
            "Discovery year=2024, Discovery season=2, Playlist=West"
        );
        assert_eq!(uploads[0].privacy, "unlisted");
        assert!(uploads[0].tags.ends_with(&[
            "slowed".to_string(),
            "reverb".to_string(),
            "slow".to_string()
        ]));
    }

    #[tokio::test]
    async fn quota_stops_queue_gracefully() {
        let (_dir, wd) = workdir(&["80_0.mp4", "100_0.mp4", "130_0.mp4"]);
        let platform = Arc::new(FakePlatform {
            quota_after: Some(1),
            ..FakePlatform::default()
        });
        let publisher = Publisher::new(Arc::new(FakeConnector(platform)), config());

        let output = publisher.publish(&wd, None, logger()).await.unwrap();

        assert_eq!(output.published.len(), 1);
        assert_eq!(output.published[0].label, "Slowed");
        assert_eq!(output.stopped_by_quota.as_deref(), Some("uploadLimitExceeded"));
    }

    #[tokio::test]
    async fn processing_failure_stops_stage() {
        let (_dir, wd) = workdir(&["80_0.mp4", "130_0.mp4"]);
        let platform = Arc::new(FakePlatform {
            fail_processing: true,
            ..FakePlatform::default()
        });
        let publisher = Publisher::new(Arc::new(FakeConnector(platform.clone())), config());

        let result = publisher.publish(&wd, None, logger()).await;

        assert!(matches!(result, Err(PublishError::ProcessingFailed { .. })));
        assert_eq!(platform.uploads.lock().len(), 1);
    }

    #[test]
    fn plan_applies_limit() {
        let (_dir, wd) = workdir(&["70_0.mp4", "80_0.mp4", "100_0.mp4", "130_0.mp4", "150_0.mp4"]);
        let publisher = Publisher::new(
            Arc::new(FakeConnector(Arc::new(FakePlatform::default()))),
            config(),
        );

        let last_two = publisher.plan(&wd, Some(PublishLimit::new(-2))).unwrap();
        let speeds: Vec<u32> = last_two.iter().map(|e| e.params.speed).collect();
        assert_eq!(speeds, vec![130, 150]);

        assert!(matches!(
            publisher.plan(&wd, Some(PublishLimit::new(6))),
            Err(PublishError::Limit(_))
        ));
    }

    #[test]
    fn plan_requires_rendered_videos() {
        let (_dir, wd) = workdir(&[]);
        let publisher = Publisher::new(
            Arc::new(FakeConnector(Arc::new(FakePlatform::default()))),
            config(),
        );
        assert!(matches!(
            publisher.plan(&wd, None),
            Err(PublishError::Directory(DirectoryError::NotFound { .. }))
        ));
    }
}
