//! Upload capability: video platform access.
//!
//! The publisher sees a [`PlatformConnector`] that authenticates lazily and
//! hands out a [`VideoPlatform`]. The YouTube Data API implementation lives
//! in [`youtube`]; OAuth credential handling in [`auth`].

pub mod auth;
pub mod youtube;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::RunLogger;

pub use auth::{Authenticator, ClientSecret, TokenCache};
pub use youtube::{YouTubeClient, YouTubeConnector};

/// Upload failure reasons that mean the account is out of quota.
pub const QUOTA_REASONS: [&str; 2] = ["quotaExceeded", "uploadLimitExceeded"];

/// Errors from authentication, transfer and status polling.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload quota exceeded ({reason})")]
    QuotaExceeded { reason: String },

    #[error("Client secret file not found: {}", .0.display())]
    MissingClientSecret(PathBuf),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status} ({reason}): {message}")]
    Api {
        status: u16,
        reason: String,
        message: String,
    },

    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error("Video {0} not found on the platform")]
    VideoNotFound(String),

    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl UploadError {
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, UploadError::QuotaExceeded { .. })
    }
}

pub type UploadResult<T> = Result<T, UploadError>;

/// Metadata attached to an uploaded video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: String,
    pub made_for_kids: bool,
}

/// Platform-side processing state of an uploaded video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingStatus {
    Processing,
    Succeeded,
    /// Terminal failure with the platform's status word.
    Failed(String),
}

impl ProcessingStatus {
    /// Map the platform's `processingStatus` value.
    pub fn from_platform(status: &str) -> Self {
        match status {
            "succeeded" => ProcessingStatus::Succeeded,
            "failed" | "rejected" | "terminated" => ProcessingStatus::Failed(status.to_string()),
            _ => ProcessingStatus::Processing,
        }
    }
}

/// Transfer progress callback: `(bytes_sent, bytes_total)`.
pub type ProgressFn<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// An authenticated video platform.
#[async_trait]
pub trait VideoPlatform: Send + Sync {
    /// Upload a file, returning the new video's id.
    async fn upload(
        &self,
        video: &Path,
        metadata: &VideoMetadata,
        progress: ProgressFn<'_>,
    ) -> UploadResult<String>;

    async fn processing_status(&self, video_id: &str) -> UploadResult<ProcessingStatus>;
}

/// Produces an authenticated platform when publishing actually starts.
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    async fn connect(&self, logger: &RunLogger) -> UploadResult<Arc<dyn VideoPlatform>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_are_failures() {
        assert_eq!(
            ProcessingStatus::from_platform("succeeded"),
            ProcessingStatus::Succeeded
        );
        for status in ["failed", "rejected", "terminated"] {
            assert!(matches!(
                ProcessingStatus::from_platform(status),
                ProcessingStatus::Failed(_)
            ));
        }
        assert_eq!(
            ProcessingStatus::from_platform("processing"),
            ProcessingStatus::Processing
        );
    }
}
