//! YouTube Data API v3 adapter.
//!
//! Uploads use the resumable protocol: one POST opens a session, then the
//! file is sent in fixed-size chunks, each acknowledged with `308 Resume
//! Incomplete` until the final chunk returns the created video resource.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

use super::auth::Authenticator;
use super::{
    PlatformConnector, ProcessingStatus, ProgressFn, UploadError, UploadResult, VideoMetadata,
    VideoPlatform, QUOTA_REASONS,
};
use crate::config::ConfigManager;
use crate::logging::RunLogger;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";

const VIDEO_MIME: &str = "video/*";
const UPLOAD_PARTS: &str = "snippet,status";

/// Authenticated client for one publish run.
pub struct YouTubeClient {
    http: reqwest::Client,
    access_token: String,
    api_base: String,
    chunk_size: usize,
}

impl YouTubeClient {
    pub fn new(http: reqwest::Client, access_token: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            http,
            access_token: access_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            chunk_size,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Open a resumable session, returning its URI.
    async fn start_session(&self, metadata: &VideoMetadata, total: u64) -> UploadResult<String> {
        let url = format!(
            "{}/upload/youtube/v3/videos?uploadType=resumable&part={}",
            self.api_base, UPLOAD_PARTS
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("X-Upload-Content-Type", VIDEO_MIME)
            .header("X-Upload-Content-Length", total.to_string())
            .json(&VideoResource::from(metadata))
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| UploadError::Parse("upload session has no Location header".to_string()))
    }
}

#[async_trait]
impl VideoPlatform for YouTubeClient {
    async fn upload(
        &self,
        video: &Path,
        metadata: &VideoMetadata,
        progress: ProgressFn<'_>,
    ) -> UploadResult<String> {
        let mut file = tokio::fs::File::open(video)
            .await
            .map_err(|e| UploadError::io(format!("opening {}", video.display()), e))?;
        let total = file
            .metadata()
            .await
            .map_err(|e| UploadError::io(format!("reading {}", video.display()), e))?
            .len();
        if total == 0 {
            return Err(UploadError::io(
                format!("reading {}", video.display()),
                std::io::Error::new(std::io::ErrorKind::InvalidData, "video file is empty"),
            ));
        }

        let session = self.start_session(metadata, total).await?;
        let mut offset = 0u64;

        loop {
            let end = (offset + self.chunk_size as u64).min(total);
            let mut chunk = vec![0u8; (end - offset) as usize];
            file.seek(SeekFrom::Start(offset))
                .await
                .map_err(|e| UploadError::io("seeking video", e))?;
            file.read_exact(&mut chunk)
                .await
                .map_err(|e| UploadError::io("reading video chunk", e))?;

            let response = self
                .http
                .put(&session)
                .bearer_auth(&self.access_token)
                .header(CONTENT_TYPE, VIDEO_MIME)
                .header(CONTENT_LENGTH, chunk.len())
                .header(CONTENT_RANGE, content_range(offset, end, total))
                .body(chunk)
                .send()
                .await
                .map_err(network)?;

            let status = response.status();
            match status.as_u16() {
                308 => {
                    let range = response
                        .headers()
                        .get(RANGE)
                        .and_then(|v| v.to_str().ok());
                    offset = resume_offset(offset, range, total)?;
                    progress(offset, total);
                }
                200 | 201 => {
                    progress(total, total);
                    let body = response.text().await.map_err(network)?;
                    let created: CreatedVideo = serde_json::from_str(&body)
                        .map_err(|e| UploadError::Parse(e.to_string()))?;
                    return Ok(created.id);
                }
                _ => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(api_error(status, &body));
                }
            }
        }
    }

    async fn processing_status(&self, video_id: &str) -> UploadResult<ProcessingStatus> {
        let url = format!("{}/youtube/v3/videos", self.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("part", "processingDetails"), ("id", video_id)])
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        let body = response.text().await.map_err(network)?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }
        parse_processing_status(video_id, &body)
    }
}

/// Authenticates on first use and builds a [`YouTubeClient`].
pub struct YouTubeConnector {
    authenticator: Authenticator,
    http: reqwest::Client,
    chunk_size: usize,
}

impl YouTubeConnector {
    pub fn new(authenticator: Authenticator, http: reqwest::Client, chunk_size: usize) -> Self {
        Self {
            authenticator,
            http,
            chunk_size,
        }
    }

    pub fn from_config(config: &ConfigManager) -> UploadResult<Self> {
        // 308 is the resumable protocol's continue status, never a redirect
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(network)?;
        let authenticator = Authenticator::new(
            config.client_secret_path(),
            config.token_cache_path(),
            http.clone(),
        );
        Ok(Self::new(
            authenticator,
            http,
            config.settings().publish.chunk_size_bytes(),
        ))
    }
}

#[async_trait]
impl PlatformConnector for YouTubeConnector {
    async fn connect(&self, logger: &RunLogger) -> UploadResult<Arc<dyn VideoPlatform>> {
        let token = self.authenticator.access_token(logger).await?;
        Ok(Arc::new(YouTubeClient::new(
            self.http.clone(),
            token,
            self.chunk_size,
        )))
    }
}

#[derive(Serialize)]
struct VideoResource<'a> {
    snippet: Snippet<'a>,
    status: Status<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Snippet<'a> {
    title: &'a str,
    description: &'a str,
    tags: &'a [String],
    category_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Status<'a> {
    privacy_status: &'a str,
    made_for_kids: bool,
}

impl<'a> From<&'a VideoMetadata> for VideoResource<'a> {
    fn from(metadata: &'a VideoMetadata) -> Self {
        Self {
            snippet: Snippet {
                title: &metadata.title,
                description: &metadata.description,
                tags: &metadata.tags,
                category_id: &metadata.category_id,
            },
            status: Status {
                privacy_status: &metadata.privacy,
                made_for_kids: metadata.made_for_kids,
            },
        }
    }
}

#[derive(Deserialize)]
struct CreatedVideo {
    id: String,
}

#[derive(Deserialize)]
struct VideoList {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    processing_details: Option<ProcessingDetails>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessingDetails {
    processing_status: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

fn network(e: reqwest::Error) -> UploadError {
    UploadError::Network(e.to_string())
}

/// `Content-Range` for the half-open byte span `[start, end)`.
fn content_range(start: u64, end: u64, total: u64) -> String {
    if end <= start {
        format!("bytes */{}", total)
    } else {
        format!("bytes {}-{}/{}", start, end - 1, total)
    }
}

/// First byte the server has not yet persisted, from a `308` `Range` header.
///
/// A missing header means nothing was persisted; `None` for a malformed one.
fn next_offset(range: Option<&str>) -> Option<u64> {
    let Some(range) = range else {
        return Some(0);
    };
    range
        .strip_prefix("bytes=")
        .and_then(|r| r.split_once('-'))
        .and_then(|(_, last)| last.trim().parse::<u64>().ok())
        .map(|last| last + 1)
}

/// Offset for the next chunk after a `308` that followed a chunk sent from
/// `previous`.
///
/// The server must have persisted more than before and less than the whole
/// file, otherwise the session is not making progress.
fn resume_offset(previous: u64, range: Option<&str>, total: u64) -> UploadResult<u64> {
    let next = next_offset(range).ok_or_else(|| {
        UploadError::Parse(format!(
            "malformed Range header on resumable upload: {}",
            range.unwrap_or_default()
        ))
    })?;
    if next <= previous {
        return Err(UploadError::Api {
            status: 308,
            reason: "uploadStalled".to_string(),
            message: format!(
                "server persisted {} bytes after a chunk sent from byte {}",
                next, previous
            ),
        });
    }
    if next >= total {
        return Err(UploadError::Api {
            status: 308,
            reason: "uploadIncomplete".to_string(),
            message: format!(
                "server holds all {} bytes but did not create the video",
                total
            ),
        });
    }
    Ok(next)
}

/// Map an error response, recognising quota exhaustion.
fn api_error(status: StatusCode, body: &str) -> UploadError {
    let (reason, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (
            envelope
                .error
                .errors
                .first()
                .map(|e| e.reason.clone())
                .unwrap_or_default(),
            envelope.error.message,
        ),
        Err(_) => (String::new(), body.trim().to_string()),
    };

    if status == StatusCode::FORBIDDEN && QUOTA_REASONS.contains(&reason.as_str()) {
        return UploadError::QuotaExceeded { reason };
    }
    UploadError::Api {
        status: status.as_u16(),
        reason,
        message,
    }
}

fn parse_processing_status(video_id: &str, body: &str) -> UploadResult<ProcessingStatus> {
    let list: VideoList =
        serde_json::from_str(body).map_err(|e| UploadError::Parse(e.to_string()))?;
    let item = list
        .items
        .into_iter()
        .next()
        .ok_or_else(|| UploadError::VideoNotFound(video_id.to_string()))?;
    Ok(item
        .processing_details
        .map(|d| ProcessingStatus::from_platform(&d.processing_status))
        .unwrap_or(ProcessingStatus::Processing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::response::{IntoResponse, Response};
    use axum::routing::{post, put, MethodRouter};
    use axum::Router;
    use parking_lot::Mutex;

    #[test]
    fn formats_content_range() {
        assert_eq!(content_range(0, 262144, 1000000), "bytes 0-262143/1000000");
        assert_eq!(content_range(262144, 1000000, 1000000), "bytes 262144-999999/1000000");
        assert_eq!(content_range(0, 0, 0), "bytes */0");
    }

    #[test]
    fn resumes_after_acknowledged_range() {
        assert_eq!(next_offset(Some("bytes=0-262143")), Some(262144));
        assert_eq!(next_offset(None), Some(0));
        assert_eq!(next_offset(Some("garbage")), None);

        assert_eq!(resume_offset(0, Some("bytes=0-262143"), 1000000).unwrap(), 262144);
    }

    #[test]
    fn stalled_session_is_an_error() {
        assert!(matches!(
            resume_offset(0, None, 1000),
            Err(UploadError::Api { status: 308, .. })
        ));
        assert!(matches!(
            resume_offset(500, Some("bytes=0-499"), 1000),
            Err(UploadError::Api { status: 308, .. })
        ));
        assert!(matches!(
            resume_offset(0, Some("garbage"), 1000),
            Err(UploadError::Parse(_))
        ));
        // Everything persisted yet still incomplete
        assert!(matches!(
            resume_offset(500, Some("bytes=0-999"), 1000),
            Err(UploadError::Api { status: 308, .. })
        ));
    }

    #[test]
    fn recognises_quota_errors() {
        let body = r#"{"error":{"code":403,"message":"The user has exceeded the number of videos they may upload.",
            "errors":[{"domain":"youtube.video","reason":"uploadLimitExceeded"}]}}"#;
        assert!(api_error(StatusCode::FORBIDDEN, body).is_quota_exceeded());

        let body = r#"{"error":{"code":403,"message":"Forbidden","errors":[{"reason":"forbidden"}]}}"#;
        match api_error(StatusCode::FORBIDDEN, body) {
            UploadError::Api { status, reason, .. } => {
                assert_eq!(status, 403);
                assert_eq!(reason, "forbidden");
            }
            other => panic!("expected api error, got {:?}", other),
        }

        let err = api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(err, UploadError::Api { status: 502, .. }));
    }

    #[test]
    fn serialises_insert_body() {
        let metadata = VideoMetadata {
            title: "Artist - Song (Sped Up)".to_string(),
            description: "Discovery year=2024, Discovery season=2, Playlist=West".to_string(),
            tags: vec!["artist".to_string(), "song".to_string()],
            category_id: "10".to_string(),
            privacy: "unlisted".to_string(),
            made_for_kids: false,
        };
        let json = serde_json::to_value(VideoResource::from(&metadata)).unwrap();

        assert_eq!(json["snippet"]["categoryId"], "10");
        assert_eq!(json["snippet"]["tags"][1], "song");
        assert_eq!(json["status"]["privacyStatus"], "unlisted");
        assert_eq!(json["status"]["madeForKids"], false);
    }

    #[test]
    fn parses_processing_details() {
        let body = r#"{"items":[{"id":"abc","processingDetails":{"processingStatus":"succeeded"}}]}"#;
        assert_eq!(
            parse_processing_status("abc", body).unwrap(),
            ProcessingStatus::Succeeded
        );

        let pending = r#"{"items":[{"id":"abc"}]}"#;
        assert_eq!(
            parse_processing_status("abc", pending).unwrap(),
            ProcessingStatus::Processing
        );

        assert!(matches!(
            parse_processing_status("abc", r#"{"items":[]}"#),
            Err(UploadError::VideoNotFound(_))
        ));
    }

    async fn open_session(State(base): State<String>) -> impl IntoResponse {
        (StatusCode::OK, [(LOCATION, format!("{}/session", base))])
    }

    /// Acknowledge each chunk up to its last byte, creating the video once
    /// the final byte arrives.
    async fn accept_chunk(headers: HeaderMap) -> Response {
        let range = headers
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let (span, total) = range.trim_start_matches("bytes ").split_once('/').unwrap();
        let last: u64 = span.split_once('-').unwrap().1.parse().unwrap();
        if last + 1 == total.parse::<u64>().unwrap() {
            (StatusCode::CREATED, r#"{"id":"vid123"}"#).into_response()
        } else {
            (StatusCode::PERMANENT_REDIRECT, [(RANGE, format!("bytes=0-{}", last))]).into_response()
        }
    }

    async fn fake_api(session: MethodRouter<String>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let app = Router::new()
            .route("/upload/youtube/v3/videos", post(open_session))
            .route("/session", session)
            .with_state(base.clone());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        base
    }

    fn client(base: &str) -> YouTubeClient {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();
        YouTubeClient::new(http, "token", 4).with_api_base(base)
    }

    fn video_file(dir: &tempfile::TempDir, len: usize) -> std::path::PathBuf {
        let path = dir.path().join("video.mp4");
        std::fs::write(&path, vec![7u8; len]).unwrap();
        path
    }

    fn metadata() -> VideoMetadata {
        VideoMetadata {
            title: "Artist - Song".to_string(),
            description: String::new(),
            tags: Vec::new(),
            category_id: "10".to_string(),
            privacy: "private".to_string(),
            made_for_kids: false,
        }
    }

    #[tokio::test]
    async fn uploads_in_acknowledged_chunks() {
        let base = fake_api(put(accept_chunk)).await;
        let dir = tempfile::tempdir().unwrap();
        let video = video_file(&dir, 10);
        let seen = Mutex::new(Vec::new());

        let id = client(&base)
            .upload(&video, &metadata(), &|sent, _| seen.lock().push(sent))
            .await
            .unwrap();

        assert_eq!(id, "vid123");
        assert_eq!(*seen.lock(), vec![4, 8, 10]);
    }

    #[tokio::test]
    async fn upload_fails_when_server_never_advances() {
        let base = fake_api(put(|| async { StatusCode::PERMANENT_REDIRECT })).await;
        let dir = tempfile::tempdir().unwrap();
        let video = video_file(&dir, 10);

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            client(&base).upload(&video, &metadata(), &|_, _| {}),
        )
        .await
        .expect("upload should not loop");

        assert!(matches!(result, Err(UploadError::Api { status: 308, .. })));
    }

    #[tokio::test]
    async fn empty_video_is_rejected_before_opening_a_session() {
        let dir = tempfile::tempdir().unwrap();
        let video = video_file(&dir, 0);

        let result = client("http://127.0.0.1:9")
            .upload(&video, &metadata(), &|_, _| {})
            .await;
        assert!(matches!(result, Err(UploadError::Io { .. })));
    }

    #[test]
    fn api_base_drops_trailing_slash() {
        let client = YouTubeClient::new(reqwest::Client::new(), "t", 262144)
            .with_api_base("http://127.0.0.1:9000/");
        assert_eq!(client.api_base, "http://127.0.0.1:9000");
    }
}
