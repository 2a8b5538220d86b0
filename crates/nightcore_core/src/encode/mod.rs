//! Encode capability: still image + audio into a video.
//!
//! The muxer only sees the [`Encoder`] trait; [`FfmpegEncoder`] is the
//! production implementation.

mod ffmpeg;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::{AspectRatio, Preset};

pub use ffmpeg::FfmpegEncoder;

/// Errors from an encode job.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Failed to read image {}: {message}", .path.display())]
    Image { path: PathBuf, message: String },

    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} failed with exit code {exit_code}: {}", .stderr.last().map(String::as_str).unwrap_or("no output"))]
    CommandFailed {
        tool: String,
        exit_code: i32,
        /// Captured stderr lines.
        stderr: Vec<String>,
    },
}

pub type EncodeResult<T> = Result<T, EncodeError>;

/// Frame size of the rendered video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    /// Canvas for a cover of the given height.
    ///
    /// Width is `round(height * ratio)` bumped to even. Height is the cover
    /// height bumped to even. Encoders reject odd frame dimensions.
    pub fn for_cover(cover_height: u32, ratio: AspectRatio) -> Self {
        let width = (cover_height as f64 * ratio.value()).round() as u32;
        Self {
            width: round_up_to_even(width),
            height: round_up_to_even(cover_height),
        }
    }

    /// Canvas for the cover image at `path`.
    pub fn from_image(path: &Path, ratio: AspectRatio) -> EncodeResult<Self> {
        let (_, height) = image::image_dimensions(path).map_err(|e| EncodeError::Image {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self::for_cover(height, ratio))
    }

    /// Scale the cover down into the canvas, then pad it centered in black.
    pub fn filter(&self) -> String {
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black",
            w = self.width,
            h = self.height
        )
    }
}

impl std::fmt::Display for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

fn round_up_to_even(value: u32) -> u32 {
    value + value % 2
}

/// One encode: looped cover + variant audio into a video.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub audio: PathBuf,
    pub cover: PathBuf,
    pub output: PathBuf,
    pub canvas: Canvas,
    pub preset: Preset,
}

/// Encoder backend. Runs synchronously; called from worker threads.
pub trait Encoder: Send + Sync {
    /// Tool name for logs and errors.
    fn name(&self) -> &str;

    /// Printable command line for a job.
    fn describe(&self, job: &EncodeJob) -> String;

    /// Run the job, stopping at the shorter of the two streams.
    fn encode(&self, job: &EncodeJob) -> EncodeResult<()>;
}
