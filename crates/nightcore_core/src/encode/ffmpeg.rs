//! ffmpeg encoder.

use std::process::{Command, Stdio};

use super::{EncodeError, EncodeJob, EncodeResult, Encoder};
use crate::config::RenderSettings;

/// Renders a looped still image over an audio stream with ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg_path: String,
    video_codec: String,
    crf: u8,
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self::from_settings(&RenderSettings::default())
    }

    pub fn from_settings(settings: &RenderSettings) -> Self {
        Self {
            ffmpeg_path: settings.ffmpeg_path.clone(),
            video_codec: settings.video_codec.clone(),
            crf: settings.crf,
        }
    }

    /// Arguments for one job, audio as input 0 and the cover as input 1.
    pub fn build_args(&self, job: &EncodeJob) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-loglevel", "error", "-i"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push(job.audio.to_string_lossy().to_string());
        args.extend(["-loop", "1", "-i"].iter().map(|s| s.to_string()));
        args.push(job.cover.to_string_lossy().to_string());

        args.extend(
            [
                "-vf".to_string(),
                job.canvas.filter(),
                "-map".to_string(),
                "1:v".to_string(),
                "-map".to_string(),
                "0:a".to_string(),
                "-c:v".to_string(),
                self.video_codec.clone(),
                "-crf".to_string(),
                self.crf.to_string(),
                "-preset".to_string(),
                job.preset.as_str().to_string(),
                "-pix_fmt".to_string(),
                "yuv420p".to_string(),
                "-c:a".to_string(),
                "copy".to_string(),
                "-shortest".to_string(),
            ],
        );
        args.push(job.output.to_string_lossy().to_string());
        args
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn describe(&self, job: &EncodeJob) -> String {
        format!("{} {}", self.ffmpeg_path, self.build_args(job).join(" "))
    }

    fn encode(&self, job: &EncodeJob) -> EncodeResult<()> {
        let args = self.build_args(job);
        tracing::debug!("Running ffmpeg: {} {}", self.ffmpeg_path, args.join(" "));

        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| EncodeError::Spawn {
                tool: self.ffmpeg_path.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr)
                .lines()
                .map(str::to_string)
                .collect();
            return Err(EncodeError::CommandFailed {
                tool: self.name().to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::Canvas;
    use crate::models::Preset;
    use std::path::PathBuf;

    fn job() -> EncodeJob {
        EncodeJob {
            audio: PathBuf::from("/w/80_5.mp3"),
            cover: PathBuf::from("/w/2024_2_w.png"),
            output: PathBuf::from("/w/80_5.mp4"),
            canvas: Canvas {
                width: 1920,
                height: 1080,
            },
            preset: Preset::Medium,
        }
    }

    #[test]
    fn args_loop_cover_and_copy_audio() {
        let args = FfmpegEncoder::new().build_args(&job());
        let line = args.join(" ");

        assert!(line.starts_with("-y -loglevel error -i /w/80_5.mp3 -loop 1 -i /w/2024_2_w.png"));
        assert!(line.contains("-map 1:v -map 0:a"));
        assert!(line.contains("-c:v libx264 -crf 18 -preset medium -pix_fmt yuv420p"));
        assert!(line.contains("-c:a copy -shortest"));
        assert_eq!(args.last().map(String::as_str), Some("/w/80_5.mp4"));
    }

    #[test]
    fn settings_override_codec_and_quality() {
        let settings = RenderSettings {
            ffmpeg_path: "/opt/ffmpeg".to_string(),
            crf: 23,
            ..RenderSettings::default()
        };
        let encoder = FfmpegEncoder::from_settings(&settings);

        assert!(encoder.describe(&job()).starts_with("/opt/ffmpeg -y"));
        assert!(encoder.build_args(&job()).contains(&"23".to_string()));
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let settings = RenderSettings {
            ffmpeg_path: "/nonexistent/ffmpeg-binary".to_string(),
            ..RenderSettings::default()
        };
        let result = FfmpegEncoder::from_settings(&settings).encode(&job());
        assert!(matches!(result, Err(EncodeError::Spawn { .. })));
    }
}
