//! Core types for the orchestrator pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::generator::GenerateOutput;
use crate::logging::RunLogger;
use crate::models::{AspectRatio, Metadata, Preset, PublishLimit, Stage, VariantParams};
use crate::muxer::RenderOutput;
use crate::publisher::PublishOutput;
use crate::workdir::{DirectoryResult, WorkingDirectory};

/// Read-only context passed to pipeline steps.
///
/// Contains the run's inputs and shared resources. Mutable state goes in
/// `RunState`.
pub struct Context {
    /// The working directory all stages coordinate through.
    pub workdir: WorkingDirectory,
    /// Application settings.
    pub settings: Settings,
    /// Variant parameters for the generate stage.
    pub params: Vec<VariantParams>,
    /// Encoder preset for the render stage.
    pub preset: Preset,
    /// Output aspect ratio for the render stage.
    pub ratio: AspectRatio,
    /// Subset of the release order to publish.
    pub limit: Option<PublishLimit>,
    /// Stem of the source track, `"<artist> - <title>"`.
    pub track_stem: String,
    /// Metadata record from the cover art name.
    pub metadata: Metadata,
    /// Per-run logger.
    pub logger: Arc<RunLogger>,
}

impl Context {
    /// Create a context, resolving the track and metadata every run needs.
    pub fn new(
        workdir: WorkingDirectory,
        settings: Settings,
        logger: Arc<RunLogger>,
    ) -> DirectoryResult<Self> {
        let track_stem = workdir.track_stem()?;
        let metadata = workdir.metadata()?;
        let preset = settings.render.default_preset;
        Ok(Self {
            workdir,
            settings,
            params: Vec::new(),
            preset,
            ratio: AspectRatio::default(),
            limit: None,
            track_stem,
            metadata,
            logger,
        })
    }

    pub fn with_params(mut self, params: Vec<VariantParams>) -> Self {
        self.params = params;
        self
    }

    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self
    }

    pub fn with_ratio(mut self, ratio: AspectRatio) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn with_limit(mut self, limit: Option<PublishLimit>) -> Self {
        self.limit = limit;
        self
    }
}

/// Time spent in one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub secs: u64,
}

/// Mutable run state that accumulates results from pipeline steps.
///
/// Each step's output is stored in its own section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    /// Run identifier (the track stem).
    pub run_id: String,
    /// When the run started.
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate: Option<GenerateOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render: Option<RenderOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishOutput>,
    /// Per-stage durations in execution order.
    #[serde(default)]
    pub durations: Vec<StageTiming>,
}

impl RunState {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Some(chrono::Local::now().to_rfc3339()),
            ..Default::default()
        }
    }

    pub fn record_duration(&mut self, stage: Stage, secs: u64) {
        self.durations.push(StageTiming { stage, secs });
    }

    pub fn duration_of(&self, stage: Stage) -> Option<u64> {
        self.durations
            .iter()
            .find(|t| t.stage == stage)
            .map(|t| t.secs)
    }
}

/// Result of executing a pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step completed successfully.
    Success,
    /// Step ended early without doing its work (not an error).
    Skipped(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_state_records_durations() {
        let mut state = RunState::new("Artist - Song");
        state.record_duration(Stage::Generate, 12);
        state.record_duration(Stage::Render, 40);

        assert_eq!(state.duration_of(Stage::Render), Some(40));
        assert_eq!(state.duration_of(Stage::Publish), None);
    }

    #[test]
    fn run_state_serializes() {
        let mut state = RunState::new("Artist - Song");
        state.publish = Some(PublishOutput {
            planned: 2,
            ..PublishOutput::default()
        });
        let json = serde_json::to_string(&state).unwrap();

        assert!(json.contains("\"run_id\":\"Artist - Song\""));
        assert!(json.contains("\"planned\":2"));
        assert!(!json.contains("\"render\""));
    }
}
