//! Render step - muxes every variant with the cover into a video.

use async_trait::async_trait;

use crate::encode::Canvas;
use crate::models::{Stage, StageSelection};
use crate::muxer::{MuxError, RenderOutput, VideoMuxer};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome};
use crate::workdir::ArtifactKind;

pub struct RenderStep {
    muxer: VideoMuxer,
}

impl RenderStep {
    pub fn new(muxer: VideoMuxer) -> Self {
        Self { muxer }
    }
}

#[async_trait]
impl PipelineStep for RenderStep {
    fn stage(&self) -> Stage {
        Stage::Render
    }

    fn name(&self) -> &str {
        "Render"
    }

    fn description(&self) -> &str {
        "Converting nightcore to video"
    }

    fn preflight(&self, ctx: &Context, _selection: &StageSelection) -> StepResult<()> {
        // The canvas depends only on the cover, so an unreadable image fails here
        let cover = ctx.workdir.cover()?;
        Canvas::from_image(&cover, ctx.ratio).map_err(MuxError::Cover)?;
        Ok(())
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        ctx.workdir.list(ArtifactKind::Variant, true)?;
        Ok(())
    }

    async fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        let report = self
            .muxer
            .render(&ctx.workdir, ctx.ratio, ctx.preset, ctx.logger.clone())
            .await?;
        state.render = Some(RenderOutput::from(&report));

        if !report.all_succeeded() {
            return Err(StepError::units_failed(
                "videos",
                report.failed().len(),
                report.outcomes.len(),
            ));
        }

        ctx.logger.success("All videos rendered");
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        let output = state
            .render
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("render output not recorded"))?;
        if let Some(missing) = output.rendered.iter().find(|p| !p.exists()) {
            return Err(StepError::invalid_output(format!(
                "video missing after rendering: {}",
                missing.display()
            )));
        }
        Ok(())
    }
}
