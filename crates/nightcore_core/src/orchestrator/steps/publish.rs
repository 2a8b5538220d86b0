//! Publish step - uploads rendered videos in release order.

use async_trait::async_trait;

use crate::models::{Stage, StageSelection, VariantParams};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome};
use crate::publisher::{speed_labels, PublishError, Publisher, TrackName};
use crate::workdir::{decode_name, ArtifactKind};

pub struct PublishStep {
    publisher: Publisher,
}

impl PublishStep {
    pub fn new(publisher: Publisher) -> Self {
        Self { publisher }
    }
}

/// Parameters of the videos the publish stage will see.
///
/// Earlier selected stages decide where they come from: the requested pairs
/// if generation runs, else the variants on disk if rendering runs, else the
/// rendered videos on disk.
fn expected_videos(ctx: &Context, selection: &StageSelection) -> StepResult<Vec<VariantParams>> {
    if selection.contains(Stage::Generate) {
        return Ok(ctx.params.clone());
    }
    let kind = if selection.contains(Stage::Render) {
        ArtifactKind::Variant
    } else {
        ArtifactKind::Rendered
    };
    let mut params = Vec::new();
    for path in ctx.workdir.list(kind, true)? {
        params.push(decode_name(&path)?);
    }
    Ok(params)
}

#[async_trait]
impl PipelineStep for PublishStep {
    fn stage(&self) -> Stage {
        Stage::Publish
    }

    fn name(&self) -> &str {
        "Publish"
    }

    fn description(&self) -> &str {
        "Uploading videos to YouTube"
    }

    fn preflight(&self, ctx: &Context, selection: &StageSelection) -> StepResult<()> {
        TrackName::parse(&ctx.track_stem)?;

        let params = expected_videos(ctx, selection)?;
        let slowed = params.iter().filter(|p| p.is_slowed()).count();
        speed_labels(slowed, params.len() - slowed)?;

        if let Some(limit) = ctx.limit {
            limit
                .validate(params.len())
                .map_err(PublishError::Limit)?;
        }
        Ok(())
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        self.publisher.plan(&ctx.workdir, ctx.limit)?;
        Ok(())
    }

    async fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        let output = self
            .publisher
            .publish(&ctx.workdir, ctx.limit, ctx.logger.clone())
            .await?;

        let outcome = match (&output.stopped_by_quota, output.published.is_empty()) {
            (Some(reason), true) => {
                StepOutcome::Skipped(format!("upload quota exhausted ({})", reason))
            }
            _ => {
                ctx.logger.success(&format!(
                    "Published {} of {} videos",
                    output.published.len(),
                    output.planned
                ));
                StepOutcome::Success
            }
        };
        state.publish = Some(output);
        Ok(outcome)
    }

    fn validate_output(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        match &state.publish {
            Some(_) => Ok(()),
            None => Err(StepError::invalid_output("publish output not recorded")),
        }
    }
}
