//! Generate step - produces audio variants through the effect app.

use async_trait::async_trait;

use crate::generator::{GenerateOutput, VariantGenerator};
use crate::models::{Stage, StageSelection};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome};

pub struct GenerateStep {
    generator: VariantGenerator,
}

impl GenerateStep {
    pub fn new(generator: VariantGenerator) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl PipelineStep for GenerateStep {
    fn stage(&self) -> Stage {
        Stage::Generate
    }

    fn name(&self) -> &str {
        "Generate"
    }

    fn description(&self) -> &str {
        "Creating nightcore"
    }

    fn preflight(&self, ctx: &Context, _selection: &StageSelection) -> StepResult<()> {
        if ctx.params.is_empty() {
            return Err(StepError::precondition_failed(
                "`generate` step requires at least one speed value",
            ));
        }
        Ok(())
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        ctx.workdir.track()?;
        Ok(())
    }

    async fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        let report = self
            .generator
            .generate(&ctx.workdir, &ctx.params, ctx.logger.clone())
            .await?;
        state.generate = Some(GenerateOutput::from(&report));

        if !report.all_succeeded() {
            let failed = report.failed();
            let tags: Vec<String> = failed.iter().map(|p| p.log_tag().trim().to_string()).collect();
            ctx.logger
                .error(&format!("Failed nightcore versions: {}", tags.join(", ")));
            return Err(StepError::units_failed(
                "nightcore versions",
                failed.len(),
                report.outcomes.len(),
            ));
        }

        ctx.logger.success("All nightcore versions created");
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        let output = state
            .generate
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("generate output not recorded"))?;
        if let Some(missing) = output.produced.iter().find(|p| !p.exists()) {
            return Err(StepError::invalid_output(format!(
                "variant missing after generation: {}",
                missing.display()
            )));
        }
        Ok(())
    }
}
