//! Pipeline runner that executes steps in stage order.

use std::time::Instant;

use super::errors::{PipelineError, PipelineResult};
use super::step::PipelineStep;
use super::types::{Context, RunState, StepOutcome};
use crate::models::StageSelection;

/// Pipeline that runs a sequence of steps.
///
/// Steps run in the order they were added. Only steps whose stage lies in
/// the run's selection are executed.
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Add a step to the pipeline.
    pub fn add_step<S: PipelineStep + 'static>(&mut self, step: S) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Add a step (builder pattern).
    pub fn with_step<S: PipelineStep + 'static>(mut self, step: S) -> Self {
        self.add_step(step);
        self
    }

    /// Run the selected steps.
    ///
    /// Every selected step's `preflight` runs first; a failure there means
    /// nothing was touched. Then each step runs `validate_input`, `execute`
    /// and `validate_output`. The first failing step stops the run and
    /// leaves earlier outputs in place.
    pub async fn run(
        &self,
        ctx: &Context,
        state: &mut RunState,
        selection: StageSelection,
    ) -> PipelineResult<PipelineRunResult> {
        let run_name = ctx.logger.run_name().to_string();
        let selected: Vec<&dyn PipelineStep> = self
            .steps
            .iter()
            .map(|s| s.as_ref())
            .filter(|s| selection.contains(s.stage()))
            .collect();

        for step in &selected {
            ctx.logger
                .debug(&format!("Checking preconditions for '{}'", step.name()));
            step.preflight(ctx, &selection).map_err(|e| {
                ctx.logger.error(&e.to_string());
                PipelineError::preflight_failed(&run_name, step.name(), e)
            })?;
        }

        let mut result = PipelineRunResult::default();
        let pipeline_start = Instant::now();

        for step in selected {
            let step_name = step.name();
            ctx.logger.info("");
            ctx.logger
                .info(&format!("{}. {}", step.stage().number(), step.description()));
            let step_start = Instant::now();

            if let Err(e) = step.validate_input(ctx) {
                ctx.logger.error(&format!("Input validation failed: {}", e));
                return Err(PipelineError::step_failed(&run_name, step_name, e));
            }

            let outcome = step.execute(ctx, state).await.map_err(|e| {
                ctx.logger.error(&format!("Execution failed: {}", e));
                PipelineError::step_failed(&run_name, step_name, e)
            })?;

            match outcome {
                StepOutcome::Success => {
                    if let Err(e) = step.validate_output(ctx, state) {
                        ctx.logger.error(&format!("Output validation failed: {}", e));
                        return Err(PipelineError::step_failed(&run_name, step_name, e));
                    }
                    result.steps_completed.push(step_name.to_string());
                }
                StepOutcome::Skipped(reason) => {
                    ctx.logger.info(&format!("{} skipped: {}", step_name, reason));
                    result.steps_skipped.push(step_name.to_string());
                }
            }

            let secs = step_start.elapsed().as_secs();
            state.record_duration(step.stage(), secs);
            ctx.logger.info(&format!("Step execution time: {}s", secs));
        }

        ctx.logger.info("");
        ctx.logger.info(&format!(
            "Pipeline execution time: {}s",
            pipeline_start.elapsed().as_secs()
        ));

        Ok(result)
    }

    /// Get the number of steps in the pipeline.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Get step names in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineRunResult {
    /// Steps that completed successfully.
    pub steps_completed: Vec<String>,
    /// Steps that ended early without failing.
    pub steps_skipped: Vec<String>,
}

impl PipelineRunResult {
    /// Check if all steps completed (none skipped).
    pub fn all_completed(&self) -> bool {
        self.steps_skipped.is_empty()
    }
}
