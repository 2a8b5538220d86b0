//! Pipeline step trait definition.
//!
//! All pipeline steps implement this trait, providing a consistent
//! interface for validation and execution.

use async_trait::async_trait;

use super::errors::StepResult;
use super::types::{Context, RunState, StepOutcome};
use crate::models::{Stage, StageSelection};

/// Trait for pipeline steps.
///
/// Before any step runs, the pipeline calls `preflight` on every selected
/// step. Then, for each step in stage order:
///
/// 1. `validate_input` - Check the directory right before execution
/// 2. `execute` - Perform the step's work
/// 3. `validate_output` - Verify the step produced valid output
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// Stage this step implements.
    fn stage(&self) -> Stage;

    /// Get the step name (for logging and error context).
    fn name(&self) -> &str;

    /// Human-readable description, logged as the stage header.
    fn description(&self) -> &str {
        self.name()
    }

    /// Static preconditions, checked for all selected steps up front.
    ///
    /// Must not have side effects. `selection` tells which earlier stages
    /// will produce this step's inputs.
    fn preflight(&self, _ctx: &Context, _selection: &StageSelection) -> StepResult<()> {
        Ok(())
    }

    /// Validate inputs before execution.
    fn validate_input(&self, ctx: &Context) -> StepResult<()>;

    /// Execute the step's main work and record results in `state`.
    async fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome>;

    /// Validate outputs after `execute` returned `Success`.
    fn validate_output(&self, ctx: &Context, state: &RunState) -> StepResult<()>;
}
