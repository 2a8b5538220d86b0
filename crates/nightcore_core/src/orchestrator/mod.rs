//! Pipeline orchestrator for coordinating a run.
//!
//! A run is a selected range of three stages that communicate only through
//! the working directory. Each stage is a step that checks its
//! preconditions, executes, and records its results.
//!
//! # Architecture
//!
//! ```text
//! Pipeline
//!     ├── 1. Generate - audio variants from the effect app
//!     ├── 2. Render   - one video per variant
//!     └── 3. Publish  - uploads in release order
//! ```
//!
//! # Example
//!
//! ```ignore
//! use nightcore_core::orchestrator::{create_standard_pipeline, Context, RunState};
//!
//! let pipeline = create_standard_pipeline(generator, muxer, publisher);
//! let ctx = Context::new(workdir, settings, logger)?.with_params(params);
//! let mut state = RunState::new(&ctx.track_stem);
//!
//! let result = pipeline.run(&ctx, &mut state, StageSelection::all()).await?;
//! println!("Completed: {:?}", result.steps_completed);
//! ```

mod errors;
mod pipeline;
mod step;
pub mod steps;
mod types;

pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use pipeline::{Pipeline, PipelineRunResult};
pub use step::PipelineStep;
pub use steps::{GenerateStep, PublishStep, RenderStep};
pub use types::{Context, RunState, StageTiming, StepOutcome};

use crate::generator::VariantGenerator;
use crate::muxer::VideoMuxer;
use crate::publisher::Publisher;

/// Create a standard pipeline with all stages in order.
pub fn create_standard_pipeline(
    generator: VariantGenerator,
    muxer: VideoMuxer,
    publisher: Publisher,
) -> Pipeline {
    Pipeline::new()
        .with_step(GenerateStep::new(generator))
        .with_step(RenderStep::new(muxer))
        .with_step(PublishStep::new(publisher))
}
