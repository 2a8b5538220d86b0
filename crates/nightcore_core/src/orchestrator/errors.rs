//! Error types for the orchestrator pipeline.
//!
//! Errors carry context that chains through layers:
//! Run → Step → Operation → Detail

use thiserror::Error;

use crate::generator::GeneratorError;
use crate::muxer::MuxError;
use crate::publisher::PublishError;
use crate::workdir::{DirectoryError, NamingError};

/// Top-level pipeline error with run context.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A static precondition failed before any stage started.
    #[error("Run '{run_name}' failed validation at step '{step_name}': {source}")]
    PreflightFailed {
        run_name: String,
        step_name: String,
        #[source]
        source: StepError,
    },

    /// A step failed during execution.
    #[error("Run '{run_name}' failed at step '{step_name}': {source}")]
    StepFailed {
        run_name: String,
        step_name: String,
        #[source]
        source: StepError,
    },
}

impl PipelineError {
    pub fn preflight_failed(
        run_name: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
    ) -> Self {
        Self::PreflightFailed {
            run_name: run_name.into(),
            step_name: step_name.into(),
            source,
        }
    }

    pub fn step_failed(
        run_name: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
    ) -> Self {
        Self::StepFailed {
            run_name: run_name.into(),
            step_name: step_name.into(),
            source,
        }
    }

    /// Process exit code: 2 for usage/precondition problems, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::PreflightFailed { .. } => 2,
            PipelineError::StepFailed { .. } => 1,
        }
    }
}

/// Error from a pipeline step with operation context.
#[derive(Error, Debug)]
pub enum StepError {
    /// Output validation failed.
    #[error("Output validation failed: {0}")]
    InvalidOutput(String),

    /// A precondition was not met.
    #[error("Precondition not met: {0}")]
    PreconditionFailed(String),

    /// Some units of a fan-out stage failed; their siblings' outputs remain.
    #[error("{failed} of {total} {what} failed")]
    UnitsFailed {
        what: String,
        failed: usize,
        total: usize,
    },

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error(transparent)]
    Mux(#[from] MuxError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl StepError {
    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }

    pub fn units_failed(what: impl Into<String>, failed: usize, total: usize) -> Self {
        Self::UnitsFailed {
            what: what.into(),
            failed,
            total,
        }
    }
}

/// Result type for step operations.
pub type StepResult<T> = Result<T, StepError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SelectionError;

    #[test]
    fn step_error_displays_context() {
        let err = StepError::units_failed("videos", 1, 4);
        assert_eq!(err.to_string(), "1 of 4 videos failed");
    }

    #[test]
    fn pipeline_error_chains_context() {
        let step_err = StepError::precondition_failed("no speeds given");
        let pipeline_err = PipelineError::step_failed("Artist - Song", "Generate", step_err);

        let msg = pipeline_err.to_string();
        assert!(msg.contains("Artist - Song"));
        assert!(msg.contains("Generate"));
        assert!(msg.contains("no speeds given"));
    }

    #[test]
    fn preflight_failures_are_usage_errors() {
        let limit = PublishError::Limit(SelectionError::LimitOutOfRange {
            value: 9,
            available: 3,
        });
        let preflight = PipelineError::preflight_failed("run", "Publish", limit.into());
        assert_eq!(preflight.exit_code(), 2);

        let failed = PipelineError::step_failed("run", "Render", StepError::units_failed("videos", 1, 2));
        assert_eq!(failed.exit_code(), 1);
    }
}
