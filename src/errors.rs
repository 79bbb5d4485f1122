//! Typed error hierarchy for the studio engine.
//!
//! Three top-level enums cover the three subsystems:
//! - `GenerationError`: code generation service boundary failures
//! - `StageError`: per-stage work failures, caught at the runner boundary
//! - `StudioError`: orchestrator and engine-level failures

use thiserror::Error;

/// Errors from the code generation boundary.
///
/// Every malformed or empty response from the generation service becomes one
/// of these; the orchestrator surfaces them as a Failed Coder stage and never
/// retries internally.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("AI failed to generate code files")]
    Empty,

    #[error("Malformed generation response: {reason}")]
    Malformed { reason: String },

    #[error("No JSON object found in generation output")]
    NoJson,

    #[error("Failed to spawn generation command '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Generation command exited with non-zero code {exit_code}")]
    NonZeroExit { exit_code: i32 },
}

/// Errors from a single stage's async work.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("{message}")]
    WorkFailed { message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StageError {
    /// The user-facing text logged and shown in the transcript on failure.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// Errors from the workflow orchestrator and engine surface.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("Unknown stage id: {0}")]
    UnknownStage(u32),

    #[error("Stage {id} ({name}) is not failed; only failed stages can be retried")]
    NotRetryable { id: u32, name: String },

    #[error("A workflow run is already in progress")]
    RunInProgress,

    #[error("No workflow run has been recorded yet")]
    NoRunRecorded,

    #[error("Invalid stage template: {0}")]
    InvalidTemplate(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
