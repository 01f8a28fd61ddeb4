//! Error types for building and running pipelines

use crate::agent::AgentError;
use crate::core::schema::ValidationError;
use thiserror::Error;

/// Error raised while assembling a pipeline, surfaced by `compile()`
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Duplicate label '{label}' at step {second} (first declared at step {first})")]
    DuplicateLabel {
        label: String,
        first: usize,
        second: usize,
    },

    #[error("Label '{label}' was applied before any step")]
    LabelWithoutStep { label: String },

    #[error("Step {step} jumps to unknown label '{label}'")]
    UnknownLabel { label: String, step: usize },

    #[error("Duplicate branch name '{name}' in step {step}")]
    DuplicateBranchName { name: String, step: usize },

    #[error("Branch {branch} of step {step} failed to compile: {source}")]
    SubPipeline {
        step: usize,
        branch: usize,
        #[source]
        source: Box<BuildError>,
    },
}

/// Error raised by a single step
#[derive(Debug, Error)]
pub enum StepError {
    #[error("{0}")]
    Message(String),

    #[error("No branch matched")]
    NoBranchMatched,

    #[error("Unresolved jump label '{0}'")]
    UnresolvedLabel(String),

    #[error("Expected an array but found {0}")]
    NotAnArray(&'static str),

    #[error("Branch '{branch}' failed: {source}")]
    Branch {
        branch: String,
        #[source]
        source: Box<StepError>,
    },

    #[error("Concurrent task aborted: {0}")]
    Panicked(String),

    #[error("Nested pipeline failed: {0}")]
    Nested(#[source] Box<PipelineError>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StepError {
    /// Create a step error from a plain message
    pub fn msg(message: impl Into<String>) -> Self {
        StepError::Message(message.into())
    }

    /// Strip fan-out and nesting wrappers to reach the error a step actually raised
    ///
    /// A nested run that ended in a control error (branch exhaustion, an
    /// unresolved label, a step limit) stays `Nested`; use
    /// [`PipelineError::innermost`] to reach it.
    pub fn root(&self) -> &StepError {
        match self {
            StepError::Branch { source, .. } => source.root(),
            StepError::Nested(inner) => match inner.as_ref() {
                PipelineError::Step { source, .. } => source.root(),
                _ => self,
            },
            other => other,
        }
    }
}

/// Error returned by a pipeline invocation
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Step '{step}' (#{position}) failed: {source}")]
    Step {
        step: String,
        position: usize,
        #[source]
        source: StepError,
    },

    #[error("No branch matched in step '{step}' (#{position})")]
    BranchExhausted { step: String, position: usize },

    #[error("Step '{step}' (#{position}) jumped to unresolved label '{label}'")]
    UnresolvedLabel {
        step: String,
        position: usize,
        label: String,
    },

    #[error("Step '{step}' jumped to index {target} outside of {len} steps")]
    JumpOutOfRange {
        step: String,
        target: usize,
        len: usize,
    },

    #[error("Exceeded step limit of {0} executions")]
    StepLimitExceeded(usize),

    #[error("Failed to convert pipeline value: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Classify a step failure raised at `position`
    pub(crate) fn from_step(step: String, position: usize, error: StepError) -> Self {
        match error {
            StepError::NoBranchMatched => PipelineError::BranchExhausted { step, position },
            StepError::UnresolvedLabel(label) => PipelineError::UnresolvedLabel {
                step,
                position,
                label,
            },
            source => PipelineError::Step {
                step,
                position,
                source,
            },
        }
    }

    /// The failure of the most deeply nested run, looking through fan-out
    /// branches and sub-pipelines
    pub fn innermost(&self) -> &PipelineError {
        match self {
            PipelineError::Step { source, .. } => match source.root() {
                StepError::Nested(inner) => inner.innermost(),
                _ => self,
            },
            other => other,
        }
    }
}
