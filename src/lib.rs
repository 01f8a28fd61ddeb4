//! issue-pipeline - A workflow engine for multi-persona issue analysis

pub mod agent;
pub mod analysis;
pub mod cli;
pub mod core;
pub mod execution;
pub mod tracker;

// Re-export commonly used types
pub use agent::{AgentClientConfig, AgentError, AgentResponse, CommandModel, LanguageModel};
pub use analysis::{AnalysisResult, AnalysisState, ContextStore, EpicAnalysis, InMemoryContextStore, IssueSummary};
pub use crate::core::config::AnalysisConfig;
pub use crate::core::{BuildError, Branches, Flow, Pipeline, PipelineError, StepContext, StepError, ValidationError};
pub use execution::{CompiledPipeline, ExecutionEvent, RunTrace};
pub use tracker::{Issue, JsonFileTracker, TicketTracker};
