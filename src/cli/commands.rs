//! CLI command definitions

use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// Analyze an issue file
#[derive(Debug, Args, Clone)]
pub struct AnalyzeCommand {
    /// Path to the issue JSON file (`<KEY>.json`)
    #[arg(short, long)]
    pub issue: PathBuf,

    /// Which analysis to run
    #[arg(long, value_enum, default_value_t = AnalysisMode::Review)]
    pub mode: AnalysisMode,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Post the result back to the issue as a comment
    #[arg(long)]
    pub comment: bool,
}

/// Write answered questions back into an issue file
#[derive(Debug, Args, Clone)]
pub struct AnswerCommand {
    /// Path to the issue JSON file (`<KEY>.json`)
    #[arg(short, long)]
    pub issue: PathBuf,

    /// JSON array of `{question, answer, category}` objects
    #[arg(short, long)]
    pub answers: PathBuf,
}

/// Validate an analysis configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to configuration YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show the personas used for analysis
#[derive(Debug, Args, Clone)]
pub struct PersonasCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AnalysisMode {
    /// Multi-perspective review with questions and a summary
    Review,
    /// Per-persona research merged into an epic analysis
    Epic,
}
