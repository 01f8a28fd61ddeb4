//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{AnalyzeCommand, AnswerCommand, PersonasCommand, ValidateCommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Multi-persona issue analysis powered by a language model
#[derive(Debug, Parser, Clone)]
#[command(name = "issue-pipeline")]
#[command(author = "Pipeline Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Analyze tracker issues from several expert perspectives", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to analysis configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Analyze an issue file
    Analyze(AnalyzeCommand),

    /// Write answered questions back into an issue file
    Answer(AnswerCommand),

    /// Validate an analysis configuration
    Validate(ValidateCommand),

    /// Show the personas used for analysis
    Personas(PersonasCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
