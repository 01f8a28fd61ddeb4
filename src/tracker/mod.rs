//! Ticket tracker clients used by the orchestration layer

pub mod file;
pub mod memory;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use file::JsonFileTracker;
pub use memory::InMemoryTracker;
pub use types::{Attachment, Comment, Issue, IssueFields, Transition};

/// Author recorded on comments written by this tool
pub const COMMENT_AUTHOR: &str = "issue-pipeline";

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Issue not found: {0}")]
    NotFound(String),

    #[error("Issue {key} has no transition named '{transition}'")]
    UnknownTransition { key: String, transition: String },

    #[error("Invalid field update: {0}")]
    InvalidUpdate(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Operations the analysis needs from an issue tracker
#[async_trait]
pub trait TicketTracker: Send + Sync {
    async fn get_issue(&self, key: &str) -> Result<Issue, TrackerError>;

    /// Merge `fields` (a JSON object) into the issue
    async fn update_issue(&self, key: &str, fields: Value) -> Result<(), TrackerError>;

    async fn add_comment(&self, key: &str, body: &str) -> Result<Comment, TrackerError>;

    /// Apply the transition with the given name
    async fn transition_issue(&self, key: &str, transition: &str) -> Result<(), TrackerError>;

    async fn add_attachment(&self, key: &str, name: &str, bytes: Vec<u8>) -> Result<Attachment, TrackerError>;
}
