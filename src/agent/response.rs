//! Model response types

use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

/// Error types for model operations
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Malformed structured output: {0}")]
    MalformedOutput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Response from a language model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// The response content
    pub content: String,
}

fn fenced_block() -> Option<&'static Regex> {
    static FENCED: OnceLock<Option<Regex>> = OnceLock::new();
    FENCED
        .get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*\n(.*?)\n?```").ok())
        .as_ref()
}

impl AgentResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Locate the JSON document inside the response text
    ///
    /// Prefers a fenced code block, then falls back to the outermost
    /// `{ ... }` or `[ ... ]` span.
    pub fn json_block(&self) -> Option<&str> {
        if let Some(captures) = fenced_block().and_then(|re| re.captures(&self.content)) {
            if let Some(body) = captures.get(1) {
                return Some(body.as_str().trim());
            }
        }

        let text = self.content.trim();
        let start = text.find(['{', '['])?;
        let close = if text[start..].starts_with('{') { '}' } else { ']' };
        let end = text.rfind(close)?;
        (end > start).then(|| &text[start..=end])
    }

    /// Deserialize the JSON document embedded in the response
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, AgentError> {
        let block = self
            .json_block()
            .ok_or_else(|| AgentError::MalformedOutput("no JSON found in response".to_string()))?;
        serde_json::from_str(block).map_err(|e| AgentError::MalformedOutput(e.to_string()))
    }
}
