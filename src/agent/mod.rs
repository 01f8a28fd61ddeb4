//! Language model clients used by the analysis steps

pub mod client;
pub mod response;
pub mod subprocess_client;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

pub use client::AgentClientConfig;
pub use response::{AgentError, AgentResponse};
pub use subprocess_client::SubprocessClient;

/// Trait for model completion - allows for different implementations
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a prompt and return the full response
    async fn complete(&self, prompt: &str) -> Result<AgentResponse, AgentError>;
}

/// Model backed by a CLI runner
#[derive(Debug, Clone)]
pub struct CommandModel {
    subprocess_client: SubprocessClient,
}

impl CommandModel {
    /// Create a model client from configuration
    ///
    /// `config.command` defaults to "pi" when not provided.
    pub fn new(config: AgentClientConfig) -> Self {
        let command = config.command.unwrap_or_else(|| "pi".to_string());
        Self {
            subprocess_client: SubprocessClient::new(command, config.args, config.timeout_secs),
        }
    }

    pub fn command(&self) -> &str {
        self.subprocess_client.command()
    }
}

#[async_trait]
impl LanguageModel for CommandModel {
    async fn complete(&self, prompt: &str) -> Result<AgentResponse, AgentError> {
        let content = self.subprocess_client.execute(prompt).await?;
        Ok(AgentResponse::new(content))
    }
}

/// Ask for a JSON answer shaped like `shape` and deserialize it
pub async fn complete_structured<T>(
    model: &dyn LanguageModel,
    prompt: &str,
    shape: &str,
) -> Result<T, AgentError>
where
    T: DeserializeOwned,
{
    let prompt = format!(
        "{}\n\nRespond only with a JSON object of this shape, with no commentary:\n{}",
        prompt.trim_end(),
        shape
    );
    let response = model.complete(&prompt).await?;
    debug!("Structured response: {} bytes", response.content.len());
    response.parse_json()
}
