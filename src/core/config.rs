//! Analysis configuration from YAML

use crate::agent::{client::DEFAULT_ARGS, AgentClientConfig};
use crate::analysis::memory::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::analysis::personas::{Persona, PersonaKind, PersonaSet};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Language model runner
    #[serde(default)]
    pub model: ModelConfig,

    /// Persona overrides keyed by `business_analyst`, `architect`, `developer` or `qa`
    #[serde(default)]
    pub personas: BTreeMap<String, Persona>,

    /// Context store settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Engine limits
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the model executable (defaults to "pi")
    #[serde(default)]
    pub command: Option<String>,

    /// Arguments placed before the prompt
    #[serde(default = "default_model_args")]
    pub args: Vec<String>,

    /// Timeout per completion (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model_args() -> Vec<String> {
    DEFAULT_ARGS.iter().map(|s| s.to_string()).collect()
}

fn default_timeout_secs() -> u64 {
    600
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: default_model_args(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Text files loaded into the context store before analysis
    #[serde(default)]
    pub seed_files: Vec<PathBuf>,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            seed_files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum step executions per pipeline run (unlimited when absent)
    #[serde(default)]
    pub max_steps: Option<usize>,
}

impl AnalysisConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for key in self.personas.keys() {
            if PersonaKind::from_key(key).is_none() {
                anyhow::bail!(
                    "Unknown persona '{}' (expected one of: business_analyst, architect, developer, qa)",
                    key
                );
            }
        }

        if self.model.timeout_secs == 0 {
            anyhow::bail!("model.timeout_secs must be greater than zero");
        }

        if let Some(command) = &self.model.command {
            if command.trim().is_empty() {
                anyhow::bail!("model.command must not be empty");
            }
        }

        if self.memory.chunk_size == 0 {
            anyhow::bail!("memory.chunk_size must be greater than zero");
        }
        if self.memory.chunk_overlap >= self.memory.chunk_size {
            anyhow::bail!(
                "memory.chunk_overlap ({}) must be smaller than memory.chunk_size ({})",
                self.memory.chunk_overlap,
                self.memory.chunk_size
            );
        }

        for path in &self.memory.seed_files {
            if !path.exists() {
                anyhow::bail!("Seed file doesn't exist: {}", path.display());
            }
        }

        if self.engine.max_steps == Some(0) {
            anyhow::bail!("engine.max_steps must be greater than zero");
        }

        Ok(())
    }

    /// Built-in personas with configured overrides applied
    pub fn persona_set(&self) -> PersonaSet {
        let mut set = PersonaSet::default();
        for (key, persona) in &self.personas {
            if let Some(kind) = PersonaKind::from_key(key) {
                set.set(kind, persona.clone());
            }
        }
        set
    }

    /// Model client configuration
    pub fn agent_config(&self) -> AgentClientConfig {
        let mut config = AgentClientConfig::new()
            .with_args(self.model.args.clone())
            .with_timeout(self.model.timeout_secs);
        if let Some(command) = &self.model.command {
            config = config.with_command(command.clone());
        }
        config
    }
}
