//! Model client configuration

/// Default arguments for the `pi` runner in print mode
pub const DEFAULT_ARGS: [&str; 4] = ["--mode", "text", "--print", "--no-session"];

/// Configuration for a subprocess-backed model client
#[derive(Debug, Clone)]
pub struct AgentClientConfig {
    /// Path to the model runner executable
    ///
    /// If not provided, defaults to "pi" (assumes it's on PATH).
    pub command: Option<String>,

    /// Arguments passed before the prompt
    pub args: Vec<String>,

    /// Timeout for a single completion in seconds
    pub timeout_secs: u64,
}

impl Default for AgentClientConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: DEFAULT_ARGS.iter().map(|s| s.to_string()).collect(),
            timeout_secs: 600,
        }
    }
}

impl AgentClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
