//! Execution events and per-run traces

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Events that can occur during a pipeline run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        execution_id: Uuid,
        pipeline: String,
        depth: usize,
    },
    StepStarted {
        execution_id: Uuid,
        position: usize,
        step: String,
    },
    StepCompleted {
        execution_id: Uuid,
        position: usize,
        step: String,
        duration: Duration,
    },
    Jumped {
        execution_id: Uuid,
        step: String,
        from: usize,
        to: usize,
    },
    StepFailed {
        execution_id: Uuid,
        position: usize,
        step: String,
        error: String,
    },
    RunCompleted {
        execution_id: Uuid,
        pipeline: String,
        steps_executed: usize,
        duration: Duration,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// How a single step execution ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Continued,
    Jumped { to: usize },
    Failed { error: String },
}

/// One executed step in a run trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub position: usize,
    pub step: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Timeline of one pipeline invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTrace {
    pub execution_id: Uuid,
    pub pipeline: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepRecord>,
}

impl RunTrace {
    pub fn new(execution_id: Uuid, pipeline: impl Into<String>) -> Self {
        Self {
            execution_id,
            pipeline: pipeline.into(),
            started_at: Utc::now(),
            completed_at: None,
            steps: Vec::new(),
        }
    }

    /// Names of executed steps, in execution order
    pub fn executed(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.step.as_str()).collect()
    }

    /// How many times the step at `position` ran
    pub fn count(&self, position: usize) -> usize {
        self.steps.iter().filter(|s| s.position == position).count()
    }

    /// Number of jumps taken during the run
    pub fn jumps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Jumped { .. }))
            .count()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.duration_ms).sum()
    }
}
