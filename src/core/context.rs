//! Step context - the read-only view every step receives alongside its value

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Execution context for one step of a pipeline run
///
/// Holds the Initial Context (the validated input of the run), the label
/// table and per-run bookkeeping. Cloning is cheap; everything is shared.
#[derive(Debug, Clone)]
pub struct StepContext {
    /// Validated input captured at the start of the run
    initial: Arc<Value>,

    /// Label -> step index, frozen at compile time
    labels: Arc<HashMap<String, usize>>,

    /// Jump counters, one slot per step, private to this run
    jump_counts: Arc<[AtomicUsize]>,

    /// Index of the step currently executing
    position: usize,

    /// Identifier of this run
    execution_id: Uuid,

    /// Nesting depth (0 for a top-level run, +1 per branch sub-pipeline)
    depth: usize,
}

impl StepContext {
    pub(crate) fn for_run(
        initial: Arc<Value>,
        labels: Arc<HashMap<String, usize>>,
        step_count: usize,
        execution_id: Uuid,
        depth: usize,
    ) -> Self {
        let jump_counts: Arc<[AtomicUsize]> =
            (0..step_count).map(|_| AtomicUsize::new(0)).collect();
        Self {
            initial,
            labels,
            jump_counts,
            position: 0,
            execution_id,
            depth,
        }
    }

    /// Context for running a step outside of any compiled pipeline
    pub fn standalone(initial: Value) -> Self {
        Self::for_run(
            Arc::new(initial),
            Arc::new(HashMap::new()),
            1,
            Uuid::new_v4(),
            0,
        )
    }

    /// The Initial Context of this run
    pub fn initial(&self) -> &Value {
        &self.initial
    }

    /// Shared handle to the Initial Context
    pub fn initial_arc(&self) -> Arc<Value> {
        Arc::clone(&self.initial)
    }

    /// Resolve a label to its step index
    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn at(&self, position: usize) -> Self {
        let mut ctx = self.clone();
        ctx.position = position;
        ctx
    }

    /// Jumps taken so far by the current step during this run
    pub fn jumps_taken(&self) -> usize {
        self.jump_counts
            .get(self.position)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Claim one jump for the current step if fewer than `limit` were taken
    pub(crate) fn try_claim_jump(&self, limit: usize) -> bool {
        match self.jump_counts.get(self.position) {
            Some(counter) => counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |taken| {
                    (taken < limit).then_some(taken + 1)
                })
                .is_ok(),
            None => false,
        }
    }
}
