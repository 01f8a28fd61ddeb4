//! Pipeline builder
//!
//! A [`Pipeline`] only accumulates step descriptors. Nothing runs until the
//! result of [`Pipeline::compile`] is invoked.

use crate::core::{
    context::StepContext,
    error::BuildError,
    schema::{AnySchema, Schema, TypedSchema},
    step::{predicate, step_fn, FnStep, LabelFn, PredicateFn, Step, StepDescriptor, StepFn, StepResult},
};
use crate::execution::control::{
    BranchArm, BranchStep, DoUntilStep, DoWhileStep, ForEachStep, GotoIfStep, GotoStep,
    ParallelMapStep, ParallelStep,
};
use crate::execution::events::{EventHandler, ExecutionEvent};
use crate::execution::executor::{CompiledPipeline, Program};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

/// Step waiting for `compile()`
enum Node {
    Ready {
        kind: &'static str,
        step: Arc<dyn Step>,
    },
    Branch(Vec<(PredicateFn, Pipeline)>),
    GotoIf {
        cond: PredicateFn,
        target: String,
        max_retries: usize,
    },
}

struct PendingStep {
    label: Option<String>,
    node: Node,
}

/// Guard list for [`Pipeline::branch`]
#[derive(Default)]
pub struct Branches {
    arms: Vec<(PredicateFn, Pipeline)>,
}

impl Branches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an arm evaluated after the ones already declared
    pub fn when(mut self, guard: PredicateFn, pipeline: Pipeline) -> Self {
        self.arms.push((guard, pipeline));
        self
    }

    /// Add an arm whose guard always holds
    pub fn otherwise(self, pipeline: Pipeline) -> Self {
        self.when(predicate(|_, _| async { Ok(true) }), pipeline)
    }

    pub fn len(&self) -> usize {
        self.arms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }
}

/// Pipeline definition under construction
pub struct Pipeline {
    name: String,
    schema: Arc<dyn Schema>,
    steps: Vec<PendingStep>,
    labels: HashMap<String, usize>,
    handlers: Vec<EventHandler>,
    max_steps: Option<usize>,
    error: Option<BuildError>,
}

impl Pipeline {
    /// Create a pipeline accepting any input
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_schema(name, AnySchema)
    }

    /// Create a pipeline whose input is checked by `schema`
    pub fn with_schema(name: impl Into<String>, schema: impl Schema + 'static) -> Self {
        Self {
            name: name.into(),
            schema: Arc::new(schema),
            steps: Vec::new(),
            labels: HashMap::new(),
            handlers: Vec::new(),
            max_steps: None,
            error: None,
        }
    }

    /// Create a pipeline whose input must deserialize into `T`
    pub fn typed<T>(name: impl Into<String>) -> Self
    where
        T: DeserializeOwned + Serialize + 'static,
    {
        Self::with_schema(name, TypedSchema::<T>::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn push(mut self, label: Option<String>, node: Node) -> Self {
        let position = self.steps.len();
        if let Some(label) = &label {
            if let Some(&first) = self.labels.get(label) {
                self.error.get_or_insert(BuildError::DuplicateLabel {
                    label: label.clone(),
                    first,
                    second: position,
                });
            } else {
                self.labels.insert(label.clone(), position);
            }
        }
        self.steps.push(PendingStep { label, node });
        self
    }

    fn push_ready(self, label: Option<String>, kind: &'static str, step: impl Step + 'static) -> Self {
        self.push(
            label,
            Node::Ready {
                kind,
                step: Arc::new(step),
            },
        )
    }

    /// Append a sequential step
    pub fn then<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Value, StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        self.push_ready(None, "then", FnStep::new(step_fn(f)))
    }

    /// Append a sequential step that can be targeted by jumps
    pub fn then_labeled<F, Fut>(self, label: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        self.push_ready(Some(label.into()), "then", FnStep::new(step_fn(f)))
    }

    /// Append an already wrapped step function
    pub fn then_fn(self, f: StepFn) -> Self {
        self.push_ready(None, "then", FnStep::new(f))
    }

    /// Append a hand-written [`Step`]
    pub fn then_step(self, label: Option<&str>, step: impl Step + 'static) -> Self {
        self.push_ready(label.map(str::to_string), "custom", step)
    }

    /// Run a compiled pipeline as one step of this one
    pub fn then_pipeline(self, label: impl Into<String>, pipeline: &CompiledPipeline) -> Self {
        self.push_ready(Some(label.into()), "pipeline", FnStep::new(pipeline.as_step_fn()))
    }

    /// Label the most recently appended step
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        let Some(position) = self.steps.len().checked_sub(1) else {
            self.error.get_or_insert(BuildError::LabelWithoutStep { label });
            return self;
        };
        if let Some(&first) = self.labels.get(&label) {
            if first != position {
                self.error.get_or_insert(BuildError::DuplicateLabel {
                    label,
                    first,
                    second: position,
                });
            }
            return self;
        }
        if let Some(old) = self.steps[position].label.replace(label.clone()) {
            self.labels.remove(&old);
        }
        self.labels.insert(label, position);
        self
    }

    /// Ordered fan-out: the result is an array of branch outputs by position
    pub fn parallel(self, branches: Vec<StepFn>) -> Self {
        self.push_ready(None, "parallel", ParallelStep::new(branches))
    }

    /// Named fan-out: the result is an object keyed by branch name
    pub fn parallel_map<S>(mut self, branches: impl IntoIterator<Item = (S, StepFn)>) -> Self
    where
        S: Into<String>,
    {
        let position = self.steps.len();
        let mut seen = HashSet::new();
        let mut named = Vec::new();
        for (name, branch) in branches {
            let name = name.into();
            if !seen.insert(name.clone()) {
                self.error
                    .get_or_insert(BuildError::DuplicateBranchName { name: name.clone(), step: position });
            }
            named.push((name, branch));
        }
        self.push_ready(None, "parallel_map", ParallelMapStep::new(named))
    }

    /// Dispatch to the first sub-pipeline whose guard holds
    pub fn branch(self, branches: Branches) -> Self {
        self.push(None, Node::Branch(branches.arms))
    }

    /// Pre-test loop
    pub fn do_while(self, cond: PredicateFn, action: StepFn) -> Self {
        self.push_ready(None, "do_while", DoWhileStep::new(cond, action))
    }

    /// Post-test loop
    pub fn do_until(self, cond: PredicateFn, action: StepFn) -> Self {
        self.push_ready(None, "do_until", DoUntilStep::new(cond, action))
    }

    /// Jump to `target` while `cond` holds, at most `max_retries` times per run
    pub fn goto_if(self, cond: PredicateFn, target: impl Into<String>, max_retries: usize) -> Self {
        self.push(
            None,
            Node::GotoIf {
                cond,
                target: target.into(),
                max_retries,
            },
        )
    }

    /// Jump to the label computed by `select`
    pub fn goto_step(self, select: LabelFn) -> Self {
        self.push_ready(None, "goto_step", GotoStep::new(select))
    }

    /// Map every element of an array value concurrently
    pub fn for_each(self, item: StepFn) -> Self {
        self.push_ready(None, "for_each", ForEachStep::new(item))
    }

    /// Register an observability handler
    pub fn on_event<F>(mut self, handler: F) -> Self
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Fail a run after `limit` step executions
    pub fn max_steps(mut self, limit: usize) -> Self {
        self.max_steps = Some(limit);
        self
    }

    /// Like [`max_steps`](Self::max_steps); `None` removes the limit
    pub fn step_limit(mut self, limit: Option<usize>) -> Self {
        self.max_steps = limit;
        self
    }

    /// Freeze the definition into an executable pipeline
    pub fn compile(self) -> Result<CompiledPipeline, BuildError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut steps = Vec::with_capacity(self.steps.len());
        for (position, pending) in self.steps.into_iter().enumerate() {
            let (kind, step): (&'static str, Arc<dyn Step>) = match pending.node {
                Node::Ready { kind, step } => (kind, step),
                Node::Branch(arms) => {
                    let mut compiled = Vec::with_capacity(arms.len());
                    for (branch, (guard, pipeline)) in arms.into_iter().enumerate() {
                        let pipeline = pipeline.compile().map_err(|e| BuildError::SubPipeline {
                            step: position,
                            branch,
                            source: Box::new(e),
                        })?;
                        compiled.push(BranchArm { guard, pipeline });
                    }
                    ("branch", Arc::new(BranchStep::new(compiled)))
                }
                Node::GotoIf {
                    cond,
                    target,
                    max_retries,
                } => {
                    let index = *self.labels.get(&target).ok_or_else(|| BuildError::UnknownLabel {
                        label: target.clone(),
                        step: position,
                    })?;
                    ("goto_if", Arc::new(GotoIfStep::new(cond, target, index, max_retries)))
                }
            };
            steps.push(StepDescriptor::new(pending.label, kind, step));
        }

        Ok(CompiledPipeline::new(Program {
            name: self.name,
            schema: self.schema,
            steps: steps.into(),
            labels: Arc::new(self.labels),
            handlers: self.handlers,
            max_steps: self.max_steps,
        }))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("schema", &self.schema.name())
            .field("steps", &self.steps.len())
            .field("labels", &self.labels)
            .finish()
    }
}
