//! Control-flow step kinds - fan-out, branching, loops and jumps
//!
//! Each construct is a single [`Step`] that the interpreter runs like any
//! other. Jumps are expressed by returning [`Flow::Jump`].

use crate::core::{
    context::StepContext,
    error::StepError,
    schema::json_type_name,
    step::{BoxFuture, Flow, LabelFn, PredicateFn, Step, StepFn, StepResult},
};
use crate::execution::executor::CompiledPipeline;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Run named tasks concurrently and collect their outputs in input order
///
/// The first failure is returned tagged with its branch name. Returning drops
/// the `JoinSet`, which aborts every task still in flight.
async fn join_branches(tasks: Vec<(String, BoxFuture<'static, StepResult>)>) -> StepResult<Vec<Value>> {
    let names: Vec<String> = tasks.iter().map(|(name, _)| name.clone()).collect();
    let mut outputs: Vec<Option<Value>> = vec![None; tasks.len()];
    let mut set = JoinSet::new();

    for (index, (_, task)) in tasks.into_iter().enumerate() {
        set.spawn(async move { (index, task.await) });
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, Ok(value))) => outputs[index] = Some(value),
            Ok((index, Err(error))) => {
                warn!("Branch '{}' failed, aborting {} sibling(s)", names[index], set.len());
                return Err(StepError::Branch {
                    branch: names[index].clone(),
                    source: Box::new(error),
                });
            }
            Err(join_error) => return Err(StepError::Panicked(join_error.to_string())),
        }
    }

    outputs
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| StepError::Panicked("branch finished without a result".to_string()))
}

/// Ordered fan-out: output `i` is branch `i`'s result
pub struct ParallelStep {
    branches: Vec<StepFn>,
}

impl ParallelStep {
    pub fn new(branches: Vec<StepFn>) -> Self {
        Self { branches }
    }
}

#[async_trait]
impl Step for ParallelStep {
    async fn run(&self, input: Value, ctx: &StepContext) -> StepResult<Flow> {
        let tasks = self
            .branches
            .iter()
            .enumerate()
            .map(|(i, branch)| (format!("#{}", i), branch(input.clone(), ctx.clone())))
            .collect();
        let outputs = join_branches(tasks).await?;
        Ok(Flow::Continue(Value::Array(outputs)))
    }
}

/// Named fan-out: the result object has exactly the branch names as keys
pub struct ParallelMapStep {
    branches: Vec<(String, StepFn)>,
}

impl ParallelMapStep {
    pub fn new(branches: Vec<(String, StepFn)>) -> Self {
        Self { branches }
    }
}

#[async_trait]
impl Step for ParallelMapStep {
    async fn run(&self, input: Value, ctx: &StepContext) -> StepResult<Flow> {
        let tasks = self
            .branches
            .iter()
            .map(|(name, branch)| (name.clone(), branch(input.clone(), ctx.clone())))
            .collect();
        let outputs = join_branches(tasks).await?;

        let object: Map<String, Value> = self
            .branches
            .iter()
            .map(|(name, _)| name.clone())
            .zip(outputs)
            .collect();
        Ok(Flow::Continue(Value::Object(object)))
    }
}

/// Concurrent per-element map over an array value
pub struct ForEachStep {
    item: StepFn,
}

impl ForEachStep {
    pub fn new(item: StepFn) -> Self {
        Self { item }
    }
}

#[async_trait]
impl Step for ForEachStep {
    async fn run(&self, input: Value, ctx: &StepContext) -> StepResult<Flow> {
        let items = match input {
            Value::Array(items) => items,
            other => return Err(StepError::NotAnArray(json_type_name(&other))),
        };

        let tasks = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| (format!("item {}", i), (self.item)(item, ctx.clone())))
            .collect();
        let outputs = join_branches(tasks).await?;
        Ok(Flow::Continue(Value::Array(outputs)))
    }
}

/// A guarded arm of a branch step
pub struct BranchArm {
    pub guard: PredicateFn,
    pub pipeline: CompiledPipeline,
}

/// Dispatch to the first arm whose guard holds
///
/// The chosen sub-pipeline runs as a nested execution whose Initial Context
/// is the current value.
pub struct BranchStep {
    arms: Vec<BranchArm>,
}

impl BranchStep {
    pub fn new(arms: Vec<BranchArm>) -> Self {
        Self { arms }
    }
}

#[async_trait]
impl Step for BranchStep {
    async fn run(&self, input: Value, ctx: &StepContext) -> StepResult<Flow> {
        for (index, arm) in self.arms.iter().enumerate() {
            if (arm.guard)(input.clone(), ctx.clone()).await? {
                debug!("Branch {} matched, entering '{}'", index, arm.pipeline.name());
                return arm
                    .pipeline
                    .invoke_nested(input, ctx.depth() + 1)
                    .await
                    .map(Flow::Continue)
                    .map_err(|e| StepError::Nested(Box::new(e)));
            }
        }
        Err(StepError::NoBranchMatched)
    }
}

/// Pre-test loop: `while cond { value = action(value) }`
pub struct DoWhileStep {
    cond: PredicateFn,
    action: StepFn,
}

impl DoWhileStep {
    pub fn new(cond: PredicateFn, action: StepFn) -> Self {
        Self { cond, action }
    }
}

#[async_trait]
impl Step for DoWhileStep {
    async fn run(&self, input: Value, ctx: &StepContext) -> StepResult<Flow> {
        let mut current = input;
        let mut iterations = 0usize;
        while (self.cond)(current.clone(), ctx.clone()).await? {
            current = (self.action)(current, ctx.clone()).await?;
            iterations += 1;
        }
        debug!("do_while finished after {} iteration(s)", iterations);
        Ok(Flow::Continue(current))
    }
}

/// Post-test loop: `do { value = action(value) } until cond`
pub struct DoUntilStep {
    cond: PredicateFn,
    action: StepFn,
}

impl DoUntilStep {
    pub fn new(cond: PredicateFn, action: StepFn) -> Self {
        Self { cond, action }
    }
}

#[async_trait]
impl Step for DoUntilStep {
    async fn run(&self, input: Value, ctx: &StepContext) -> StepResult<Flow> {
        let mut current = input;
        let mut iterations = 0usize;
        loop {
            current = (self.action)(current, ctx.clone()).await?;
            iterations += 1;
            if (self.cond)(current.clone(), ctx.clone()).await? {
                break;
            }
        }
        debug!("do_until finished after {} iteration(s)", iterations);
        Ok(Flow::Continue(current))
    }
}

/// Bounded conditional jump to a label resolved at compile time
///
/// The jump budget belongs to this step for the whole run: re-entering the
/// step does not reset it.
pub struct GotoIfStep {
    cond: PredicateFn,
    label: String,
    target: usize,
    max_retries: usize,
}

impl GotoIfStep {
    pub fn new(cond: PredicateFn, label: String, target: usize, max_retries: usize) -> Self {
        Self {
            cond,
            label,
            target,
            max_retries,
        }
    }
}

#[async_trait]
impl Step for GotoIfStep {
    async fn run(&self, input: Value, ctx: &StepContext) -> StepResult<Flow> {
        if !(self.cond)(input.clone(), ctx.clone()).await? {
            return Ok(Flow::Continue(input));
        }

        if ctx.try_claim_jump(self.max_retries) {
            debug!(
                "goto_if -> '{}' (jump {}/{})",
                self.label,
                ctx.jumps_taken(),
                self.max_retries
            );
            Ok(Flow::Jump {
                to: self.target,
                value: input,
            })
        } else {
            warn!(
                "goto_if '{}' exhausted {} retries, continuing",
                self.label, self.max_retries
            );
            Ok(Flow::Continue(input))
        }
    }
}

/// Unconditional jump to a label computed at run time
pub struct GotoStep {
    select: LabelFn,
}

impl GotoStep {
    pub fn new(select: LabelFn) -> Self {
        Self { select }
    }
}

#[async_trait]
impl Step for GotoStep {
    async fn run(&self, input: Value, ctx: &StepContext) -> StepResult<Flow> {
        let label = (self.select)(input.clone(), ctx.clone()).await?;
        match ctx.label_index(&label) {
            Some(to) => Ok(Flow::Jump { to, value: input }),
            None => Err(StepError::UnresolvedLabel(label)),
        }
    }
}
