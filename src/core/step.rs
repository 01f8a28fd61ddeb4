//! Step domain model

use crate::core::{context::StepContext, error::StepError};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Result type for step functions
pub type StepResult<T = Value> = Result<T, StepError>;

/// Boxed, sendable future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A plain async step: `(current value, context) -> next value`
pub type StepFn = Arc<dyn Fn(Value, StepContext) -> BoxFuture<'static, StepResult> + Send + Sync>;

/// An async guard: `(current value, context) -> bool`
pub type PredicateFn =
    Arc<dyn Fn(Value, StepContext) -> BoxFuture<'static, StepResult<bool>> + Send + Sync>;

/// An async label selector: `(current value, context) -> label`
pub type LabelFn =
    Arc<dyn Fn(Value, StepContext) -> BoxFuture<'static, StepResult<String>> + Send + Sync>;

/// What a step tells the interpreter to do next
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Replace the current value and advance to the next step
    Continue(Value),
    /// Move the program counter to `to` with `value` as the current value
    Jump { to: usize, value: Value },
}

impl Flow {
    pub fn value(&self) -> &Value {
        match self {
            Flow::Continue(value) | Flow::Jump { value, .. } => value,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Flow::Continue(value) | Flow::Jump { value, .. } => value,
        }
    }
}

/// A unit of work in a pipeline
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(&self, input: Value, ctx: &StepContext) -> StepResult<Flow>;
}

/// Wrap an async closure as a [`StepFn`]
pub fn step_fn<F, Fut>(f: F) -> StepFn
where
    F: Fn(Value, StepContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult> + Send + 'static,
{
    Arc::new(move |value: Value, ctx: StepContext| -> BoxFuture<'static, StepResult> {
        Box::pin(f(value, ctx))
    })
}

/// Wrap an async closure as a [`PredicateFn`]
pub fn predicate<F, Fut>(f: F) -> PredicateFn
where
    F: Fn(Value, StepContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult<bool>> + Send + 'static,
{
    Arc::new(move |value: Value, ctx: StepContext| -> BoxFuture<'static, StepResult<bool>> {
        Box::pin(f(value, ctx))
    })
}

/// Wrap an async closure as a [`LabelFn`]
pub fn label_fn<F, Fut>(f: F) -> LabelFn
where
    F: Fn(Value, StepContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult<String>> + Send + 'static,
{
    Arc::new(move |value: Value, ctx: StepContext| -> BoxFuture<'static, StepResult<String>> {
        Box::pin(f(value, ctx))
    })
}

/// Wrap an async closure over serde types as a [`StepFn`]
///
/// The current value is deserialized into `I` and the output serialized back.
pub fn typed_step<I, O, F, Fut>(f: F) -> StepFn
where
    I: DeserializeOwned,
    O: Serialize,
    F: Fn(I, StepContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult<O>> + Send + 'static,
{
    step_fn(move |value, ctx| {
        let pending = serde_json::from_value::<I>(value).map(|input| f(input, ctx));
        async move {
            let output = pending?.await?;
            Ok(serde_json::to_value(output)?)
        }
    })
}

/// Sequential step built from a [`StepFn`]
pub struct FnStep {
    f: StepFn,
}

impl FnStep {
    pub fn new(f: StepFn) -> Self {
        Self { f }
    }
}

#[async_trait]
impl Step for FnStep {
    async fn run(&self, input: Value, ctx: &StepContext) -> StepResult<Flow> {
        (self.f)(input, ctx.clone()).await.map(Flow::Continue)
    }
}

/// One entry of a compiled pipeline
#[derive(Clone)]
pub struct StepDescriptor {
    /// Optional label, usable as a jump target
    pub label: Option<String>,

    /// Kind of step (`then`, `parallel`, `branch`, ...)
    pub kind: &'static str,

    pub(crate) step: Arc<dyn Step>,
}

impl StepDescriptor {
    pub fn new(label: Option<String>, kind: &'static str, step: Arc<dyn Step>) -> Self {
        Self { label, kind, step }
    }

    /// Label, or a positional fallback when unlabeled
    pub fn display_name(&self, position: usize) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("step {}", position),
        }
    }
}

impl std::fmt::Debug for StepDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDescriptor")
            .field("label", &self.label)
            .field("kind", &self.kind)
            .finish()
    }
}
