//! Compiled pipeline - the program-counter interpreter

use crate::core::{
    context::StepContext,
    error::{PipelineError, StepError},
    schema::Schema,
    step::{step_fn, Flow, StepDescriptor, StepFn},
};
use crate::execution::events::{EventHandler, ExecutionEvent, RunTrace, StepOutcome, StepRecord};
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Frozen pipeline definition
pub(crate) struct Program {
    pub(crate) name: String,
    pub(crate) schema: Arc<dyn Schema>,
    pub(crate) steps: Arc<[StepDescriptor]>,
    pub(crate) labels: Arc<HashMap<String, usize>>,
    pub(crate) handlers: Vec<EventHandler>,
    pub(crate) max_steps: Option<usize>,
}

/// An immutable, reusable pipeline produced by `Pipeline::compile`
///
/// Cloning shares the compiled program. Every invocation owns its own
/// program counter, current value and Initial Context, so one compiled
/// pipeline can serve many concurrent invocations.
#[derive(Clone)]
pub struct CompiledPipeline {
    program: Arc<Program>,
}

impl CompiledPipeline {
    pub(crate) fn new(program: Program) -> Self {
        Self {
            program: Arc::new(program),
        }
    }

    pub fn name(&self) -> &str {
        &self.program.name
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.program.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.program.steps.is_empty()
    }

    /// Label -> step index table
    pub fn labels(&self) -> &HashMap<String, usize> {
        &self.program.labels
    }

    pub fn steps(&self) -> &[StepDescriptor] {
        &self.program.steps
    }

    /// Copy of this pipeline that also reports its events to `handler`
    pub fn with_event_handler(&self, handler: EventHandler) -> Self {
        let program = &self.program;
        let mut handlers = program.handlers.clone();
        handlers.push(handler);
        Self::new(Program {
            name: program.name.clone(),
            schema: Arc::clone(&program.schema),
            steps: Arc::clone(&program.steps),
            labels: Arc::clone(&program.labels),
            handlers,
            max_steps: program.max_steps,
        })
    }

    /// Validate `input` against the schema and run every step
    pub async fn invoke(&self, input: Value) -> Result<Value, PipelineError> {
        self.execute(input, 0, None).await
    }

    /// Like [`invoke`](Self::invoke), also returning the run trace
    pub async fn invoke_traced(&self, input: Value) -> Result<(Value, RunTrace), PipelineError> {
        let mut trace = RunTrace::new(Uuid::new_v4(), &self.program.name);
        let value = self.execute(input, 0, Some(&mut trace)).await?;
        Ok((value, trace))
    }

    /// Invoke with serde types on both ends
    pub async fn invoke_typed<I, O>(&self, input: &I) -> Result<O, PipelineError>
    where
        I: Serialize,
        O: DeserializeOwned,
    {
        let value = serde_json::to_value(input)?;
        let output = self.invoke(value).await?;
        Ok(serde_json::from_value(output)?)
    }

    pub(crate) async fn invoke_nested(&self, input: Value, depth: usize) -> Result<Value, PipelineError> {
        self.execute(input, depth, None).await
    }

    /// Use this pipeline as a step of another pipeline
    ///
    /// The current value becomes the nested run's input, and the nested
    /// run's output becomes the step result.
    pub fn as_step_fn(&self) -> StepFn {
        let pipeline = self.clone();
        step_fn(move |value, ctx| {
            let pipeline = pipeline.clone();
            async move {
                pipeline
                    .invoke_nested(value, ctx.depth() + 1)
                    .await
                    .map_err(|e| StepError::Nested(Box::new(e)))
            }
        })
    }

    fn emit(&self, event: ExecutionEvent) {
        for handler in &self.program.handlers {
            handler(event.clone());
        }
    }

    /// Step records are only collected when `trace` is given
    async fn execute(
        &self,
        input: Value,
        depth: usize,
        mut trace: Option<&mut RunTrace>,
    ) -> Result<Value, PipelineError> {
        let program = &self.program;
        let step_count = program.steps.len();
        let execution_id = trace.as_ref().map_or_else(Uuid::new_v4, |t| t.execution_id);

        let validated = program.schema.validate(input).map_err(|e| {
            warn!("Pipeline {} rejected input: {}", program.name, e);
            e
        })?;

        let ctx = StepContext::for_run(
            Arc::new(validated.clone()),
            Arc::clone(&program.labels),
            step_count,
            execution_id,
            depth,
        );

        info!("Starting pipeline: {} ({})", program.name, execution_id);
        self.emit(ExecutionEvent::RunStarted {
            execution_id,
            pipeline: program.name.clone(),
            depth,
        });

        let run_started = Instant::now();
        let mut pc = 0usize;
        let mut current = validated;
        let mut executed = 0usize;

        while pc < step_count {
            if let Some(limit) = program.max_steps {
                if executed >= limit {
                    error!("Pipeline {} exceeded step limit of {}", program.name, limit);
                    return Err(PipelineError::StepLimitExceeded(limit));
                }
            }
            executed += 1;

            let descriptor = &program.steps[pc];
            let name = descriptor.display_name(pc);

            debug!(">>>> Executing: {}", name);
            self.emit(ExecutionEvent::StepStarted {
                execution_id,
                position: pc,
                step: name.clone(),
            });

            let started_at = Utc::now();
            let started = Instant::now();
            let span = info_span!("step", pipeline = %program.name, step = %name, position = pc);
            let result = descriptor.step.run(current, &ctx.at(pc)).instrument(span).await;
            let elapsed = started.elapsed();
            debug!("<<<< {} duration: {:?}", name, elapsed);

            let mut record = StepRecord {
                position: pc,
                step: name.clone(),
                started_at,
                duration_ms: elapsed.as_millis() as u64,
                outcome: StepOutcome::Continued,
            };

            match result {
                Ok(Flow::Continue(value)) => {
                    record_step(&mut trace, record);
                    self.emit(ExecutionEvent::StepCompleted {
                        execution_id,
                        position: pc,
                        step: name,
                        duration: elapsed,
                    });
                    current = value;
                    pc += 1;
                }
                Ok(Flow::Jump { to, value }) => {
                    if to >= step_count {
                        error!("Step {} jumped out of range to {}", name, to);
                        return Err(PipelineError::JumpOutOfRange {
                            step: name,
                            target: to,
                            len: step_count,
                        });
                    }
                    info!("Goto: {} -> {}", name, program.steps[to].display_name(to));
                    record.outcome = StepOutcome::Jumped { to };
                    record_step(&mut trace, record);
                    self.emit(ExecutionEvent::StepCompleted {
                        execution_id,
                        position: pc,
                        step: name.clone(),
                        duration: elapsed,
                    });
                    self.emit(ExecutionEvent::Jumped {
                        execution_id,
                        step: name,
                        from: pc,
                        to,
                    });
                    current = value;
                    pc = to;
                }
                Err(err) => {
                    error!("Step {} failed: {}", name, err);
                    record.outcome = StepOutcome::Failed {
                        error: err.to_string(),
                    };
                    record_step(&mut trace, record);
                    self.emit(ExecutionEvent::StepFailed {
                        execution_id,
                        position: pc,
                        step: name.clone(),
                        error: err.to_string(),
                    });
                    return Err(PipelineError::from_step(name, pc, err));
                }
            }
        }

        if let Some(trace) = trace.as_mut() {
            trace.completed_at = Some(Utc::now());
        }
        let duration = run_started.elapsed();
        info!(
            "Pipeline execution finished: {} - {} step(s) in {:?}",
            program.name, executed, duration
        );
        self.emit(ExecutionEvent::RunCompleted {
            execution_id,
            pipeline: program.name.clone(),
            steps_executed: executed,
            duration,
        });

        Ok(current)
    }
}

fn record_step(trace: &mut Option<&mut RunTrace>, record: StepRecord) {
    if let Some(trace) = trace.as_mut() {
        trace.steps.push(record);
    }
}

impl std::fmt::Debug for CompiledPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledPipeline")
            .field("name", &self.program.name)
            .field("schema", &self.program.schema.name())
            .field("steps", &self.program.steps)
            .field("labels", &self.program.labels)
            .finish()
    }
}
