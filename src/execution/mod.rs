//! Pipeline execution: the interpreter and its control-flow step kinds

pub mod control;
pub mod events;
pub mod executor;

pub use events::{EventHandler, ExecutionEvent, RunTrace, StepOutcome, StepRecord};
pub use executor::CompiledPipeline;
