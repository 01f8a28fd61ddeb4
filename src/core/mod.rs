//! Core domain models for pipelines
//!
//! This module defines the builder, the step model, the per-run context,
//! input schemas and the error types shared by the engine.

pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod schema;
pub mod step;

pub use context::*;
pub use error::*;
pub use pipeline::*;
pub use schema::*;
pub use step::*;
