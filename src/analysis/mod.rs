//! Orchestration layer: persona analyses built on the pipeline engine

pub mod epic;
pub mod memory;
pub mod personas;
pub mod research;
pub mod review;
pub mod types;
pub mod updater;

pub use epic::{epic_pipeline, merge_research, researchers};
pub use memory::{ContextStore, InMemoryContextStore};
pub use personas::{Persona, PersonaKind, PersonaSet};
pub use research::{research_pipeline, Researcher};
pub use review::{merge_updates, persona_node, review_pipeline};
pub use types::*;
pub use updater::{apply_answers, IssueUpdate, UpdateError};
