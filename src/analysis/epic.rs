//! Epic analysis: every persona researches the epic, results are merged

use crate::analysis::personas::{PersonaKind, PersonaSet};
use crate::analysis::research::Researcher;
use crate::analysis::types::{EpicAnalysis, EpicResults, IssueSummary, PersonaAnalyses, ResearchResults};
use crate::core::{
    error::{BuildError, StepError},
    pipeline::Pipeline,
    step::typed_step,
};
use crate::execution::CompiledPipeline;
use std::collections::HashMap;

/// Combine per-persona research with the original issue
pub fn merge_research(input: IssueSummary, mut by_persona: HashMap<String, ResearchResults>) -> EpicAnalysis {
    let mut take = |kind: PersonaKind| by_persona.remove(kind.key()).unwrap_or_default();
    let business = take(PersonaKind::BusinessAnalyst);
    let architect = take(PersonaKind::Architect);
    let developer = take(PersonaKind::Developer);
    let qa = take(PersonaKind::Qa);
    let ordered = [&business, &architect, &developer, &qa];

    let mut acceptance_criteria = input.acceptance_criteria.clone().unwrap_or_default();
    acceptance_criteria.extend(ordered.iter().flat_map(|r| r.acceptance_criteria.iter().cloned()));

    let results = EpicResults {
        acceptance_criteria,
        questions: ordered.iter().flat_map(|r| r.questions.iter().cloned()).collect(),
        research_topics: ordered
            .iter()
            .flat_map(|r| r.research_topics.iter().cloned())
            .collect(),
        analysis: PersonaAnalyses {
            business: Some(business.analysis),
            architect: Some(architect.analysis),
            developer: Some(developer.analysis),
            qa: Some(qa.analysis),
        },
    };

    EpicAnalysis {
        context: input.context_block(),
        input,
        results,
    }
}

/// Build the epic pipeline over [`IssueSummary`]
///
/// `researchers` must hold one researcher per persona kind.
pub fn epic_pipeline(
    researchers: &HashMap<PersonaKind, Researcher>,
    max_steps: Option<usize>,
) -> Result<CompiledPipeline, BuildError> {
    let branches = PersonaKind::ALL
        .into_iter()
        .filter_map(|kind| researchers.get(&kind).map(|r| (kind.key(), r.as_step_fn())));

    Pipeline::typed::<IssueSummary>("analyze_epic")
        .step_limit(max_steps)
        .parallel_map(branches)
        .labeled("research")
        .then_fn(typed_step(|by_persona: HashMap<String, ResearchResults>, ctx| async move {
            let input: IssueSummary = serde_json::from_value(ctx.initial().clone())
                .map_err(|e| StepError::msg(format!("initial context is not an issue: {}", e)))?;
            Ok(merge_research(input, by_persona))
        }))
        .labeled("merge")
        .compile()
}

/// One researcher per persona sharing a compiled research pipeline
pub fn researchers(personas: &PersonaSet, research: &CompiledPipeline) -> HashMap<PersonaKind, Researcher> {
    personas
        .iter()
        .map(|(kind, persona)| (kind, Researcher::new(persona.clone(), research.clone())))
        .collect()
}
