//! Per-persona research sub-pipeline
//!
//! `research` -> `{web_search, document_loader}` -> merge -> `research_plan`
//! -> `research_report`

use crate::agent::{complete_structured, LanguageModel};
use crate::analysis::memory::ContextStore;
use crate::analysis::personas::Persona;
use crate::analysis::types::{IssueSummary, Question, ResearchResults, ResearcherState};
use crate::core::{
    error::{BuildError, PipelineError, StepError},
    pipeline::Pipeline,
    step::{typed_step, StepFn},
};
use crate::execution::CompiledPipeline;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Chunks fetched from the context store per research topic
const SEARCH_RESULTS_PER_TOPIC: usize = 3;

const TOPICS_SHAPE: &str = r#"{
  "research_topics": ["topic to search for"],
  "questions": [{ "type": "engineering | business | testing | development | architecture", "question": "..." }]
}"#;

const RESULTS_SHAPE: &str = r#"{
  "questions": [{ "type": "...", "question": "question that still needs an answer" }],
  "analysis": "detailed analysis of the issue and what the research showed",
  "acceptance_criteria": ["acceptance criterion to add to the epic"],
  "research_topics": ["topic that still needs research"]
}"#;

const GHERKIN_SHAPE: &str = r#"{
  "acceptance_criteria": ["Given [some context], When [some action], Then [some outcome]"]
}"#;

#[derive(Debug, Deserialize)]
struct ResearchPlan {
    #[serde(default)]
    research_topics: Vec<String>,
    #[serde(default)]
    questions: Vec<Question>,
}

#[derive(Debug, Deserialize)]
struct GherkinCriteria {
    #[serde(default)]
    acceptance_criteria: Vec<String>,
}

fn render_questions(questions: &[Question]) -> String {
    questions
        .iter()
        .map(Question::render)
        .collect::<Vec<_>>()
        .join("\n")
}

fn research_prompt(persona: &Persona, issue: &IssueSummary) -> String {
    format!(
        "As a {} with expertise in {}, focusing on {},\n\
         analyze the following Jira issue and identify key research topics to ensure a comprehensive understanding for implementation.\n\n\
         Jira Issue Details:\n\
         Title: {}\n\
         Description: {}\n\
         Components: {}\n\
         Acceptance Criteria: {}\n\n\
         Based on your persona, what are the primary questions you would ask, and what specific topics would you research\n\
         to address the requirements and potential challenges of this issue?",
        persona.role,
        persona.expertise,
        persona.focus,
        issue.title.as_deref().unwrap_or_default(),
        issue.description.as_deref().unwrap_or("no description"),
        issue.components_text(),
        issue.acceptance_criteria_text("\n"),
    )
}

fn plan_prompt(state: &ResearcherState) -> String {
    let analysis = state
        .results
        .as_ref()
        .map(|r| r.analysis.as_str())
        .unwrap_or("none yet");
    let questions = render_questions(state.questions.as_deref().unwrap_or_default());
    let context = state.context.as_deref().unwrap_or_default().join("\n\n");
    format!(
        "As a {}, you have conducted initial research on the Jira issue: \"{}\".\n\n\
         Initial Analysis:\n{}\n\n\
         Questions:\n{}\n\n\
         Research Context:\n{}\n\n\
         Based on this new context, refine your research plan.\n\
         What are the remaining open questions?\n\
         What new research topics should be explored?\n\
         Update the analysis and acceptance criteria based on what you have learned.",
        state.persona.role,
        state.issue.title_or_untitled(),
        analysis,
        questions,
        context,
    )
}

fn report_prompt(questions: &[Question]) -> String {
    let listed = questions
        .iter()
        .map(|q| format!("- {}", q.render()))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Based on the following unanswered research questions, please generate acceptance criteria in clean Gherkin format (Given/When/Then).\n\
         These acceptance criteria will be added to a Jira ticket to ensure the research tasks are completed.\n\n\
         Unanswered Questions:\n{}\n\n\
         Generate a list of acceptance criteria based on these questions.",
        listed
    )
}

/// Build the research sub-pipeline over [`ResearcherState`]
pub fn research_pipeline(
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn ContextStore>,
    max_steps: Option<usize>,
) -> Result<CompiledPipeline, BuildError> {
    let research = {
        let model = Arc::clone(&model);
        typed_step(move |state: ResearcherState, _ctx| {
            let model = Arc::clone(&model);
            async move {
                let prompt = research_prompt(&state.persona, &state.issue);
                let plan: ResearchPlan = complete_structured(model.as_ref(), &prompt, TOPICS_SHAPE).await?;
                debug!(
                    "{}: {} topic(s), {} question(s)",
                    state.persona.role,
                    plan.research_topics.len(),
                    plan.questions.len()
                );
                Ok(ResearcherState {
                    research_topics: Some(plan.research_topics),
                    questions: Some(plan.questions),
                    ..state
                })
            }
        })
    };

    let web_search: StepFn = {
        let store = Arc::clone(&store);
        typed_step(move |state: ResearcherState, _ctx| {
            let store = Arc::clone(&store);
            async move {
                let mut context = Vec::new();
                for topic in state.research_topics.iter().flatten() {
                    let hits = store.search(topic, SEARCH_RESULTS_PER_TOPIC).await?;
                    if !hits.is_empty() {
                        context.push(format!("Topic: {}\n{}", topic, hits.join("\n")));
                    }
                }
                Ok(ResearcherState {
                    context: Some(context),
                    ..state
                })
            }
        })
    };

    let document_loader: StepFn = {
        let store = Arc::clone(&store);
        typed_step(move |state: ResearcherState, _ctx| {
            let store = Arc::clone(&store);
            async move {
                for content in state.context.iter().flatten() {
                    let metadata = HashMap::from([("source".to_string(), "web-search".to_string())]);
                    store.add(content, metadata).await?;
                }
                Ok(state)
            }
        })
    };

    let merge = typed_step(|branches: HashMap<String, ResearcherState>, _ctx| async move {
        let mut branches = branches;
        let searched = branches
            .remove("web_search")
            .ok_or_else(|| StepError::msg("web_search branch missing"))?;
        let loaded = branches.remove("document_loader").and_then(|s| s.context).unwrap_or_default();
        let mut context = loaded;
        context.extend(searched.context.clone().unwrap_or_default());
        Ok(ResearcherState {
            context: Some(context),
            ..searched
        })
    });

    let plan = {
        let model = Arc::clone(&model);
        typed_step(move |state: ResearcherState, _ctx| {
            let model = Arc::clone(&model);
            async move {
                let results: ResearchResults =
                    complete_structured(model.as_ref(), &plan_prompt(&state), RESULTS_SHAPE).await?;
                Ok(ResearcherState {
                    results: Some(results),
                    ..state
                })
            }
        })
    };

    let report = typed_step(move |state: ResearcherState, _ctx| {
        let model = Arc::clone(&model);
        async move {
            let Some(mut results) = state.results.clone() else {
                return Ok(state);
            };
            if results.questions.is_empty() {
                return Ok(state);
            }
            let gherkin: GherkinCriteria =
                complete_structured(model.as_ref(), &report_prompt(&results.questions), GHERKIN_SHAPE).await?;
            results.acceptance_criteria.extend(gherkin.acceptance_criteria);
            Ok(ResearcherState {
                results: Some(results),
                ..state
            })
        }
    });

    Pipeline::typed::<ResearcherState>("researcher")
        .step_limit(max_steps)
        .then_fn(research)
        .labeled("research")
        .parallel_map([("web_search", web_search), ("document_loader", document_loader)])
        .then_fn(merge)
        .then_fn(plan)
        .labeled("research_plan")
        .then_fn(report)
        .labeled("research_report")
        .compile()
}

/// One persona bound to the research sub-pipeline
#[derive(Debug, Clone)]
pub struct Researcher {
    persona: Persona,
    pipeline: CompiledPipeline,
}

impl Researcher {
    pub fn new(persona: Persona, pipeline: CompiledPipeline) -> Self {
        Self { persona, pipeline }
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Research `issue` from this persona's viewpoint
    pub async fn research(&self, issue: IssueSummary) -> Result<ResearchResults, PipelineError> {
        info!("Researching '{}' as {}", issue.title_or_untitled(), self.persona.role);
        let state: ResearcherState = self
            .pipeline
            .invoke_typed(&ResearcherState::new(self.persona.clone(), issue))
            .await?;
        Ok(state.results.unwrap_or_default())
    }

    /// `IssueSummary -> ResearchResults` as a step of another pipeline
    pub fn as_step_fn(&self) -> StepFn {
        let researcher = self.clone();
        typed_step(move |issue: IssueSummary, _ctx| {
            let researcher = researcher.clone();
            async move {
                researcher
                    .research(issue)
                    .await
                    .map_err(|e| StepError::Nested(Box::new(e)))
            }
        })
    }
}
