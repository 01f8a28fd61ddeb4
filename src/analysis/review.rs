//! Multi-perspective issue review
//!
//! Four persona nodes run in parallel, their updates are merged, then the
//! question extractor and the summary node run in parallel.

use crate::agent::{complete_structured, LanguageModel};
use crate::analysis::personas::{Persona, PersonaKind, PersonaSet};
use crate::analysis::types::{AnalysisResult, AnalysisState, PersonaUpdate, Question};
use crate::core::{
    context::StepContext,
    error::{BuildError, StepError},
    pipeline::Pipeline,
    step::{typed_step, StepFn, StepResult},
};
use crate::execution::CompiledPipeline;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

const ANALYSIS_SHAPE: &str = r#"{
  "analysis": "detailed analysis from your perspective",
  "recommendations": ["specific recommendation"],
  "risks": ["potential risk or concern"]
}"#;

const QA_SHAPE: &str = r#"{
  "analysis": "analysis focusing on testability and risks",
  "acceptance_criteria": ["specific, verifiable acceptance criterion"],
  "test_plan": "high-level test plan outlining the testing strategy"
}"#;

const QUESTIONS_SHAPE: &str = r#"{
  "questions": [{ "type": "Business | Technical | Implementation", "question": "..." }]
}"#;

#[derive(Debug, Deserialize)]
struct ExpertAnalysis {
    analysis: String,
    #[serde(default)]
    recommendations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QaAnalysis {
    analysis: String,
    #[serde(default)]
    acceptance_criteria: Vec<String>,
    #[serde(default)]
    test_plan: String,
}

#[derive(Debug, Deserialize)]
struct ExtractedQuestions {
    #[serde(default)]
    questions: Vec<Question>,
}

fn perspective(kind: PersonaKind) -> &'static str {
    match kind {
        PersonaKind::BusinessAnalyst => {
            "Analyze the Jira issue from a business perspective, focusing on:\n\
             1. Business Value: What is the core business problem this issue solves?\n\
             2. User Impact: How does this change affect the user's workflow or experience?\n\
             3. Requirements Clarity: Are the requirements clear, complete, and actionable?\n\
             4. Success Metrics: How will we measure the success of this change?\n\
             5. Stakeholder Alignment: Does this align with the stated goals of the project stakeholders?\n\n\
             Focus on the 'why' behind the issue and its impact on the business and users."
        }
        PersonaKind::Architect => {
            "Analyze the Jira issue from an architectural perspective, focusing on:\n\
             1. System Integrity: How does this change affect the overall system architecture?\n\
             2. Scalability & Performance: Are there any potential impacts on scalability or performance?\n\
             3. Security: Does this introduce any new security vulnerabilities?\n\
             4. Maintainability: How does this affect the long-term maintainability and technical debt of the system?\n\
             5. Integration: What are the integration points with other systems or services?\n\n\
             Focus on the high-level technical design and its long-term implications."
        }
        PersonaKind::Developer => {
            "Analyze the Jira issue from a development perspective, focusing on:\n\
             1. Implementation Plan: What are the high-level steps to implement this?\n\
             2. Code Complexity: Are there parts of the code that will be particularly complex to implement or change?\n\
             3. Testing Strategy: What is the best way to test this at the unit and integration level?\n\
             4. Dependencies: Are there any new libraries or internal dependencies required?\n\
             5. Potential Roadblocks: What could go wrong during implementation?\n\n\
             Focus on the practicalities of writing and testing the code."
        }
        PersonaKind::Qa => {
            "Analyze the Jira issue from a testing perspective, focusing on:\n\
             1. Testability: How can the proposed changes be effectively tested? Are there any parts that will be difficult to test?\n\
             2. Test Plan: Outline a high-level test plan, including types of testing (e.g., unit, integration, end-to-end, regression).\n\
             3. Acceptance Criteria: Define a clear, specific, and verifiable list of acceptance criteria that must be met for the issue to be considered 'done'.\n\
             4. Risks: What are the primary risks from a quality and regression standpoint?\n\n\
             Your output should provide a clear path for verifying the functionality and quality of the implemented changes."
        }
    }
}

fn persona_prompt(kind: PersonaKind, persona: &Persona, state: &AnalysisState) -> String {
    let summary = &state.issue.summary;
    format!(
        "You are a {} with expertise in:\n- {}\n\n{}\n\n\
         Context from internal systems:\n{}\n\n\
         Please analyze this Jira issue:\n\
         Title: {}\n\
         Description: {}\n\
         Components: {}\n\n\
         Full issue:\n{}",
        persona.role,
        persona.expertise,
        perspective(kind),
        state.context,
        summary.title_or_untitled(),
        summary.description.as_deref().unwrap_or("No description provided"),
        summary.components.as_deref().map(|c| c.join(", ")).unwrap_or_else(|| "None".to_string()),
        state.issue.page_content,
    )
}

fn analyses_block(state: &AnalysisState) -> String {
    format!(
        "Business Analysis:\n{}\n\nArchitectural Analysis:\n{}\n\nDevelopment Analysis:\n{}\n\nQA Analysis:\n{}",
        state.business_analysis, state.architectural_analysis, state.development_analysis, state.qa_analysis
    )
}

async fn run_persona(
    model: &dyn LanguageModel,
    kind: PersonaKind,
    persona: &Persona,
    state: &AnalysisState,
) -> StepResult<PersonaUpdate> {
    let prompt = persona_prompt(kind, persona, state);
    if kind == PersonaKind::Qa {
        let qa: QaAnalysis = complete_structured(model, &prompt, QA_SHAPE).await?;
        let criteria = qa
            .acceptance_criteria
            .iter()
            .map(|ac| format!("- {}", ac))
            .collect::<Vec<_>>()
            .join("\n");
        return Ok(PersonaUpdate {
            analysis: format!(
                "### Testing Perspective\n{}\n\n### Test Plan\n{}\n\n### Acceptance Criteria\n{}",
                qa.analysis, qa.test_plan, criteria
            ),
            recommendations: Vec::new(),
        });
    }

    let expert: ExpertAnalysis = complete_structured(model, &prompt, ANALYSIS_SHAPE).await?;
    Ok(PersonaUpdate {
        analysis: expert.analysis,
        recommendations: expert.recommendations,
    })
}

/// `AnalysisState -> PersonaUpdate` node for one persona
pub fn persona_node(model: Arc<dyn LanguageModel>, kind: PersonaKind, persona: Persona) -> StepFn {
    typed_step(move |state: AnalysisState, _ctx| {
        let model = Arc::clone(&model);
        let persona = persona.clone();
        async move {
            info!("{} reviewing {}", persona.role, state.issue.key);
            run_persona(model.as_ref(), kind, &persona, &state).await
        }
    })
}

/// Fold persona updates into the review state
pub fn merge_updates(mut state: AnalysisState, mut updates: HashMap<String, PersonaUpdate>) -> AnalysisState {
    let mut take = |kind: PersonaKind| updates.remove(kind.key()).unwrap_or_default();
    let business = take(PersonaKind::BusinessAnalyst);
    let architect = take(PersonaKind::Architect);
    let developer = take(PersonaKind::Developer);
    let qa = take(PersonaKind::Qa);

    state.business_analysis = business.analysis;
    state.architectural_analysis = architect.analysis;
    state.development_analysis = developer.analysis;
    state.qa_analysis = qa.analysis;
    state.recommendations.extend(
        [business.recommendations, architect.recommendations, developer.recommendations, qa.recommendations]
            .into_iter()
            .flatten(),
    );
    state
}

fn initial_state(ctx: &StepContext) -> StepResult<AnalysisState> {
    serde_json::from_value(ctx.initial().clone())
        .map_err(|e| StepError::msg(format!("initial context is not an analysis state: {}", e)))
}

#[derive(Debug, Deserialize)]
struct Synthesis {
    state: AnalysisState,
    questions: Vec<Question>,
    summary: String,
}

/// Build the review pipeline over [`AnalysisState`]
pub fn review_pipeline(
    model: Arc<dyn LanguageModel>,
    personas: &PersonaSet,
    max_steps: Option<usize>,
) -> Result<CompiledPipeline, BuildError> {
    let nodes: Vec<(&str, StepFn)> = personas
        .iter()
        .map(|(kind, persona)| (kind.key(), persona_node(Arc::clone(&model), kind, persona.clone())))
        .collect();

    let extractor = {
        let model = Arc::clone(&model);
        typed_step(move |state: AnalysisState, _ctx| {
            let model = Arc::clone(&model);
            async move {
                let prompt = format!(
                    "Based on the following analyses, identify the key questions that need to be answered.\n\
                     Group related questions together and eliminate any duplicates.\n\
                     Focus on questions that bridge multiple perspectives (business, architecture, development).\n\n\
                     {}\n\n\
                     List the top 5-7 most important questions that need to be clarified, ordered by priority.",
                    analyses_block(&state)
                );
                let extracted: ExtractedQuestions =
                    complete_structured(model.as_ref(), &prompt, QUESTIONS_SHAPE).await?;
                Ok(extracted.questions)
            }
        })
    };

    let summary = typed_step(move |state: AnalysisState, _ctx| {
        let model = Arc::clone(&model);
        async move {
            let prompt = format!(
                "You are a senior technical product manager tasked with synthesizing analysis from different perspectives into a clear, actionable overview.\n\n\
                 Given the following detailed analyses, create a concise executive summary that:\n\
                 1. Highlights the most important insights across all perspectives\n\
                 2. Identifies any conflicting recommendations or open questions\n\
                 3. Provides a clear \"so what?\" for the reader\n\
                 4. Is formatted in clean markdown.\n\n\
                 Do not simply list the outputs from each role. Synthesize them.\n\n\
                 {}",
                analyses_block(&state)
            );
            let response = model.complete(&prompt).await?;
            Ok(response.content.trim().to_string())
        }
    });

    let passthrough = typed_step(|state: AnalysisState, _ctx| async move { Ok(state) });

    Pipeline::typed::<AnalysisState>("issue_review")
        .step_limit(max_steps)
        .parallel_map(nodes)
        .labeled("personas")
        .then_labeled("merge", |value, ctx| async move {
            let updates: HashMap<String, PersonaUpdate> = serde_json::from_value(value)?;
            let merged = merge_updates(initial_state(&ctx)?, updates);
            Ok(serde_json::to_value(merged)?)
        })
        .parallel_map([("state", passthrough), ("questions", extractor), ("summary", summary)])
        .labeled("synthesis")
        .then_fn(typed_step(|synthesis: Synthesis, _ctx| async move {
            let state = synthesis.state;
            Ok(AnalysisResult {
                business_analysis: state.business_analysis,
                architectural_analysis: state.architectural_analysis,
                development_analysis: state.development_analysis,
                qa_analysis: state.qa_analysis,
                questions: synthesis.questions,
                recommendations: state.recommendations,
                summary: Some(synthesis.summary),
            })
        }))
        .labeled("result")
        .compile()
}
