//! CLI output formatting

use crate::analysis::{AnalysisResult, EpicAnalysis, Persona, PersonaKind, Question};
use crate::execution::ExecutionEvent;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a spinner for a long-running analysis
pub fn create_spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}.{}s", secs, duration.subsec_millis() / 100)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            execution_id,
            pipeline,
            ..
        } => format!(
            "{} Starting pipeline {} ({})",
            ROCKET,
            style(pipeline).bold(),
            style(&execution_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::StepStarted { step, .. } => format!("{} {}", SPINNER, style(step).cyan()),
        ExecutionEvent::StepCompleted { step, duration, .. } => format!(
            "{} {} ({})",
            CHECK,
            style(step).green(),
            style(format_duration(*duration)).dim()
        ),
        ExecutionEvent::Jumped { step, from, to, .. } => format!(
            "{} {} jumped {} → {}",
            INFO,
            style(step).yellow(),
            style(from).dim(),
            style(to).cyan()
        ),
        ExecutionEvent::StepFailed { step, error, .. } => {
            format!("{} {}: {}", CROSS, style(step).red(), style(error).dim())
        }
        ExecutionEvent::RunCompleted {
            pipeline,
            steps_executed,
            duration,
            ..
        } => format!(
            "{} {} finished {} step(s) in {}",
            INFO,
            style(pipeline).bold(),
            style(steps_executed).cyan(),
            style(format_duration(*duration)).dim()
        ),
    }
}

pub fn format_persona(kind: PersonaKind, persona: &Persona) -> String {
    format!(
        "{} ({})\n    Expertise: {}\n    Focus: {}",
        style(&persona.role).bold(),
        style(kind).dim(),
        persona.expertise,
        persona.focus
    )
}

fn section(title: &str, body: &str) -> String {
    let body = if body.trim().is_empty() {
        style("(none)").dim().to_string()
    } else {
        body.trim().to_string()
    };
    format!("{}\n{}\n", style(title).bold().underlined(), body)
}

fn bullets(items: &[String]) -> String {
    items.iter().map(|i| format!("  • {}", i)).collect::<Vec<_>>().join("\n")
}

fn numbered_questions(questions: &[Question]) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("  {}. [{}] {}", i + 1, style(&q.kind).cyan(), q.question))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Styled review result
pub fn format_analysis_result(result: &AnalysisResult) -> String {
    [
        section("Summary", result.summary.as_deref().unwrap_or_default()),
        section("Business Analysis", &result.business_analysis),
        section("Architectural Analysis", &result.architectural_analysis),
        section("Development Analysis", &result.development_analysis),
        section("QA Analysis", &result.qa_analysis),
        section("Recommendations", &bullets(&result.recommendations)),
        section("Open Questions", &numbered_questions(&result.questions)),
    ]
    .join("\n")
}

/// Styled epic result
pub fn format_epic_analysis(epic: &EpicAnalysis) -> String {
    let analyses = &epic.results.analysis;
    [
        section("Epic", &epic.context),
        section("Business Analysis", analyses.business.as_deref().unwrap_or_default()),
        section("Architectural Analysis", analyses.architect.as_deref().unwrap_or_default()),
        section("Development Analysis", analyses.developer.as_deref().unwrap_or_default()),
        section("QA Analysis", analyses.qa.as_deref().unwrap_or_default()),
        section("Acceptance Criteria", &bullets(&epic.results.acceptance_criteria)),
        section("Research Topics", &bullets(&epic.results.research_topics)),
        section("Open Questions", &numbered_questions(&epic.results.questions)),
    ]
    .join("\n")
}

fn markdown_questions(questions: &[Question]) -> String {
    questions
        .iter()
        .map(|q| format!("- [{}] {}", q.kind, q.question))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Plain markdown comment body for a review result
pub fn review_comment(result: &AnalysisResult) -> String {
    let mut body = String::from("h2. Multi-perspective review\n\n");
    if let Some(summary) = &result.summary {
        body.push_str(summary.trim());
        body.push_str("\n\n");
    }
    if !result.recommendations.is_empty() {
        body.push_str("*Recommendations*\n");
        for recommendation in &result.recommendations {
            body.push_str(&format!("- {}\n", recommendation));
        }
        body.push('\n');
    }
    if !result.questions.is_empty() {
        body.push_str("*Open questions*\n");
        body.push_str(&markdown_questions(&result.questions));
        body.push('\n');
    }
    body
}

/// Plain markdown comment body for an epic analysis
pub fn epic_comment(epic: &EpicAnalysis) -> String {
    let mut body = String::from("h2. Epic research\n\n*Acceptance criteria*\n");
    for criterion in &epic.results.acceptance_criteria {
        body.push_str(&format!("- {}\n", criterion));
    }
    if !epic.results.questions.is_empty() {
        body.push_str("\n*Open questions*\n");
        body.push_str(&markdown_questions(&epic.results.questions));
        body.push('\n');
    }
    body
}
