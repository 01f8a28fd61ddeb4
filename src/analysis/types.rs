//! Data flowing through the analysis pipelines

use crate::analysis::personas::Persona;
use serde::{Deserialize, Serialize};

/// The issue fields the personas read; every field may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueSummary {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub components: Option<Vec<String>>,
    #[serde(default)]
    pub acceptance_criteria: Option<Vec<String>>,
    #[serde(default)]
    pub linked_issues: Option<Vec<String>>,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub epic_link: Option<String>,
}

fn join(list: &Option<Vec<String>>, separator: &str) -> String {
    list.as_deref().map(|items| items.join(separator)).unwrap_or_default()
}

impl IssueSummary {
    pub fn title_or_untitled(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }

    pub fn components_text(&self) -> String {
        join(&self.components, ", ")
    }

    pub fn acceptance_criteria_text(&self, separator: &str) -> String {
        join(&self.acceptance_criteria, separator)
    }

    /// Plain-text block used as context for the merged epic analysis
    pub fn context_block(&self) -> String {
        format!(
            "Title: {}\nDescription: {}\nComponents: {}\nAcceptance Criteria: {}\nLinked Issues: {}\nLabels: {}",
            self.title.as_deref().unwrap_or_default(),
            self.description.as_deref().unwrap_or_default(),
            self.components_text(),
            self.acceptance_criteria_text(", "),
            join(&self.linked_issues, ", "),
            join(&self.labels, ", "),
        )
    }
}

/// An open question raised by a persona
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Category such as `business`, `architecture` or `testing`
    #[serde(rename = "type")]
    pub kind: String,
    pub question: String,
}

impl Question {
    pub fn new(kind: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            question: question.into(),
        }
    }

    pub fn render(&self) -> String {
        format!("Type: {}\nQuestion: {}", self.kind, self.question)
    }
}

/// Findings of one persona's research sub-pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchResults {
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub research_topics: Vec<String>,
}

/// State threaded through the research sub-pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearcherState {
    pub persona: Persona,
    pub issue: IssueSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_topics: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<Question>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<ResearchResults>,
}

impl ResearcherState {
    pub fn new(persona: Persona, issue: IssueSummary) -> Self {
        Self {
            persona,
            issue,
            research_topics: None,
            context: None,
            questions: None,
            results: None,
        }
    }
}

/// Per-persona analysis text of an epic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonaAnalyses {
    pub business: Option<String>,
    pub architect: Option<String>,
    pub developer: Option<String>,
    pub qa: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpicResults {
    pub acceptance_criteria: Vec<String>,
    pub questions: Vec<Question>,
    pub research_topics: Vec<String>,
    pub analysis: PersonaAnalyses,
}

/// Merged output of the epic analysis pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicAnalysis {
    pub context: String,
    pub input: IssueSummary,
    pub results: EpicResults,
}

/// Issue text handed to the review personas
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueDocument {
    pub key: String,
    pub page_content: String,
    pub summary: IssueSummary,
}

/// State of the multi-perspective review
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisState {
    pub issue: IssueDocument,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub business_analysis: String,
    #[serde(default)]
    pub architectural_analysis: String,
    #[serde(default)]
    pub development_analysis: String,
    #[serde(default)]
    pub qa_analysis: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Contribution of one review persona
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonaUpdate {
    pub analysis: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Final product of the multi-perspective review
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub business_analysis: String,
    pub architectural_analysis: String,
    pub development_analysis: String,
    pub qa_analysis: String,
    pub questions: Vec<Question>,
    pub recommendations: Vec<String>,
    pub summary: Option<String>,
}

/// A question answered by a human, ready to be written back to the tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub question: String,
    pub answer: String,
    pub category: String,
}
