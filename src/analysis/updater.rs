//! Write answered questions back to the tracker

use crate::agent::{complete_structured, AgentError, LanguageModel};
use crate::analysis::types::QuestionAnswer;
use crate::tracker::{Issue, TicketTracker, TrackerError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

const UPDATE_SHAPE: &str = r#"{
  "description": "updated description incorporating the new information",
  "comments": ["comment explaining a change"],
  "fields": { "field name": "new value" }
}"#;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Changes proposed by the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueUpdate {
    pub description: String,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

fn update_prompt(issue: &Issue, answers: &[QuestionAnswer]) -> String {
    let answers_text = answers
        .iter()
        .map(|a| format!("[{}] {}\nAnswer: {}", a.category, a.question, a.answer))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "You are a Jira Integration Specialist responsible for updating Jira issues based on provided answers to key questions.\n\n\
         Your task is to:\n\
         1. Analyze the answers to key questions about a Jira issue\n\
         2. Generate appropriate updates to the issue description and fields\n\
         3. Create relevant comments to document the updates\n\n\
         Preserve existing content and structure while adding the new information.\n\n\
         Current Issue:\n\
         Title: {}\n\
         Key: {}\n\
         Description: {}\n\n\
         Provided Answers:\n{}",
        issue.fields.summary,
        issue.key,
        issue.fields.description.as_deref().unwrap_or("No description provided"),
        answers_text
    )
}

/// Ask the model to fold `answers` into the issue and apply the result
pub async fn apply_answers(
    model: &dyn LanguageModel,
    tracker: &dyn TicketTracker,
    key: &str,
    answers: &[QuestionAnswer],
) -> Result<IssueUpdate, UpdateError> {
    let issue = tracker.get_issue(key).await?;
    let update: IssueUpdate = complete_structured(model, &update_prompt(&issue, answers), UPDATE_SHAPE).await?;

    let mut fields = update.fields.clone();
    fields.insert("description".to_string(), Value::String(update.description.clone()));
    tracker.update_issue(key, Value::Object(fields)).await?;

    for comment in &update.comments {
        tracker.add_comment(key, comment).await?;
    }
    info!(
        "Applied {} answer(s) to {} with {} comment(s)",
        answers.len(),
        key,
        update.comments.len()
    );
    Ok(update)
}
