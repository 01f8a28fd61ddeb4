//! Issue records as stored by a ticket tracker

use crate::analysis::types::{IssueDocument, IssueSummary};
use crate::tracker::TrackerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub created: DateTime<Utc>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub size: usize,
    pub created: DateTime<Utc>,
}

/// A workflow move available from the current status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub name: String,
    pub to_status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueFields {
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub reporter: Option<String>,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub linked_issues: Vec<String>,
    #[serde(default)]
    pub epic_link: Option<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    pub fields: IssueFields,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

fn non_empty(list: &[String]) -> Option<Vec<String>> {
    (!list.is_empty()).then(|| list.to_vec())
}

impl Issue {
    pub fn new(key: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: IssueFields {
                summary: summary.into(),
                ..Default::default()
            },
            transitions: Vec::new(),
        }
    }

    /// Text rendering of the issue read by the review personas
    pub fn page_content(&self) -> String {
        let fields = &self.fields;
        let comments = if fields.comments.is_empty() {
            "No comments yet.".to_string()
        } else {
            fields
                .comments
                .iter()
                .map(|c| format!("[{} on {}]: {}", c.author, c.created.to_rfc3339(), c.body))
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let mut lines = vec![
            format!("Issue Key: {}", self.key),
            format!("Summary: {}", fields.summary),
        ];
        if let Some(description) = &fields.description {
            lines.push(format!("Description: {}", description));
        }
        lines.push(format!("Status: {}", fields.status.as_deref().unwrap_or("To Do")));
        lines.push(format!("Priority: {}", fields.priority.as_deref().unwrap_or("None")));
        lines.push(format!("Assignee: {}", fields.assignee.as_deref().unwrap_or("Unassigned")));
        lines.push(format!("Reporter: {}", fields.reporter.as_deref().unwrap_or("Unknown")));
        lines.push(String::new());
        lines.push("---COMMENTS---".to_string());
        lines.push(comments);
        lines.join("\n")
    }

    pub fn summary(&self) -> IssueSummary {
        let fields = &self.fields;
        IssueSummary {
            title: Some(fields.summary.clone()),
            description: fields.description.clone(),
            components: non_empty(&fields.components),
            acceptance_criteria: non_empty(&fields.acceptance_criteria),
            linked_issues: non_empty(&fields.linked_issues),
            labels: non_empty(&fields.labels),
            priority: fields.priority.clone(),
            epic_link: fields.epic_link.clone(),
        }
    }

    pub fn document(&self) -> IssueDocument {
        IssueDocument {
            key: self.key.clone(),
            page_content: self.page_content(),
            summary: self.summary(),
        }
    }

    /// Merge a JSON object of field values into the issue
    pub fn apply_update(&mut self, update: &Value) -> Result<(), TrackerError> {
        let Value::Object(changes) = update else {
            return Err(TrackerError::InvalidUpdate(format!(
                "expected an object of fields for {}",
                self.key
            )));
        };

        let mut current = serde_json::to_value(&self.fields)?;
        if let Value::Object(fields) = &mut current {
            for (name, value) in changes {
                fields.insert(name.clone(), value.clone());
            }
        }
        self.fields = serde_json::from_value(current)
            .map_err(|e| TrackerError::InvalidUpdate(format!("{}: {}", self.key, e)))?;
        Ok(())
    }

    pub fn push_comment(&mut self, author: &str, body: &str) -> Comment {
        let comment = Comment {
            author: author.to_string(),
            created: Utc::now(),
            body: body.to_string(),
        };
        self.fields.comments.push(comment.clone());
        comment
    }

    /// Move to the status of the named transition
    pub fn apply_transition(&mut self, name: &str) -> Result<(), TrackerError> {
        let transition = self
            .transitions
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| TrackerError::UnknownTransition {
                key: self.key.clone(),
                transition: name.to_string(),
            })?;
        self.fields.status = Some(transition.to_status.clone());
        Ok(())
    }

    pub fn push_attachment(&mut self, name: &str, size: usize) -> Attachment {
        let attachment = Attachment {
            name: name.to_string(),
            size,
            created: Utc::now(),
        };
        self.fields.attachments.push(attachment.clone());
        attachment
    }
}
