//! In-memory tracker for tests and dry runs

use crate::tracker::{Attachment, Comment, Issue, TicketTracker, TrackerError, COMMENT_AUTHOR};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
pub struct InMemoryTracker {
    issues: RwLock<HashMap<String, Issue>>,
    attachments: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issues(issues: impl IntoIterator<Item = Issue>) -> Self {
        let issues = issues.into_iter().map(|i| (i.key.clone(), i)).collect();
        Self {
            issues: RwLock::new(issues),
            attachments: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, issue: Issue) {
        self.issues.write().await.insert(issue.key.clone(), issue);
    }

    /// Bytes of a stored attachment
    pub async fn attachment(&self, key: &str, name: &str) -> Option<Vec<u8>> {
        self.attachments
            .read()
            .await
            .get(&(key.to_string(), name.to_string()))
            .cloned()
    }

    async fn with_issue<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut Issue) -> Result<T, TrackerError> + Send,
    ) -> Result<T, TrackerError> {
        let mut issues = self.issues.write().await;
        let issue = issues
            .get_mut(key)
            .ok_or_else(|| TrackerError::NotFound(key.to_string()))?;
        f(issue)
    }
}

#[async_trait]
impl TicketTracker for InMemoryTracker {
    async fn get_issue(&self, key: &str) -> Result<Issue, TrackerError> {
        self.issues
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| TrackerError::NotFound(key.to_string()))
    }

    async fn update_issue(&self, key: &str, fields: Value) -> Result<(), TrackerError> {
        debug!("Updating {} in memory", key);
        self.with_issue(key, |issue| issue.apply_update(&fields)).await
    }

    async fn add_comment(&self, key: &str, body: &str) -> Result<Comment, TrackerError> {
        self.with_issue(key, |issue| Ok(issue.push_comment(COMMENT_AUTHOR, body)))
            .await
    }

    async fn transition_issue(&self, key: &str, transition: &str) -> Result<(), TrackerError> {
        self.with_issue(key, |issue| issue.apply_transition(transition)).await
    }

    async fn add_attachment(&self, key: &str, name: &str, bytes: Vec<u8>) -> Result<Attachment, TrackerError> {
        let attachment = self
            .with_issue(key, |issue| Ok(issue.push_attachment(name, bytes.len())))
            .await?;
        self.attachments
            .write()
            .await
            .insert((key.to_string(), name.to_string()), bytes);
        Ok(attachment)
    }
}
