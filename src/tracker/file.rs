//! Tracker backed by a directory of `<KEY>.json` issue files

use crate::tracker::{Attachment, Comment, Issue, TicketTracker, TrackerError, COMMENT_AUTHOR};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug)]
pub struct JsonFileTracker {
    root: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl JsonFileTracker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn issue_path(&self, key: &str) -> Result<PathBuf, TrackerError> {
        if !valid_key(key) {
            return Err(TrackerError::NotFound(key.to_string()));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }

    async fn load(&self, key: &str) -> Result<Issue, TrackerError> {
        let path = self.issue_path(key)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TrackerError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    async fn store(&self, issue: &Issue) -> Result<(), TrackerError> {
        let path = self.issue_path(&issue.key)?;
        tokio::fs::create_dir_all(&self.root).await?;
        let json = serde_json::to_string_pretty(issue)?;
        tokio::fs::write(&path, json).await?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    /// Write a new issue file, replacing any existing one
    pub async fn save(&self, issue: &Issue) -> Result<(), TrackerError> {
        let _guard = self.write_lock.lock().await;
        self.store(issue).await
    }

    async fn modify<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut Issue) -> Result<T, TrackerError> + Send,
    ) -> Result<T, TrackerError> {
        let _guard = self.write_lock.lock().await;
        let mut issue = self.load(key).await?;
        let result = f(&mut issue)?;
        self.store(&issue).await?;
        Ok(result)
    }
}

#[async_trait]
impl TicketTracker for JsonFileTracker {
    async fn get_issue(&self, key: &str) -> Result<Issue, TrackerError> {
        self.load(key).await
    }

    async fn update_issue(&self, key: &str, fields: Value) -> Result<(), TrackerError> {
        self.modify(key, |issue| issue.apply_update(&fields)).await
    }

    async fn add_comment(&self, key: &str, body: &str) -> Result<Comment, TrackerError> {
        self.modify(key, |issue| Ok(issue.push_comment(COMMENT_AUTHOR, body)))
            .await
    }

    async fn transition_issue(&self, key: &str, transition: &str) -> Result<(), TrackerError> {
        self.modify(key, |issue| issue.apply_transition(transition)).await
    }

    async fn add_attachment(&self, key: &str, name: &str, bytes: Vec<u8>) -> Result<Attachment, TrackerError> {
        let file_name = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TrackerError::InvalidUpdate(format!("invalid attachment name '{}'", name)))?
            .to_string();

        let _guard = self.write_lock.lock().await;
        let mut issue = self.load(key).await?;

        let dir = self.root.join("attachments").join(key);
        let path = dir.join(&file_name);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(&path, &bytes).await?;

        let attachment = issue.push_attachment(&file_name, bytes.len());
        if let Err(e) = self.store(&issue).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }
        info!("Attached {} to {}", file_name, key);
        Ok(attachment)
    }
}
