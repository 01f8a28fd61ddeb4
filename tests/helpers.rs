//! Test utility functions for issue-pipeline

#![allow(dead_code)]

use async_trait::async_trait;
use issue_pipeline::agent::{AgentError, AgentResponse, LanguageModel};
use issue_pipeline::core::{step_fn, StepFn};
use issue_pipeline::tracker::Issue;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock model answering by the first rule whose needle occurs in the prompt
pub struct MockModel {
    rules: Vec<(String, String)>,
    prompts: Mutex<Vec<String>>,
    simulate_delay: Option<Duration>,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            prompts: Mutex::new(Vec::new()),
            simulate_delay: None,
        }
    }

    /// Answer `response` to prompts containing `needle`
    pub fn on(mut self, needle: &str, response: &str) -> Self {
        self.rules.push((needle.to_string(), response.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.simulate_delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Prompts that contained `needle`
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.prompts.lock().unwrap().iter().filter(|p| p.contains(needle)).count()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(&self, prompt: &str) -> Result<AgentResponse, AgentError> {
        if let Some(delay) = self.simulate_delay {
            tokio::time::sleep(delay).await;
        }
        self.prompts.lock().unwrap().push(prompt.to_string());

        self.rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, response)| AgentResponse::new(response.clone()))
            .ok_or_else(|| {
                AgentError::Internal(format!(
                    "MockModel: no response for prompt starting {:?}",
                    prompt.chars().take(60).collect::<String>()
                ))
            })
    }
}

/// Step that adds `n` to a numeric value
pub fn add(n: i64) -> StepFn {
    step_fn(move |v, _| async move { Ok(json!(v.as_i64().unwrap_or(0) + n)) })
}

/// Step that records each call and passes its input through
pub fn counting(counter: Arc<AtomicUsize>) -> StepFn {
    step_fn(move |v, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Ok(v) }
    })
}

/// Step returning `value` after `delay`
pub fn delayed(delay: Duration, value: Value) -> StepFn {
    step_fn(move |_, _| {
        let value = value.clone();
        async move {
            tokio::time::sleep(delay).await;
            Ok(value)
        }
    })
}

pub fn login_issue() -> Issue {
    let mut issue = Issue::new("AUTH-7", "Add login");
    issue.fields.description = Some("Users must be able to sign in with their company account.".to_string());
    issue.fields.components = vec!["web".to_string()];
    issue.fields.acceptance_criteria = vec!["Login page exists".to_string()];
    issue
}

/// Canned model for a whole review run
pub fn review_model() -> MockModel {
    MockModel::new()
        .on(
            "You are a Business Analyst",
            r#"{"analysis": "Login unlocks self-service.", "recommendations": ["Track sign-in conversion"]}"#,
        )
        .on(
            "You are a Solution Architect",
            r#"{"analysis": "Delegate to the company IdP.", "recommendations": ["Use OIDC"]}"#,
        )
        .on(
            "You are a Senior Developer",
            r#"{"analysis": "Reuse the session middleware.", "recommendations": ["Add integration tests"]}"#,
        )
        .on(
            "You are a QA Engineer",
            r#"{"analysis": "Cover lockout and expiry.", "acceptance_criteria": ["Locked accounts cannot sign in"], "test_plan": "E2E login suite"}"#,
        )
        .on(
            "identify the key questions",
            r#"{"questions": [{"type": "business", "question": "Which accounts may sign in?"}]}"#,
        )
        .on("senior technical product manager", "## Summary\nShip login behind a flag.")
}
