//! Test: review, epic and answer flows against a mock model

use crate::helpers::*;
use issue_pipeline::analysis::{
    apply_answers, epic_pipeline, research_pipeline, researchers, review_pipeline, AnalysisResult, AnalysisState,
    ContextStore, EpicAnalysis, InMemoryContextStore, PersonaKind, PersonaSet, QuestionAnswer,
};
use issue_pipeline::core::PipelineError;
use issue_pipeline::tracker::{JsonFileTracker, TicketTracker};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

fn research_model() -> MockModel {
    MockModel::new()
        .on(
            "identify key research topics",
            r#"{"research_topics": ["oauth"], "questions": [{"type": "architecture", "question": "Which IdP?"}]}"#,
        )
        .on(
            "refine your research plan",
            r#"```json
{"questions": [{"type": "testing", "question": "Which browsers?"}], "analysis": "Use OAuth", "acceptance_criteria": ["Users can log in"], "research_topics": ["session storage"]}
```"#,
        )
        .on(
            "Gherkin",
            r#"{"acceptance_criteria": ["Given a supported browser, When the user signs in, Then the dashboard opens"]}"#,
        )
}

#[tokio::test]
async fn test_review_pipeline_produces_analysis_result() {
    let model = Arc::new(review_model());
    let pipeline = review_pipeline(model.clone(), &PersonaSet::default(), None).unwrap();

    let state = AnalysisState {
        issue: login_issue().document(),
        ..Default::default()
    };
    let result: AnalysisResult = pipeline.invoke_typed(&state).await.unwrap();

    assert_eq!(result.business_analysis, "Login unlocks self-service.");
    assert_eq!(result.architectural_analysis, "Delegate to the company IdP.");
    assert!(result.qa_analysis.contains("Cover lockout and expiry."));
    assert!(result.qa_analysis.contains("- Locked accounts cannot sign in"));
    assert_eq!(
        result.recommendations,
        vec!["Track sign-in conversion", "Use OIDC", "Add integration tests"]
    );
    assert_eq!(result.questions.len(), 1);
    assert_eq!(result.questions[0].kind, "business");
    assert!(result.summary.unwrap().contains("Ship login behind a flag."));

    // four personas, then the extractor and the summary
    assert_eq!(model.calls(), 6);
    assert_eq!(model.calls_matching("Title: Add login"), 4);
}

#[tokio::test]
async fn test_review_rejects_malformed_state_before_calling_model() {
    let model = Arc::new(review_model());
    let pipeline = review_pipeline(model.clone(), &PersonaSet::default(), None).unwrap();

    let err = pipeline.invoke(json!({ "issue": 3 })).await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_review_uses_configured_personas() {
    let model = Arc::new(review_model().on("You are a Staff Engineer", r#"{"analysis": "Staff view"}"#));
    let mut personas = PersonaSet::default();
    personas.set(
        PersonaKind::Developer,
        issue_pipeline::analysis::Persona::new("Staff Engineer", "Distributed systems", "Reliability"),
    );

    let pipeline = review_pipeline(model.clone(), &personas, None).unwrap();
    let state = AnalysisState {
        issue: login_issue().document(),
        ..Default::default()
    };
    let result: AnalysisResult = pipeline.invoke_typed(&state).await.unwrap();
    assert_eq!(result.development_analysis, "Staff view");
    assert_eq!(model.calls_matching("You are a Senior Developer"), 0);
}

#[tokio::test]
async fn test_failing_persona_fails_the_review() {
    let model = Arc::new(MockModel::new().on(
        "You are a Business Analyst",
        r#"{"analysis": "ok", "recommendations": []}"#,
    ));
    let pipeline = review_pipeline(model, &PersonaSet::default(), None).unwrap();
    let state = AnalysisState {
        issue: login_issue().document(),
        ..Default::default()
    };

    match pipeline.invoke_typed::<_, AnalysisResult>(&state).await.unwrap_err() {
        PipelineError::Step { step, .. } => assert_eq!(step, "personas"),
        other => panic!("Expected Step error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_epic_pipeline_merges_every_persona() {
    let model = Arc::new(research_model());
    let store = Arc::new(InMemoryContextStore::default());
    store
        .add("Company SSO uses oauth with Okta", HashMap::new())
        .await
        .unwrap();

    let research = research_pipeline(model.clone(), store.clone(), None).unwrap();
    let researchers = researchers(&PersonaSet::default(), &research);
    let pipeline = epic_pipeline(&researchers, None).unwrap();

    let epic: EpicAnalysis = pipeline.invoke_typed(&login_issue().summary()).await.unwrap();

    assert_eq!(epic.input.title.as_deref(), Some("Add login"));
    assert!(epic.context.contains("Title: Add login"));
    assert_eq!(epic.results.acceptance_criteria.len(), 1 + 4 * 2);
    assert_eq!(epic.results.acceptance_criteria[0], "Login page exists");
    assert_eq!(epic.results.acceptance_criteria[1], "Users can log in");
    assert_eq!(epic.results.questions.len(), 4);
    assert_eq!(epic.results.research_topics, vec!["session storage"; 4]);
    assert_eq!(epic.results.analysis.business.as_deref(), Some("Use OAuth"));
    assert_eq!(epic.results.analysis.qa.as_deref(), Some("Use OAuth"));

    // research, plan and report for each persona
    assert_eq!(model.calls(), 12);
    assert_eq!(model.calls_matching("Topic: oauth"), 4);
}

#[tokio::test]
async fn test_apply_answers_persists_to_issue_file() {
    let root = std::env::temp_dir().join(format!("issue-pipeline-{}", Uuid::new_v4()));
    let tracker = JsonFileTracker::new(&root);
    tracker.save(&login_issue()).await.unwrap();

    let model = MockModel::new().on(
        "Jira Integration Specialist",
        r#"{"description": "Users sign in with Okta SSO.", "comments": ["Recorded IdP decision"], "fields": {"priority": "High"}}"#,
    );
    let answers = vec![QuestionAnswer {
        question: "Which IdP?".to_string(),
        answer: "Okta".to_string(),
        category: "architecture".to_string(),
    }];

    let update = apply_answers(&model, &tracker, "AUTH-7", &answers).await.unwrap();
    assert_eq!(update.comments, vec!["Recorded IdP decision"]);

    let reloaded = JsonFileTracker::new(&root).get_issue("AUTH-7").await.unwrap();
    assert_eq!(reloaded.fields.description.as_deref(), Some("Users sign in with Okta SSO."));
    assert_eq!(reloaded.fields.priority.as_deref(), Some("High"));
    assert_eq!(reloaded.fields.comments.len(), 1);
    assert_eq!(reloaded.fields.comments[0].body, "Recorded IdP decision");
    assert!(model.prompts()[0].contains("Answer: Okta"));

    std::fs::remove_dir_all(&root).unwrap();
}
