//! Test: input schemas and compile-time checks

use crate::helpers::*;
use issue_pipeline::analysis::IssueSummary;
use issue_pipeline::core::{label_fn, predicate, BuildError, FieldKind, ObjectSchema, Pipeline, PipelineError};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn title_schema() -> ObjectSchema {
    ObjectSchema::new("issue").required("title", FieldKind::String)
}

#[tokio::test]
async fn test_missing_required_field_runs_no_steps() {
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::with_schema("titled", title_schema())
        .then_fn(counting(Arc::clone(&calls)))
        .compile()
        .unwrap();

    let err = pipeline.invoke(json!({})).await.unwrap_err();
    match err {
        PipelineError::Validation(validation) => assert!(validation.to_string().contains("title")),
        other => panic!("Expected Validation, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_coerced_input_drops_undeclared_keys() {
    let pipeline = Pipeline::with_schema("titled", title_schema())
        .then(|v, _| async move { Ok(v) })
        .compile()
        .unwrap();

    let output = pipeline
        .invoke(json!({ "title": "Add login", "debug": true }))
        .await
        .unwrap();
    assert_eq!(output, json!({ "title": "Add login" }));
}

#[tokio::test]
async fn test_wrong_field_type_is_rejected() {
    let pipeline = Pipeline::with_schema("titled", title_schema()).compile().unwrap();
    let err = pipeline.invoke(json!({ "title": 42 })).await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[tokio::test]
async fn test_typed_schema_fills_defaults() {
    let pipeline = Pipeline::typed::<IssueSummary>("summary")
        .then(|v, _| async move { Ok(v) })
        .compile()
        .unwrap();

    let summary: IssueSummary = pipeline
        .invoke_typed(&json!({ "title": "Add login" }))
        .await
        .unwrap();
    assert_eq!(summary.title.as_deref(), Some("Add login"));
    assert!(summary.components.is_none());

    let err = pipeline.invoke(json!({ "title": ["not", "a", "string"] })).await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[test]
fn test_duplicate_label_is_a_build_error() {
    let err = Pipeline::new("dupes")
        .then(|v, _| async move { Ok(v) })
        .labeled("review")
        .then(|v, _| async move { Ok(v) })
        .labeled("review")
        .compile()
        .unwrap_err();
    assert!(matches!(err, BuildError::DuplicateLabel { first: 0, second: 1, .. }));
}

#[test]
fn test_unknown_goto_target_is_a_build_error() {
    let err = Pipeline::new("unknown")
        .then_fn(add(1))
        .goto_if(predicate(|_, _| async { Ok(true) }), "missing", 3)
        .compile()
        .unwrap_err();
    match err {
        BuildError::UnknownLabel { label, step } => {
            assert_eq!(label, "missing");
            assert_eq!(step, 1);
        }
        other => panic!("Expected UnknownLabel, got {:?}", other),
    }
}

#[test]
fn test_relabeling_a_step_moves_its_label() {
    let pipeline = Pipeline::new("relabel")
        .then_labeled("draft", |v, _| async move { Ok(v) })
        .labeled("final")
        .compile()
        .unwrap();
    assert_eq!(pipeline.labels().get("final"), Some(&0));
    assert!(pipeline.labels().get("draft").is_none());
}

#[test]
fn test_label_before_first_step_is_a_build_error() {
    let err = Pipeline::new("early")
        .labeled("top")
        .then_fn(add(1))
        .goto_step(label_fn(|_, _| async { Ok("top".to_string()) }))
        .compile()
        .unwrap_err();
    match err {
        BuildError::LabelWithoutStep { label } => assert_eq!(label, "top"),
        other => panic!("Expected LabelWithoutStep, got {:?}", other),
    }
}
