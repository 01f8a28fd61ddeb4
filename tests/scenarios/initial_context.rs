//! Test: Initial Context visibility across steps and branches

use issue_pipeline::core::{step_fn, FieldKind, ObjectSchema, Pipeline, StepFn};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

type Seen = Arc<Mutex<Vec<Arc<Value>>>>;

/// Persona stand-in recording the Initial Context it observed
fn persona(name: &'static str, seen: &Seen) -> StepFn {
    let seen = Arc::clone(seen);
    step_fn(move |value, ctx| {
        seen.lock().unwrap().push(ctx.initial_arc());
        async move {
            let topics = value["topics"].as_array().map(Vec::len).unwrap_or(0);
            Ok(json!({
                "persona": name,
                "title": ctx.initial()["title"],
                "topics": topics,
            }))
        }
    })
}

#[tokio::test]
async fn test_add_login_scenario() {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::with_schema("issue", ObjectSchema::new("issue").required("title", FieldKind::String))
        .then_labeled("extract_topics", |value, _| async move {
            let title = value["title"].as_str().unwrap_or_default().to_lowercase();
            let topics: Vec<&str> = title.split_whitespace().collect();
            Ok(json!({ "topics": topics }))
        })
        .parallel_map([
            ("topics", step_fn(|value, _| async move { Ok(value["topics"].clone()) })),
            ("business", persona("business", &seen)),
            ("qa", persona("qa", &seen)),
        ])
        .compile()
        .unwrap();

    let output = pipeline.invoke(json!({ "title": "Add login" })).await.unwrap();
    assert_eq!(
        output,
        json!({
            "topics": ["add", "login"],
            "business": { "persona": "business", "title": "Add login", "topics": 2 },
            "qa": { "persona": "qa", "title": "Add login", "topics": 2 },
        })
    );

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(Arc::ptr_eq(&seen[0], &seen[1]));
    assert_eq!(*seen[0], json!({ "title": "Add login" }));
}

/// Every step sees the original input no matter how the value evolves
#[tokio::test]
async fn test_initial_context_is_stable_across_steps() {
    let pipeline = Pipeline::new("stable")
        .then(|_, _| async { Ok(json!("rewritten")) })
        .then(|_, _| async { Ok(json!(null)) })
        .then(|value, ctx| async move { Ok(json!({ "value": value, "initial": ctx.initial().clone() })) })
        .compile()
        .unwrap();

    let output = pipeline.invoke(json!({ "title": "Add login" })).await.unwrap();
    assert_eq!(output, json!({ "value": null, "initial": { "title": "Add login" } }));
}

/// Concurrent invocations of one compiled pipeline keep separate contexts
#[tokio::test]
async fn test_concurrent_invocations_are_isolated() {
    let pipeline = Pipeline::new("isolated")
        .then(|_, _| async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            Ok(json!(null))
        })
        .then(|_, ctx| async move { Ok(ctx.initial().clone()) })
        .compile()
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.invoke(json!(i)).await })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap().unwrap(), json!(i));
    }
}
