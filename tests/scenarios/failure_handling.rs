//! Test: step failures, sibling abort and event reporting

use crate::helpers::*;
use issue_pipeline::core::{predicate, step_fn, Branches, Pipeline, PipelineError, StepError};
use issue_pipeline::execution::ExecutionEvent;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[tokio::test]
async fn test_step_error_surfaces_with_label_and_position() {
    let after = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::new("fails")
        .then_fn(add(1))
        .then_labeled("explode", |_, _| async { Err(StepError::msg("boom")) })
        .then_fn(counting(Arc::clone(&after)))
        .compile()
        .unwrap();

    match pipeline.invoke(json!(0)).await.unwrap_err() {
        PipelineError::Step { step, position, source } => {
            assert_eq!(step, "explode");
            assert_eq!(position, 1);
            assert_eq!(source.to_string(), "boom");
        }
        other => panic!("Expected Step error, got {:?}", other),
    }
    assert_eq!(after.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_anyhow_errors_convert_into_step_errors() {
    let pipeline = Pipeline::new("parse")
        .then(|v, _| async move {
            let n: i64 = v
                .as_str()
                .unwrap_or_default()
                .parse()
                .map_err(anyhow::Error::from)?;
            Ok(json!(n))
        })
        .compile()
        .unwrap();

    assert_eq!(pipeline.invoke(json!("12")).await.unwrap(), json!(12));
    let err = pipeline.invoke(json!("twelve")).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Step {
            source: StepError::Other(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_failing_branch_aborts_siblings() {
    let finished = Arc::new(AtomicUsize::new(0));
    let slow = {
        let finished = Arc::clone(&finished);
        step_fn(move |v, _| {
            let finished = Arc::clone(&finished);
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(v)
            }
        })
    };
    let failing = step_fn(|_, _| async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Err(StepError::msg("qa unavailable"))
    });

    let pipeline = Pipeline::new("fanout")
        .parallel_map([("business", slow), ("qa", failing)])
        .labeled("personas")
        .compile()
        .unwrap();

    let err = pipeline.invoke(json!({})).await.unwrap_err();
    match &err {
        PipelineError::Step { step, source, .. } => {
            assert_eq!(step, "personas");
            assert!(matches!(source, StepError::Branch { branch, .. } if branch == "qa"));
            assert_eq!(source.root().to_string(), "qa unavailable");
        }
        other => panic!("Expected Step error, got {:?}", other),
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(finished.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_nested_failure_keeps_root_cause() {
    let inner = Pipeline::new("inner")
        .then_labeled("deep", |_, _| async { Err(StepError::msg("deep failure")) })
        .compile()
        .unwrap();
    let outer = Pipeline::new("outer")
        .then_pipeline("inner", &inner)
        .compile()
        .unwrap();

    match outer.invoke(json!(null)).await.unwrap_err() {
        PipelineError::Step { step, source, .. } => {
            assert_eq!(step, "inner");
            assert!(matches!(source, StepError::Nested(_)));
            assert_eq!(source.root().to_string(), "deep failure");
        }
        other => panic!("Expected Step error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_nested_branch_exhaustion_is_reachable() {
    let inner = Pipeline::new("router")
        .then_fn(add(1))
        .branch(Branches::new().when(
            predicate(|_, _| async { Ok(false) }),
            Pipeline::new("never").then_fn(add(10)),
        ))
        .compile()
        .unwrap();
    let outer = Pipeline::new("outer")
        .parallel_map([("route", inner.as_step_fn())])
        .labeled("fanout")
        .compile()
        .unwrap();

    let err = outer.invoke(json!(0)).await.unwrap_err();
    match &err {
        PipelineError::Step { step, source, .. } => {
            assert_eq!(step, "fanout");
            assert!(matches!(source.root(), StepError::Nested(_)));
        }
        other => panic!("Expected Step error, got {:?}", other),
    }
    assert!(matches!(
        err.innermost(),
        PipelineError::BranchExhausted { position: 1, .. }
    ));
}

#[tokio::test]
async fn test_events_bracket_the_run() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let pipeline = Pipeline::new("observed")
        .then_fn(add(1))
        .then_labeled("fail", |_, _| async { Err(StepError::msg("nope")) })
        .on_event(move |event| {
            let tag = match event {
                ExecutionEvent::RunStarted { .. } => "run_started".to_string(),
                ExecutionEvent::StepStarted { step, .. } => format!("start:{}", step),
                ExecutionEvent::StepCompleted { step, .. } => format!("done:{}", step),
                ExecutionEvent::StepFailed { step, .. } => format!("failed:{}", step),
                ExecutionEvent::Jumped { .. } => "jumped".to_string(),
                ExecutionEvent::RunCompleted { .. } => "run_completed".to_string(),
            };
            sink.lock().unwrap().push(tag);
        })
        .compile()
        .unwrap();

    assert!(pipeline.invoke(json!(0)).await.is_err());
    assert_eq!(
        *events.lock().unwrap(),
        vec!["run_started", "start:step 0", "done:step 0", "start:fail", "failed:fail"]
    );
}
