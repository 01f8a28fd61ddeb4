//! Test: loops, bounded jumps and the step limit

use crate::helpers::*;
use issue_pipeline::core::{label_fn, predicate, step_fn, Pipeline, PipelineError};
use issue_pipeline::execution::StepOutcome;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_do_while_false_on_first_check_runs_zero_times() {
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::new("while")
        .do_while(predicate(|_, _| async { Ok(false) }), counting(Arc::clone(&calls)))
        .compile()
        .unwrap();

    let output = pipeline.invoke(json!("untouched")).await.unwrap();
    assert_eq!(output, json!("untouched"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_do_while_loops_until_condition_fails() {
    let pipeline = Pipeline::new("while")
        .do_while(predicate(|v, _| async move { Ok(v.as_i64().unwrap_or(0) < 5) }), add(2))
        .compile()
        .unwrap();

    assert_eq!(pipeline.invoke(json!(0)).await.unwrap(), json!(6));
}

#[tokio::test]
async fn test_do_until_runs_at_least_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::new("until")
        .do_until(predicate(|_, _| async { Ok(true) }), counting(Arc::clone(&calls)))
        .compile()
        .unwrap();

    pipeline.invoke(json!(1)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_do_until_checks_after_each_action() {
    let pipeline = Pipeline::new("until")
        .do_until(predicate(|v, _| async move { Ok(v.as_i64().unwrap_or(0) >= 3) }), add(1))
        .compile()
        .unwrap();

    assert_eq!(pipeline.invoke(json!(0)).await.unwrap(), json!(3));
    assert_eq!(pipeline.invoke(json!(10)).await.unwrap(), json!(11));
}

#[tokio::test]
async fn test_goto_if_false_never_jumps() {
    let pipeline = Pipeline::new("no-jump")
        .then_fn(add(1))
        .labeled("top")
        .goto_if(predicate(|_, _| async { Ok(false) }), "top", 5)
        .compile()
        .unwrap();

    let (output, trace) = pipeline.invoke_traced(json!(0)).await.unwrap();
    assert_eq!(output, json!(1));
    assert_eq!(trace.jumps(), 0);
    assert_eq!(trace.count(0), 1);
}

#[tokio::test]
async fn test_goto_if_stops_after_max_retries() {
    let pipeline = Pipeline::new("retry")
        .then_fn(add(1))
        .labeled("top")
        .goto_if(predicate(|_, _| async { Ok(true) }), "top", 2)
        .then(|v, _| async move { Ok(json!({ "final": v })) })
        .compile()
        .unwrap();

    let (output, trace) = pipeline.invoke_traced(json!(0)).await.unwrap();
    assert_eq!(output, json!({ "final": 3 }));
    assert_eq!(trace.count(0), 3);
    assert_eq!(trace.jumps(), 2);
}

/// Re-entering a goto_if through another jump does not refill its budget
#[tokio::test]
async fn test_goto_if_budget_spans_re_entries() {
    let pipeline = Pipeline::new("re-entry")
        .then_fn(add(1))
        .labeled("top")
        .goto_if(predicate(|_, _| async { Ok(true) }), "top", 2)
        .goto_step(label_fn(|v, _| async move {
            let label = if v.as_i64().unwrap_or(0) < 6 { "top" } else { "end" };
            Ok(label.to_string())
        }))
        .then_labeled("end", |v, _| async move { Ok(v) })
        .compile()
        .unwrap();

    let (output, trace) = pipeline.invoke_traced(json!(0)).await.unwrap();
    assert_eq!(output, json!(6));

    let goto_if_jumps = trace
        .steps
        .iter()
        .filter(|s| s.position == 1 && matches!(s.outcome, StepOutcome::Jumped { .. }))
        .count();
    assert_eq!(goto_if_jumps, 2);
    assert_eq!(trace.count(1), 6);
}

/// Each invocation gets a fresh jump budget
#[tokio::test]
async fn test_goto_if_budget_is_per_invocation() {
    let pipeline = Pipeline::new("fresh")
        .then_fn(add(1))
        .labeled("top")
        .goto_if(predicate(|_, _| async { Ok(true) }), "top", 1)
        .compile()
        .unwrap();

    assert_eq!(pipeline.invoke(json!(0)).await.unwrap(), json!(2));
    assert_eq!(pipeline.invoke(json!(0)).await.unwrap(), json!(2));
}

#[tokio::test]
async fn test_step_limit_stops_unbounded_goto() {
    let pipeline = Pipeline::new("forever")
        .then_fn(add(1))
        .labeled("top")
        .goto_step(label_fn(|_, _| async { Ok("top".to_string()) }))
        .max_steps(20)
        .compile()
        .unwrap();

    let err = pipeline.invoke(json!(0)).await.unwrap_err();
    assert!(matches!(err, PipelineError::StepLimitExceeded(20)));
}

#[tokio::test]
async fn test_goto_step_skips_forward() {
    let skipped = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::new("skip")
        .goto_step(label_fn(|_, _| async { Ok("done".to_string()) }))
        .then_fn(counting(Arc::clone(&skipped)))
        .then_fn(step_fn(|v, _| async move { Ok(json!({ "value": v })) }))
        .labeled("done")
        .compile()
        .unwrap();

    assert_eq!(pipeline.invoke(json!(7)).await.unwrap(), json!({ "value": 7 }));
    assert_eq!(skipped.load(Ordering::SeqCst), 0);
}
