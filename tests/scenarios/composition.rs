//! Test: sequential composition and fan-out shapes

use crate::helpers::*;
use issue_pipeline::core::{step_fn, Pipeline, StepFn};
use issue_pipeline::execution::CompiledPipeline;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

fn triple() -> StepFn {
    step_fn(|v, _| async move { Ok(json!(v.as_i64().unwrap_or(0) * 3)) })
}

/// `then(f).then(g)` behaves like one step computing `g(f(v))`
#[tokio::test]
async fn test_sequential_composition_is_associative() {
    let chained = Pipeline::new("chained")
        .then_fn(add(2))
        .then_fn(triple())
        .compile()
        .unwrap();

    let (f, g) = (add(2), triple());
    let fused = Pipeline::new("fused")
        .then(move |v, ctx| {
            let (f, g) = (f.clone(), g.clone());
            async move {
                let intermediate = f(v, ctx.clone()).await?;
                g(intermediate, ctx).await
            }
        })
        .compile()
        .unwrap();

    for input in [0, 4, -7] {
        let expected = json!((input + 2) * 3);
        assert_eq!(chained.invoke(json!(input)).await.unwrap(), expected);
        assert_eq!(fused.invoke(json!(input)).await.unwrap(), expected);
    }
}

/// Grouping sub-pipelines differently yields the same result
#[tokio::test]
async fn test_nested_grouping_matches_flat_chain() {
    let flat = Pipeline::new("flat")
        .then_fn(add(1))
        .then_fn(triple())
        .then_fn(add(5))
        .compile()
        .unwrap();

    let tail = Pipeline::new("tail").then_fn(triple()).then_fn(add(5)).compile().unwrap();
    let grouped = Pipeline::new("grouped")
        .then_fn(add(1))
        .then_pipeline("tail", &tail)
        .compile()
        .unwrap();

    assert_eq!(flat.invoke(json!(2)).await.unwrap(), json!(14));
    assert_eq!(grouped.invoke(json!(2)).await.unwrap(), json!(14));
}

/// Ordered fan-out returns outputs by position, not by completion
#[tokio::test]
async fn test_parallel_outputs_follow_declaration_order() {
    let pipeline = Pipeline::new("ordered")
        .parallel(vec![
            delayed(Duration::from_millis(40), json!("slow")),
            delayed(Duration::from_millis(1), json!("fast")),
            delayed(Duration::from_millis(20), json!("medium")),
        ])
        .compile()
        .unwrap();

    let output = pipeline.invoke(json!(null)).await.unwrap();
    assert_eq!(output, json!(["slow", "fast", "medium"]));
}

/// Map-shaped fan-out returns exactly the declared keys
#[tokio::test]
async fn test_parallel_map_keys_match_branch_names() {
    let pipeline = Pipeline::new("keys")
        .parallel_map([("a", add(1)), ("b", add(2)), ("c", add(3))])
        .compile()
        .unwrap();

    let output = pipeline.invoke(json!(10)).await.unwrap();
    let object = output.as_object().unwrap();
    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["a", "b", "c"]);
    assert_eq!(output, json!({ "a": 11, "b": 12, "c": 13 }));
}

/// Every branch sees the same input value
#[tokio::test]
async fn test_fan_out_branches_share_input() {
    let echo = step_fn(|v, _| async move { Ok(v) });
    let pipeline = Pipeline::new("echo")
        .parallel(vec![echo.clone(), echo])
        .compile()
        .unwrap();

    let output = pipeline.invoke(json!({ "title": "Add login" })).await.unwrap();
    assert_eq!(output[0], output[1]);
}

#[tokio::test]
async fn test_for_each_maps_in_order() {
    let pipeline = Pipeline::new("items")
        .for_each(step_fn(|v, _| async move {
            let n = v.as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(30 - n * 10)).await;
            Ok(json!(n * n))
        }))
        .compile()
        .unwrap();

    assert_eq!(pipeline.invoke(json!([1, 2, 3])).await.unwrap(), json!([1, 4, 9]));
    assert_eq!(pipeline.invoke(json!([])).await.unwrap(), Value::Array(Vec::new()));
}

/// Branch that only returns once `barrier` has been reached by every party
fn rendezvous(barrier: &Arc<Barrier>, tag: &'static str) -> StepFn {
    let barrier = Arc::clone(barrier);
    step_fn(move |_, _| {
        let barrier = Arc::clone(&barrier);
        async move {
            barrier.wait().await;
            Ok(json!(tag))
        }
    })
}

async fn within_a_second(pipeline: &CompiledPipeline, input: Value) -> Value {
    tokio::time::timeout(Duration::from_secs(1), pipeline.invoke(input))
        .await
        .expect("branches did not run concurrently")
        .unwrap()
}

#[tokio::test]
async fn test_parallel_branches_run_concurrently() {
    let barrier = Arc::new(Barrier::new(4));
    let pipeline = Pipeline::new("together")
        .parallel(["a", "b", "c", "d"].into_iter().map(|tag| rendezvous(&barrier, tag)).collect())
        .compile()
        .unwrap();

    let output = within_a_second(&pipeline, json!(null)).await;
    assert_eq!(output, json!(["a", "b", "c", "d"]));
}

#[tokio::test]
async fn test_parallel_map_branches_run_concurrently() {
    let barrier = Arc::new(Barrier::new(3));
    let pipeline = Pipeline::new("together")
        .parallel_map([
            ("business", rendezvous(&barrier, "b")),
            ("architect", rendezvous(&barrier, "a")),
            ("qa", rendezvous(&barrier, "q")),
        ])
        .compile()
        .unwrap();

    let output = within_a_second(&pipeline, json!({})).await;
    assert_eq!(output, json!({ "business": "b", "architect": "a", "qa": "q" }));
}

#[tokio::test]
async fn test_for_each_items_run_concurrently() {
    let barrier = Arc::new(Barrier::new(4));
    let item = {
        let barrier = Arc::clone(&barrier);
        step_fn(move |v, _| {
            let barrier = Arc::clone(&barrier);
            async move {
                barrier.wait().await;
                Ok(json!(v.as_i64().unwrap_or(0) * 2))
            }
        })
    };
    let pipeline = Pipeline::new("items").for_each(item).compile().unwrap();

    let output = within_a_second(&pipeline, json!([1, 2, 3, 4])).await;
    assert_eq!(output, json!([2, 4, 6, 8]));
}
