//! Batch envelope assembly: submission order, per-statement error capture,
//! notification handling.

use serde_json::json;

use boltgate::driver::Counters;
use boltgate::errors::ServerError;
use boltgate::executor::{EagerResult, ResultContainer, ResultFormat, SuccessResult};
use boltgate::server::models::{invalid_query_body, render_batch_envelope, render_legacy_result};
use boltr::types::BoltValue;

fn success(column: &str, value: i64) -> EagerResult {
    EagerResult::Success(SuccessResult {
        columns: vec![column.to_string()],
        records: vec![vec![BoltValue::Integer(value)]],
        counters: Counters::default(),
        include_stats: false,
        result_formats: vec![ResultFormat::Row],
    })
}

#[test]
fn captured_failure_does_not_displace_later_results() {
    // The S6 shape: statement 1 fails at the database, statement 2 succeeds.
    let mut container = ResultContainer::new();
    container.errors.push(ServerError::new(
        "Neo.ClientError.Statement.SyntaxError",
        "Invalid input 'n'",
    ));
    container.results.push(EagerResult::Failure {
        error: ServerError::new("Neo.ClientError.Statement.SyntaxError", "Invalid input 'n'"),
    });
    container.results.push(success("x", 1));

    let envelope = render_batch_envelope(&container);
    let results = envelope["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["columns"], json!(["x"]));
    assert_eq!(results[0]["data"][0]["row"], json!([1]));

    let errors = envelope["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["code"], json!("Neo.ClientError.Statement.SyntaxError"));
}

#[test]
fn results_keep_submission_order() {
    let mut container = ResultContainer::new();
    container.results.push(success("first", 1));
    container.results.push(success("second", 2));
    container.results.push(success("third", 3));

    let envelope = render_batch_envelope(&container);
    let results = envelope["results"].as_array().unwrap();
    let columns: Vec<_> = results
        .iter()
        .map(|r| r["columns"][0].as_str().unwrap().to_string())
        .collect();
    assert_eq!(columns, vec!["first", "second", "third"]);
}

#[test]
fn empty_batch_renders_empty_envelope() {
    let envelope = render_batch_envelope(&ResultContainer::new());
    assert_eq!(envelope["results"], json!([]));
    assert_eq!(envelope["errors"], json!([]));
    assert_eq!(envelope["notifications"], json!([]));
}

#[test]
fn include_stats_adds_counter_object() {
    let result = SuccessResult {
        columns: vec!["n".into()],
        records: vec![],
        counters: Counters {
            nodes_created: 2,
            contains_updates: true,
            ..Default::default()
        },
        include_stats: true,
        result_formats: vec![ResultFormat::Row],
    };
    let rendered = render_legacy_result(&result);
    assert_eq!(rendered["stats"]["nodes_created"], json!(2));
    assert_eq!(rendered["stats"]["contains_updates"], json!(true));
    assert_eq!(rendered["data"], json!([]));
}

#[test]
fn invalid_query_body_matches_contract() {
    // The S1 shape, byte for byte.
    let body = invalid_query_body("MATCH n RETURN n");
    assert_eq!(
        serde_json::to_value(&body).unwrap(),
        json!({
            "error": "Invalid query",
            "message": "MATCH n RETURN n",
            "status": 400
        })
    );
}
