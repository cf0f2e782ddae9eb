//! End-to-end tests: client → gateway → db manager → memory store.

use pacmaster::client::ClientError;
use pacmaster::payload::{parse, Format, Payload};
use pacmaster::protocol::ErrorKind;
use reqwest::StatusCode;
use serde_json::{json, Value};

mod common;

async fn call_json(stack: &common::Stack, route: &str, body: Value) -> (StatusCode, Value) {
    let response = stack
        .client()
        .call(route, body.to_string(), Format::Json)
        .await
        .unwrap();
    let payload = response.payload().unwrap();
    (response.status, Value::from(payload))
}

#[tokio::test]
async fn test_sum_over_json() {
    let stack = common::start_stack().await;
    let (status, body) = call_json(&stack, "sum", json!({"a": 2, "b": 3})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": 5}));
}

#[tokio::test]
async fn test_sum_over_yaml() {
    let stack = common::start_stack().await;
    let response = stack
        .client()
        .call("sum", "a: 2\nb: 3\n", Format::Yaml)
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.format, Format::Yaml);
    assert_eq!(String::from_utf8(response.body).unwrap(), "result: 5\n");
}

#[tokio::test]
async fn test_auth_required() {
    let stack = common::start_stack().await;

    let response = stack
        .anonymous_client()
        .call("sum", r#"{"a":2,"b":3}"#, Format::Json)
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let wrong = pacmaster::GatewayClient::new(stack.url())
        .with_credentials(pacmaster::security::Credential::new(common::USER, "wrong"));
    let err = wrong
        .call_payload("get_runs", &Payload::Mapping(Default::default()), Format::Json)
        .await
        .unwrap_err();
    match err {
        ClientError::Gateway { status, error } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(error.kind, ErrorKind::Auth);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_malformed_payload_rejected() {
    let stack = common::start_stack().await;

    let response = stack
        .client()
        .call("sum", r#"{"a": 2,"#, Format::Json)
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body = Value::from(response.payload().unwrap());
    assert_eq!(body["kind"], "format");

    let response = stack
        .client()
        .call("sum", "a: [1, 2", Format::Yaml)
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body = Value::from(parse(&response.body, Format::Yaml).unwrap());
    assert_eq!(body["kind"], "format");
}

#[tokio::test]
async fn test_unknown_route() {
    let stack = common::start_stack().await;
    let (status, body) = call_json(&stack, "drop_everything", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "notFound");
}

#[tokio::test]
async fn test_wrong_shape_is_validation() {
    let stack = common::start_stack().await;
    let (status, body) = call_json(&stack, "sum", json!({"a": "two", "b": 3})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn test_reads_are_idempotent() {
    let stack = common::start_stack().await;
    let (_, created) = call_json(&stack, "create_run", json!({"id_script": 7})).await;
    let id_run = created["id_run"].as_i64().unwrap();

    let (first_status, first) = call_json(&stack, "get_runs", json!({})).await;
    let (second_status, second) = call_json(&stack, "get_runs", json!({})).await;
    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(first_status, second_status);
    assert_eq!(first, second);
    assert_eq!(first[0]["id_run"].as_i64(), Some(id_run));
}

#[tokio::test]
async fn test_run_lifecycle() {
    let stack = common::start_stack().await;

    let (status, body) = call_json(&stack, "get_runs", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No runs found");

    let (_, father) = call_json(&stack, "create_run", json!({"id_script": 1})).await;
    let father = father["id_run"].as_i64().unwrap();
    let (_, child) = call_json(
        &stack,
        "create_run",
        json!({"id_script": 1, "id_run_father": father}),
    )
    .await;
    let child = child["id_run"].as_i64().unwrap();

    let (status, body) = call_json(
        &stack,
        "insert_log",
        json!({"id_run": child, "log": "started", "debug": true}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Log inserted successfully");

    let (_, logs) = call_json(&stack, "get_logs", json!({"id_run": child})).await;
    assert_eq!(logs.as_array().unwrap().len(), 1);
    assert_eq!(logs[0]["log"], "started");

    let (status, _) = call_json(
        &stack,
        "insert_outcome",
        json!({"id_run": child, "id_category": 2, "id_type": 3, "v_integer": 42}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, outcomes) = call_json(
        &stack,
        "get_outcome_by_category_type",
        json!({"id_run": child, "id_category": 2, "id_type": 3}),
    )
    .await;
    assert_eq!(outcomes[0]["v_integer"], 42);

    let (_, fathers) = call_json(&stack, "get_father_runs", json!({})).await;
    assert_eq!(fathers.as_array().unwrap().len(), 1);
    assert_eq!(fathers[0]["id_run"].as_i64(), Some(father));

    let (_, children) = call_json(&stack, "get_child_runs", json!({"father_run_id": father})).await;
    assert_eq!(children.as_array().unwrap().len(), 1);

    let (status, body) = call_json(&stack, "delete_run", json!({"id_run": child})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], format!("Run {} deleted", child));

    let (status, _) = call_json(&stack, "get_logs", json!({"id_run": child})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call_json(&stack, "delete_run", json!({"id_run": child})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sum_and_save_persists_outcomes() {
    let stack = common::start_stack().await;
    let (status, body) = call_json(&stack, "sum_and_save", json!({"arg1": 2, "arg2": 3})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sum"], 5);
    let id_run = body["id_run"].as_i64().unwrap();

    let (_, outcomes) = call_json(&stack, "get_outcomes", json!({"id_run": id_run})).await;
    assert_eq!(outcomes.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_data_run_types() {
    let stack = common::start_stack().await;
    let item = json!({"id_category": 1, "id_type": 1, "category_name": "perf", "type_name": "latency"});

    let (status, _) = call_json(&stack, "insert_data_run_type", item.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call_json(&stack, "insert_data_run_type", item).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, types) = call_json(&stack, "get_data_run_types", json!({"category_name": "perf"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(types[0]["type_name"], "latency");
}

#[tokio::test]
async fn test_check_connection_and_catalogue() {
    let stack = common::start_stack().await;
    let (status, body) = call_json(&stack, "check_connection", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Database connection successful");

    let routes = stack.anonymous_client().routes().await.unwrap();
    assert_eq!(routes["routes"].as_array().unwrap().len(), 15);
}
