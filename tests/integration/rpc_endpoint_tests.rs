//! Integration tests for `POST /rpc`.

use serde_json::json;

use agent_stream::models::task::TaskState;
use agent_stream::rpc::RPC_ERROR_CODE;

use super::test_helpers::{rpc, spawn_server, test_config, wait_for_terminal};

#[tokio::test]
async fn invoke_then_status_over_http() {
    let server = spawn_server(test_config(20)).await;

    let invoked = rpc(
        &server.base_url,
        &json!({
            "jsonrpc": "2.0",
            "method": "agent/invoke",
            "id": "http-1",
            "params": { "skill_id": "echo", "args": { "text": "hello" } }
        }),
    )
    .await;
    assert_eq!(invoked["jsonrpc"], json!("2.0"));
    assert_eq!(invoked["id"], json!("http-1"));
    assert_eq!(invoked["result"]["metadata"]["taskId"], json!("http-1"));
    assert_eq!(
        invoked["result"]["metadata"]["status"]["state"],
        json!("running")
    );

    assert_eq!(
        wait_for_terminal(&server.state, "http-1").await,
        TaskState::Complete
    );

    let status = rpc(
        &server.base_url,
        &json!({ "jsonrpc": "2.0", "method": "task/status", "id": "http-1" }),
    )
    .await;
    assert_eq!(status["result"]["task"]["state"], json!("complete"));
    assert_eq!(
        status["result"]["task"]["result"],
        json!({ "skill": "echo", "args": { "text": "hello" } })
    );
}

#[tokio::test]
async fn unknown_method_returns_rpc_error_code() {
    let server = spawn_server(test_config(20)).await;

    let response = rpc(
        &server.base_url,
        &json!({ "jsonrpc": "2.0", "method": "agent/teleport", "id": 5 }),
    )
    .await;
    assert_eq!(response["id"], json!(5));
    assert_eq!(response["error"]["code"], json!(RPC_ERROR_CODE));
    assert!(response.get("result").is_none());
}

#[tokio::test]
async fn undecodable_request_returns_rpc_error_code() {
    let server = spawn_server(test_config(20)).await;

    let response = rpc(&server.base_url, &json!({ "id": "no-method" })).await;
    assert_eq!(response["id"], json!("no-method"));
    assert_eq!(response["error"]["code"], json!(RPC_ERROR_CODE));
}

#[tokio::test]
async fn status_of_unknown_task_returns_rpc_error_code() {
    let server = spawn_server(test_config(20)).await;

    let response = rpc(
        &server.base_url,
        &json!({ "method": "agent/status", "params": { "args": { "id": "ghost" } } }),
    )
    .await;
    assert_eq!(response["error"]["code"], json!(RPC_ERROR_CODE));
}

#[tokio::test]
async fn rpc_route_rejects_get() {
    let server = spawn_server(test_config(20)).await;

    let resp = reqwest::get(format!("{}/rpc", server.base_url))
        .await
        .expect("HTTP GET /rpc");
    assert_eq!(resp.status(), 405);
}
