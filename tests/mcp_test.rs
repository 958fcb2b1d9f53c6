mod common;

use code2flow_mcp::mcp::transport::*;
use code2flow_mcp::mcp::McpServer;
use common::{stub_dispatcher, StubBehavior};
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;

/// Feeds `requests` to a server and returns its responses sorted by id.
async fn run_session(server: &McpServer, requests: &[Value]) -> Vec<Value> {
    let input: String = requests
        .iter()
        .map(|r| format!("{}\n", r))
        .collect();

    let (server_out, mut client_in) = tokio::io::duplex(1 << 20);
    server.serve(input.as_bytes(), server_out).await.unwrap();

    let mut output = String::new();
    client_in.read_to_string(&mut output).await.unwrap();

    let mut responses: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    responses.sort_by_key(|r| r["id"].as_i64().unwrap_or(-1));
    responses
}

async fn call(server: &McpServer, request: Value) -> Value {
    let mut responses = run_session(server, &[request]).await;
    assert_eq!(responses.len(), 1);
    responses.remove(0)
}

fn tool_payload(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

#[tokio::test]
async fn test_initialize_advertises_tools_and_resources() {
    let (dispatcher, _, _) = stub_dispatcher(StubBehavior::WritePng);
    let server = McpServer::new(dispatcher);

    let response = call(
        &server,
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
    )
    .await;
    let caps = &response["result"]["capabilities"];
    assert!(caps["tools"].is_object());
    assert!(caps["resources"].is_object());
    assert_eq!(response["result"]["serverInfo"]["name"], "code2flow-mcp");
}

#[tokio::test]
async fn test_notifications_get_no_response() {
    let (dispatcher, _, _) = stub_dispatcher(StubBehavior::WritePng);
    let server = McpServer::new(dispatcher);

    let responses = run_session(
        &server,
        &[
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}),
        ],
    )
    .await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["id"], 2);
}

#[tokio::test]
async fn test_tools_list() {
    let (dispatcher, _, _) = stub_dispatcher(StubBehavior::WritePng);
    let server = McpServer::new(dispatcher);

    let response = call(
        &server,
        json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
    )
    .await;
    let tools = response["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 3);
    assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
}

#[tokio::test]
async fn test_generate_then_read_resource() {
    let (dispatcher, _, _) = stub_dispatcher(StubBehavior::WritePng);
    let server = McpServer::new(dispatcher);

    let response = call(
        &server,
        json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": {"name": "generate_call_graph", "arguments": {"source_paths": ["app.py"]}}
        }),
    )
    .await;
    assert_eq!(response["result"]["isError"], false);
    let uri = tool_payload(&response)["resource_uri"]
        .as_str()
        .unwrap()
        .to_string();

    let listed = call(
        &server,
        json!({"jsonrpc": "2.0", "id": 2, "method": "resources/list"}),
    )
    .await;
    let uris: Vec<&str> = listed["result"]["resources"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["uri"].as_str())
        .collect();
    assert!(uris.contains(&uri.as_str()));
    assert!(uris.contains(&"help://code2flow"));
    assert!(uris.contains(&"languages://supported"));

    let read = call(
        &server,
        json!({"jsonrpc": "2.0", "id": 3, "method": "resources/read", "params": {"uri": uri}}),
    )
    .await;
    let contents = &read["result"]["contents"][0];
    assert_eq!(contents["mimeType"], "image/png");
    assert!(contents["blob"].as_str().unwrap().starts_with("iVBORw0KGgo"));
}

#[tokio::test]
async fn test_tool_failure_is_error_result_not_rpc_error() {
    let (dispatcher, stub, _) = stub_dispatcher(StubBehavior::WritePng);
    let server = McpServer::new(dispatcher);

    let response = call(
        &server,
        json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": {"name": "generate_call_graph", "arguments": {"source_paths": []}}
        }),
    )
    .await;
    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], true);
    let payload = tool_payload(&response);
    assert!(payload["error"].as_str().unwrap().contains("source_paths"));
    assert!(payload["resource_uri"].is_null());
    assert_eq!(stub.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_tool_is_error_result() {
    let (dispatcher, _, _) = stub_dispatcher(StubBehavior::WritePng);
    let server = McpServer::new(dispatcher);

    let response = call(
        &server,
        json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": {"name": "rm_rf", "arguments": {}}
        }),
    )
    .await;
    assert_eq!(response["result"]["isError"], true);
    assert!(tool_payload(&response)["error"]
        .as_str()
        .unwrap()
        .contains("unknown tool"));
}

#[tokio::test]
async fn test_read_unknown_resource_is_not_found() {
    let (dispatcher, _, _) = stub_dispatcher(StubBehavior::WritePng);
    let server = McpServer::new(dispatcher);

    let response = call(
        &server,
        json!({
            "jsonrpc": "2.0", "id": 1, "method": "resources/read",
            "params": {"uri": "call-graph://does-not-exist.png"}
        }),
    )
    .await;
    assert_eq!(
        response["error"]["code"],
        ErrorCode::ResourceNotFound.as_i32()
    );
    assert_eq!(response["error"]["data"]["uri"], "call-graph://does-not-exist.png");
    assert_eq!(
        response["error"]["message"],
        "resource not found: call-graph://does-not-exist.png"
    );
}

#[tokio::test]
async fn test_static_resources_are_stable() {
    let (dispatcher, _, _) = stub_dispatcher(StubBehavior::WritePng);
    let server = McpServer::new(dispatcher);

    for uri in ["help://code2flow", "languages://supported"] {
        let responses = run_session(
            &server,
            &[
                json!({"jsonrpc": "2.0", "id": 1, "method": "resources/read", "params": {"uri": uri}}),
                json!({"jsonrpc": "2.0", "id": 2, "method": "resources/read", "params": {"uri": uri}}),
            ],
        )
        .await;
        let first = &responses[0]["result"]["contents"][0];
        let second = &responses[1]["result"]["contents"][0];
        assert!(!first["text"].as_str().unwrap().is_empty());
        assert_eq!(first, second);
    }
}

#[tokio::test]
async fn test_malformed_json_and_unknown_method() {
    let (dispatcher, _, _) = stub_dispatcher(StubBehavior::WritePng);
    let server = McpServer::new(dispatcher);

    let (server_out, mut client_in) = tokio::io::duplex(1 << 16);
    let input = "{not json\n{\"jsonrpc\":\"2.0\",\"id\":5,\"method\":\"prompts/list\"}\n";
    server.serve(input.as_bytes(), server_out).await.unwrap();

    let mut output = String::new();
    client_in.read_to_string(&mut output).await.unwrap();
    let codes: Vec<i64> = output
        .lines()
        .map(|l| serde_json::from_str::<Value>(l).unwrap()["error"]["code"].as_i64().unwrap())
        .collect();
    assert_eq!(codes.len(), 2);
    assert!(codes.contains(&(ErrorCode::ParseError.as_i32() as i64)));
    assert!(codes.contains(&(ErrorCode::MethodNotFound.as_i32() as i64)));
}

#[tokio::test]
async fn test_invalid_utf8_line_does_not_end_session() {
    let (dispatcher, _, _) = stub_dispatcher(StubBehavior::WritePng);
    let server = McpServer::new(dispatcher);

    let mut input = Vec::new();
    input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n");
    input.extend_from_slice(b"\xff\xfe\n");
    input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n");

    let (server_out, mut client_in) = tokio::io::duplex(1 << 16);
    server.serve(&input[..], server_out).await.unwrap();

    let mut output = String::new();
    client_in.read_to_string(&mut output).await.unwrap();
    let responses: Vec<Value> = output
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(responses.len(), 3);

    for id in [1, 2] {
        let pong = responses.iter().find(|r| r["id"] == id).unwrap();
        assert_eq!(pong["result"], json!({}));
    }
    let parse_errors = responses
        .iter()
        .filter(|r| r["error"]["code"] == ErrorCode::ParseError.as_i32())
        .count();
    assert_eq!(parse_errors, 1);
}

#[tokio::test]
async fn test_tools_call_without_name() {
    let (dispatcher, _, _) = stub_dispatcher(StubBehavior::WritePng);
    let server = McpServer::new(dispatcher);

    let response = call(
        &server,
        json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {"arguments": {}}}),
    )
    .await;
    assert_eq!(response["error"]["code"], ErrorCode::InvalidParams.as_i32());
}
