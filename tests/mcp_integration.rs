#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! MCP Server Integration Tests
//!
//! Drives the fully registered server through the JSON-RPC message handler,
//! the same path both transports use.

use serde_json::{Value, json};
use std::sync::Arc;
use todo_mcp::commands::build_server;
use todo_mcp::config::Config;
use todo_mcp::mcp::resources::{WIDGET_MIME_TYPE, Widget};
use todo_mcp::mcp::server::ConnectionState;
use todo_mcp::mcp::{JsonRpcMessage, McpServer, MessageHandler, RequestId};
use todo_mcp::todo::TodoStore;

const WIDGET_HTML: &str = "<div id=\"todo-root\"></div><script>window.openai</script>";

/// Test helper building the server with a fresh store and in-memory widget
async fn setup_test_server() -> (Arc<McpServer>, MessageHandler) {
    let config = Config::default();
    let widget = Widget::new(
        config.widget.uri.clone(),
        config.widget.name.clone(),
        WIDGET_HTML,
    );
    let server = build_server(&config, widget, TodoStore::shared())
        .await
        .expect("Failed to build server");
    let handler = MessageHandler::new(Arc::clone(&server));
    (server, handler)
}

/// Send a request and return its result, panicking on a JSON-RPC error
async fn request(handler: &MessageHandler, id: i64, method: &str, params: Value) -> Value {
    match send(handler, id, method, params).await {
        JsonRpcMessage::Response(response) => response.result,
        other => panic!("Expected response to {}, got {:?}", method, other),
    }
}

/// Send a request and return the JSON-RPC error code
async fn request_error(handler: &MessageHandler, id: i64, method: &str, params: Value) -> i32 {
    match send(handler, id, method, params).await {
        JsonRpcMessage::ErrorResponse(response) => response.error.code,
        other => panic!("Expected error for {}, got {:?}", method, other),
    }
}

async fn send(handler: &MessageHandler, id: i64, method: &str, params: Value) -> JsonRpcMessage {
    let message = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    });
    handler
        .handle_value(message)
        .await
        .expect("requests always get a reply")
}

async fn call_tool(handler: &MessageHandler, id: i64, name: &str, arguments: Value) -> Value {
    request(
        handler,
        id,
        "tools/call",
        json!({"name": name, "arguments": arguments}),
    )
    .await
}

/// Test the initialize handshake and connection state transitions
#[tokio::test]
async fn mcp_server_initialization() {
    let (server, handler) = setup_test_server().await;
    assert_eq!(server.connection_state().await, ConnectionState::Uninitialized);

    let result = request(
        &handler,
        1,
        "initialize",
        json!({
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "integration", "version": "0.1"}
        }),
    )
    .await;

    assert_eq!(result["protocolVersion"], json!("2025-03-26"));
    assert!(result["capabilities"]["tools"].is_object());
    assert!(result["capabilities"]["resources"].is_object());
    assert!(result["capabilities"]["prompts"].is_object());
    assert!(result["instructions"].is_string());
    assert_eq!(server.connection_state().await, ConnectionState::Initializing);

    let initialized = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    assert!(handler.handle_value(initialized).await.is_none());
    assert_eq!(server.connection_state().await, ConnectionState::Ready);
}

#[tokio::test]
async fn unknown_protocol_version_is_negotiated() {
    let (_server, handler) = setup_test_server().await;

    let result = request(
        &handler,
        1,
        "initialize",
        json!({
            "protocolVersion": "1999-01-01",
            "capabilities": {},
            "clientInfo": {"name": "old-client", "version": "0.1"}
        }),
    )
    .await;

    assert_eq!(result["protocolVersion"], json!("2025-06-18"));
}

/// Test that every tool is advertised, sorted, with widget metadata on the to-do tools
#[tokio::test]
async fn tools_list() {
    let (_server, handler) = setup_test_server().await;

    let result = request(&handler, 2, "tools/list", json!({})).await;
    let names: Vec<&str> = result["tools"]
        .as_array()
        .expect("tools array")
        .iter()
        .filter_map(|tool| tool["name"].as_str())
        .collect();
    assert_eq!(names, ["add", "add_todo", "complete_todo", "count_letters"]);

    let add_todo = &result["tools"][1];
    assert_eq!(add_todo["inputSchema"]["type"], json!("object"));
    assert_eq!(
        add_todo["_meta"]["openai/outputTemplate"],
        json!("ui://widget/todo.html")
    );
    assert!(result["tools"][0].get("_meta").is_none());
}

/// Scenario: add then complete
#[tokio::test]
async fn add_then_complete() {
    let (_server, handler) = setup_test_server().await;

    let added = call_tool(&handler, 1, "add_todo", json!({"title": "Buy milk"})).await;
    assert_eq!(added["isError"], json!(false));
    assert_eq!(added["content"][0]["text"], json!("Added \"Buy milk\"."));
    assert_eq!(
        added["structuredContent"]["tasks"],
        json!([{"id": "todo-1", "title": "Buy milk", "completed": false}])
    );

    let completed = call_tool(&handler, 2, "complete_todo", json!({"id": "todo-1"})).await;
    assert_eq!(completed["isError"], json!(false));
    assert_eq!(
        completed["structuredContent"]["message"],
        json!("Completed \"Buy milk\".")
    );
    assert_eq!(
        completed["structuredContent"]["tasks"][0]["completed"],
        json!(true)
    );
    assert_eq!(
        completed["_meta"]["openai/toolInvocation/invoked"],
        json!("Completed todo")
    );
}

/// Scenario: a blank title is a tool error and consumes no id
#[tokio::test]
async fn blank_title_rejected() {
    let (_server, handler) = setup_test_server().await;

    let rejected = call_tool(&handler, 1, "add_todo", json!({"title": "   "})).await;
    assert_eq!(rejected["isError"], json!(true));
    assert_eq!(rejected["structuredContent"]["message"], json!("Missing title."));
    assert_eq!(rejected["structuredContent"]["tasks"], json!([]));

    let added = call_tool(&handler, 2, "add_todo", json!({"title": "Real task"})).await;
    assert_eq!(
        added["structuredContent"]["tasks"][0]["id"],
        json!("todo-1")
    );
}

/// Scenario: completing an unknown id leaves the list untouched
#[tokio::test]
async fn unknown_id() {
    let (_server, handler) = setup_test_server().await;
    call_tool(&handler, 1, "add_todo", json!({"title": "Buy milk"})).await;

    let result = call_tool(&handler, 2, "complete_todo", json!({"id": "todo-7"})).await;
    assert_eq!(result["isError"], json!(true));
    assert_eq!(
        result["structuredContent"]["message"],
        json!("Todo todo-7 was not found.")
    );
    assert_eq!(
        result["structuredContent"]["tasks"],
        json!([{"id": "todo-1", "title": "Buy milk", "completed": false}])
    );
}

/// Scenario: completing twice succeeds both times
#[tokio::test]
async fn repeated_completion() {
    let (_server, handler) = setup_test_server().await;
    call_tool(&handler, 1, "add_todo", json!({"title": "Walk dog"})).await;

    let first = call_tool(&handler, 2, "complete_todo", json!({"id": "todo-1"})).await;
    let second = call_tool(&handler, 3, "complete_todo", json!({"id": "todo-1"})).await;

    assert_eq!(first["isError"], json!(false));
    assert_eq!(second["isError"], json!(false));
    assert_eq!(first["structuredContent"], second["structuredContent"]);
}

#[tokio::test]
async fn missing_argument_is_tool_error() {
    let (_server, handler) = setup_test_server().await;

    let result = request(&handler, 1, "tools/call", json!({"name": "complete_todo"})).await;
    assert_eq!(result["isError"], json!(true));
    assert_eq!(result["structuredContent"]["message"], json!("Missing todo id."));
}

#[tokio::test]
async fn utility_tools() {
    let (_server, handler) = setup_test_server().await;

    let sum = call_tool(&handler, 1, "add", json!({"a": 19, "b": 23})).await;
    assert_eq!(sum["content"][0]["text"], json!("42"));

    let count = call_tool(
        &handler,
        2,
        "count_letters",
        json!({"word": "Strawberry", "letter": "R"}),
    )
    .await;
    assert_eq!(count["structuredContent"]["count"], json!(3));
}

/// Test protocol-level failures map to JSON-RPC error codes
#[tokio::test]
async fn error_codes() {
    let (_server, handler) = setup_test_server().await;

    let code = request_error(&handler, 1, "tools/call", json!({"name": "delete_todo"})).await;
    assert_eq!(code, -32001);

    let code = request_error(
        &handler,
        2,
        "tools/call",
        json!({"name": "add", "arguments": {"a": "one", "b": 2}}),
    )
    .await;
    assert_eq!(code, -32602);

    let code = request_error(
        &handler,
        3,
        "tools/call",
        json!({"name": "add_todo", "arguments": {"title": "x", "priority": 1}}),
    )
    .await;
    assert_eq!(code, -32602);

    let code = request_error(&handler, 4, "todos/list", json!({})).await;
    assert_eq!(code, -32601);

    let code = request_error(&handler, 5, "resources/read", json!({"uri": "ui://nope"})).await;
    assert_eq!(code, -32002);

    let code = request_error(&handler, 6, "prompts/get", json!({"name": "farewell"})).await;
    assert_eq!(code, -32003);
}

/// Method parameters failing their schema are invalid params, not invalid requests
#[tokio::test]
async fn invalid_method_params() {
    let (_server, handler) = setup_test_server().await;

    let code = request_error(&handler, 1, "resources/read", json!({})).await;
    assert_eq!(code, -32602);

    let code = request_error(
        &handler,
        2,
        "tools/call",
        json!({"name": "add", "arguments": [1, 2]}),
    )
    .await;
    assert_eq!(code, -32602);

    let code = request_error(&handler, 3, "prompts/get", json!({"name": 5})).await;
    assert_eq!(code, -32602);

    let code = request_error(
        &handler,
        4,
        "initialize",
        json!({"protocolVersion": "2025-06-18", "capabilities": {}}),
    )
    .await;
    assert_eq!(code, -32602);

    match send(&handler, 5, "resources/read", json!({"uri": ""})).await {
        JsonRpcMessage::ErrorResponse(response) => {
            assert_eq!(response.error.code, -32602);
            assert!(matches!(response.id, Some(RequestId::Number(5))));
        }
        other => panic!("Expected error response, got {:?}", other),
    }
}

#[tokio::test]
async fn malformed_messages() {
    let (_server, handler) = setup_test_server().await;

    match handler.handle_line("{\"jsonrpc\": \"2.0\",").await {
        Some(JsonRpcMessage::ErrorResponse(response)) => {
            assert_eq!(response.error.code, -32700);
            assert!(response.id.is_none());
        }
        other => panic!("Expected parse error, got {:?}", other),
    }

    let not_rpc = json!({"jsonrpc": "1.0", "id": 9, "method": "ping"});
    match handler.handle_value(not_rpc).await {
        Some(JsonRpcMessage::ErrorResponse(response)) => {
            assert_eq!(response.error.code, -32600);
        }
        other => panic!("Expected invalid request, got {:?}", other),
    }
}

/// Test the widget resource and the greeting template
#[tokio::test]
async fn resources() {
    let (_server, handler) = setup_test_server().await;

    let listed = request(&handler, 1, "resources/list", json!({})).await;
    assert_eq!(listed["resources"][0]["uri"], json!("ui://widget/todo.html"));
    assert_eq!(listed["resources"][0]["mimeType"], json!(WIDGET_MIME_TYPE));
    assert_eq!(
        listed["resources"][0]["_meta"]["openai/outputTemplate"],
        json!("ui://widget/todo.html")
    );

    let templates = request(&handler, 2, "resources/templates/list", json!({})).await;
    assert_eq!(
        templates["resourceTemplates"][0]["uriTemplate"],
        json!("greeting://{name}")
    );

    let widget = request(
        &handler,
        3,
        "resources/read",
        json!({"uri": "ui://widget/todo.html"}),
    )
    .await;
    assert_eq!(widget["contents"][0]["text"], json!(WIDGET_HTML));
    assert_eq!(widget["contents"][0]["mimeType"], json!(WIDGET_MIME_TYPE));

    let greeting = request(
        &handler,
        4,
        "resources/read",
        json!({"uri": "greeting://Ada"}),
    )
    .await;
    assert_eq!(greeting["contents"][0]["text"], json!("Hello, Ada!"));
}

#[tokio::test]
async fn prompts() {
    let (_server, handler) = setup_test_server().await;

    let listed = request(&handler, 1, "prompts/list", json!({})).await;
    assert_eq!(listed["prompts"][0]["name"], json!("greet_user"));

    let prompt = request(
        &handler,
        2,
        "prompts/get",
        json!({"name": "greet_user", "arguments": {"name": "Ada", "style": "formal"}}),
    )
    .await;
    assert_eq!(prompt["messages"][0]["role"], json!("user"));
    assert_eq!(
        prompt["messages"][0]["content"]["text"],
        json!("Please write a formal, professional greeting for someone named Ada.")
    );

    let code = request_error(&handler, 3, "prompts/get", json!({"name": "greet_user"})).await;
    assert_eq!(code, -32602);
}

#[tokio::test]
async fn ping_and_statistics() {
    let (server, handler) = setup_test_server().await;

    assert_eq!(request(&handler, 1, "ping", json!({})).await, json!({}));

    let statistics = server.server_statistics().await;
    assert_eq!(
        statistics.registered_tools,
        ["add", "add_todo", "complete_todo", "count_letters"]
    );
    assert_eq!(statistics.registered_resources, ["ui://widget/todo.html"]);
    assert_eq!(statistics.registered_resource_templates, ["greeting://{name}"]);
    assert_eq!(statistics.registered_prompts, ["greet_user"]);
}

/// Separate servers never share to-do state
#[tokio::test]
async fn stores_are_per_server() {
    let (_first, first_handler) = setup_test_server().await;
    let (_second, second_handler) = setup_test_server().await;

    call_tool(&first_handler, 1, "add_todo", json!({"title": "Only here"})).await;
    let result = call_tool(&second_handler, 1, "add_todo", json!({"title": "Fresh"})).await;

    assert_eq!(result["structuredContent"]["tasks"][0]["id"], json!("todo-1"));
}
