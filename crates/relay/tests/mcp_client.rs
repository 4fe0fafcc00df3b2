use serde_json::{Map, Value, json};
use slackmcp_relay::{McpClientConfig, McpToolClient, QueryTool as _, RelayError, ToolOutput};
use slackmcp_test_support::{MockCallResult, MockMcpConfig, MockMcpServer};

const API_KEY: &str = "jca_test_key";

async fn start(result: MockCallResult, sse: bool) -> anyhow::Result<MockMcpServer> {
    let mut config = MockMcpConfig::new(API_KEY, result);
    config.sse = sse;
    MockMcpServer::start(config).await
}

fn client_for(server: &MockMcpServer, api_key: &str) -> anyhow::Result<McpToolClient> {
    Ok(McpToolClient::new(McpClientConfig::new(&server.url, api_key))?)
}

#[tokio::test]
async fn query_returns_structured_content_and_tears_down_session() -> anyhow::Result<()> {
    let server = start(
        MockCallResult::Result(json!({
            "content": [{ "type": "text", "text": "{\"groups\":3}" }],
            "structuredContent": { "groups": 3 }
        })),
        false,
    )
    .await?;
    let client = client_for(&server, API_KEY)?;

    let out = client.query("count users by group").await?;
    assert_eq!(out, ToolOutput::Structured(json!({ "groups": 3 })));

    assert_eq!(
        server.calls(),
        vec![json!({ "name": "search_api", "arguments": { "query": "count users by group" } })]
    );
    assert_eq!(server.opened_sessions(), server.deleted_sessions());
    Ok(())
}

#[tokio::test]
async fn every_query_opens_a_fresh_session() -> anyhow::Result<()> {
    let server = start(
        MockCallResult::Result(json!({ "content": [{ "type": "text", "text": "ok" }] })),
        false,
    )
    .await?;
    let client = client_for(&server, API_KEY)?;

    client.query("a").await?;
    client.query("b").await?;

    let opened = server.opened_sessions();
    assert_eq!(opened.len(), 2);
    assert_ne!(opened[0], opened[1]);
    assert_eq!(server.deleted_sessions(), opened);
    Ok(())
}

#[tokio::test]
async fn sse_responses_are_supported() -> anyhow::Result<()> {
    let server = start(
        MockCallResult::Result(json!({
            "content": [],
            "structuredContent": { "users": ["ada"] }
        })),
        true,
    )
    .await?;
    let client = client_for(&server, API_KEY)?;

    let out = client.query("list users").await?;
    assert_eq!(out, ToolOutput::Structured(json!({ "users": ["ada"] })));
    Ok(())
}

#[tokio::test]
async fn text_only_result_falls_back_to_whole_result() -> anyhow::Result<()> {
    let server = start(
        MockCallResult::Result(json!({ "content": [{ "type": "text", "text": "plain answer" }] })),
        false,
    )
    .await?;
    let client = client_for(&server, API_KEY)?;

    let rendered = client.query("q").await?.render();
    assert!(rendered.contains("\"plain answer\""));
    assert!(rendered.contains("\"content\""));
    Ok(())
}

#[tokio::test]
async fn tool_side_errors_surface_as_errors_and_still_tear_down() -> anyhow::Result<()> {
    let server = start(
        MockCallResult::Result(json!({
            "content": [{ "type": "text", "text": "unsupported query" }],
            "isError": true
        })),
        false,
    )
    .await?;
    let client = client_for(&server, API_KEY)?;

    let err = client.query("q").await.unwrap_err();
    assert!(matches!(err, RelayError::Tool(_)));
    assert!(err.to_string().contains("unsupported query"));
    assert_eq!(server.deleted_sessions().len(), 1);
    Ok(())
}

#[tokio::test]
async fn unrecognized_content_still_yields_structured_content() -> anyhow::Result<()> {
    let server = start(
        MockCallResult::Result(json!({
            "content": [{ "type": "weird", "x": 1 }],
            "structuredContent": { "groups": 3 }
        })),
        false,
    )
    .await?;
    let client = client_for(&server, API_KEY)?;

    let out = client.query("count users by group").await?;
    assert_eq!(out, ToolOutput::Structured(json!({ "groups": 3 })));
    Ok(())
}

#[tokio::test]
async fn malformed_error_result_is_still_an_error() -> anyhow::Result<()> {
    let server = start(
        MockCallResult::Result(json!({ "content": "not-a-list", "isError": true })),
        false,
    )
    .await?;
    let client = client_for(&server, API_KEY)?;

    let err = client.query("q").await.unwrap_err();
    assert!(matches!(err, RelayError::Tool(_)));
    assert_eq!(server.deleted_sessions().len(), 1);
    Ok(())
}

#[tokio::test]
async fn jsonrpc_errors_surface_with_their_message() -> anyhow::Result<()> {
    let server = start(MockCallResult::JsonRpcError("backend exploded".to_string()), false).await?;
    let client = client_for(&server, API_KEY)?;

    let err = client.query("q").await.unwrap_err();
    assert!(err.to_string().contains("backend exploded"));
    assert_eq!(server.deleted_sessions().len(), 1);
    Ok(())
}

#[tokio::test]
async fn wrong_credential_fails_without_a_session() -> anyhow::Result<()> {
    let server = start(MockCallResult::Result(json!({ "content": [] })), false).await?;
    let client = client_for(&server, "wrong")?;

    let err = client.query("q").await.unwrap_err();
    assert!(err.to_string().contains("401"));
    assert!(server.opened_sessions().is_empty());
    assert!(server.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() -> anyhow::Result<()> {
    let port = slackmcp_test_support::pick_unused_port()?;
    let client = McpToolClient::new(McpClientConfig::new(
        format!("http://127.0.0.1:{port}/mcp"),
        API_KEY,
    ))?;

    let err = client.query("q").await.unwrap_err();
    assert!(matches!(err, RelayError::Transport(_)));
    Ok(())
}

#[tokio::test]
async fn list_tools_and_generic_call() -> anyhow::Result<()> {
    let server = start(
        MockCallResult::Result(json!({ "content": [], "structuredContent": { "id": "u1" } })),
        false,
    )
    .await?;
    let client = client_for(&server, API_KEY)?;

    let tools = client.list_tools().await?;
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "search_api");

    let mut args = Map::new();
    args.insert("id".to_string(), Value::String("u1".to_string()));
    client.call_tool("user_get", args).await?;
    assert_eq!(
        server.calls(),
        vec![json!({ "name": "user_get", "arguments": { "id": "u1" } })]
    );
    assert_eq!(server.deleted_sessions().len(), 2);
    Ok(())
}
