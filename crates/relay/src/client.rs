//! MCP client for the remote query tool.
//!
//! Every call opens its own MCP session (`initialize` → `notifications/initialized` → request →
//! `DELETE`). There is deliberately no session pool: one call, one session.

use crate::error::{RelayError, Result};
use crate::streamable_http::{self, HttpError};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use rmcp::model::{ClientJsonRpcMessage, ServerResult, Tool};
use rmcp::transport::streamable_http_client::StreamableHttpPostResponse;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::fmt::Debug;
use std::time::Duration;

const PROTOCOL_VERSION: &str = "2025-03-26";
const CLIENT_NAME: &str = "slackmcp-relay";

#[derive(Debug, Clone)]
pub struct McpClientConfig {
    /// Streamable HTTP endpoint of the MCP server.
    pub url: String,
    /// Pre-shared credential, sent as `Authorization: Bearer <api_key>`.
    pub api_key: String,
    /// Tool invoked by [`QueryTool::query`].
    pub tool_name: String,
    /// Overall per-HTTP-request timeout. `None` leaves it to the OS / server.
    pub timeout: Option<Duration>,
}

impl McpClientConfig {
    pub const DEFAULT_URL: &'static str = "https://mcp.jumpcloud.com/v1";
    pub const DEFAULT_TOOL: &'static str = "search_api";

    #[must_use]
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            tool_name: Self::DEFAULT_TOOL.to_string(),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_tool_name(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = tool_name.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Result of one tool call, resolved once right after the call returns.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// A JSON value: the tool's `structuredContent`, or the whole result serialized.
    Structured(Value),
    /// Text for results that could not be serialized.
    Opaque(String),
}

impl ToolOutput {
    /// Resolve a server result into a single known shape.
    ///
    /// Priority: `structuredContent` → generic serialization of the result → debug text.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Tool`] when the tool reports `isError: true`.
    pub fn from_server_result(result: ServerResult) -> Result<Self> {
        match result {
            ServerResult::CallToolResult(mut r) => {
                if r.is_error == Some(true) {
                    return Err(RelayError::Tool(content_text(&r.content)));
                }
                if let Some(structured) = r.structured_content.take() {
                    return Ok(Self::Structured(structured));
                }
                Ok(Self::generic(&r))
            }
            other => match serde_json::to_value(&other) {
                Ok(value) => Self::from_value(value),
                Err(_) => Ok(Self::Opaque(format!("{other:?}"))),
            },
        }
    }

    /// Same priority rules applied to a result rmcp could not type as a tool result.
    fn from_value(mut value: Value) -> Result<Self> {
        if value.get("isError").and_then(Value::as_bool) == Some(true) {
            return Err(RelayError::Tool(content_text(
                value.get("content").unwrap_or(&Value::Null),
            )));
        }
        let structured = value
            .as_object_mut()
            .and_then(|obj| obj.remove("structuredContent"))
            .filter(|v| !v.is_null());
        match structured {
            Some(structured) => Ok(Self::Structured(structured)),
            None => Ok(Self::Structured(value)),
        }
    }

    fn generic<T: Serialize + Debug>(value: &T) -> Self {
        serde_json::to_value(value).map_or_else(|_| Self::Opaque(format!("{value:?}")), Self::Structured)
    }

    /// Printable form: indented JSON for structured values, the text itself otherwise.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Structured(v) => serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()),
            Self::Opaque(s) => s.clone(),
        }
    }
}

/// Concatenated `text` entries of a tool result's content list.
fn content_text<T: Serialize>(content: &T) -> String {
    let texts: Vec<String> = match serde_json::to_value(content) {
        Ok(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    if texts.is_empty() {
        "tool reported an error without details".to_string()
    } else {
        texts.join("\n")
    }
}

/// The single operation the command handler depends on.
#[async_trait]
pub trait QueryTool: Send + Sync {
    /// Name of the remote tool, for reply formatting.
    fn tool_name(&self) -> &str;

    /// Forward `text` verbatim to the remote tool.
    async fn query(&self, text: &str) -> Result<ToolOutput>;
}

pub struct McpToolClient {
    http: reqwest::Client,
    url: String,
    headers: HeaderMap,
    tool_name: String,
}

fn transport_error(e: HttpError) -> RelayError {
    RelayError::Transport(e.to_string())
}

impl McpToolClient {
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] if the URL or API key is unusable.
    pub fn new(config: McpClientConfig) -> Result<Self> {
        let url = reqwest::Url::parse(&config.url)
            .map_err(|e| RelayError::Config(format!("invalid MCP url '{}': {e}", config.url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RelayError::Config(format!(
                "unsupported MCP url scheme: {}",
                url.scheme()
            )));
        }
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            return Err(RelayError::Config("MCP api key is empty".to_string()));
        }

        let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| RelayError::Config("MCP api key is not a valid header value".to_string()))?;
        bearer.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| RelayError::Config(format!("build http client: {e}")))?;

        Ok(Self {
            http,
            url: url.to_string(),
            headers,
            tool_name: config.tool_name,
        })
    }

    /// Call `name` with `arguments` in a fresh session.
    ///
    /// # Errors
    ///
    /// Returns an error on transport, handshake, or tool failure.
    pub async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolOutput> {
        let request = jsonrpc_request(
            1,
            "tools/call",
            json!({ "name": name, "arguments": arguments }),
        )?;
        let result = self.request_in_fresh_session(request).await?;
        ToolOutput::from_server_result(result)
    }

    /// List the tools the server exposes, in a fresh session.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or handshake failure, or if the server answers with
    /// something other than a tool list.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let request = jsonrpc_request(1, "tools/list", json!({}))?;
        match self.request_in_fresh_session(request).await? {
            ServerResult::ListToolsResult(r) => Ok(r.tools),
            other => Err(RelayError::Protocol(format!(
                "unexpected tools/list result: {other:?}"
            ))),
        }
    }

    async fn request_in_fresh_session(&self, request: ClientJsonRpcMessage) -> Result<ServerResult> {
        let session_id = self.open_session().await?;
        let outcome = self.send_request(request, session_id.as_deref()).await;
        self.close_session(session_id.as_deref()).await;
        outcome
    }

    async fn send_request(
        &self,
        request: ClientJsonRpcMessage,
        session_id: Option<&str>,
    ) -> Result<ServerResult> {
        let resp = streamable_http::post_message(&self.http, &self.url, request, session_id, &self.headers)
            .await
            .map_err(transport_error)?;
        streamable_http::read_first_response(resp).await
    }

    /// MCP handshake. Returns the server-assigned session id (stateless servers have none).
    async fn open_session(&self) -> Result<Option<String>> {
        let init = jsonrpc_request(
            0,
            "initialize",
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": { "name": CLIENT_NAME, "version": env!("CARGO_PKG_VERSION") }
            }),
        )?;
        let resp = streamable_http::post_message(&self.http, &self.url, init, None, &self.headers)
            .await
            .map_err(transport_error)?;
        let (_msg, session_id) = resp
            .expect_initialized::<reqwest::Error>()
            .await
            .map_err(|e| RelayError::Protocol(format!("initialize failed: {e}")))?;

        // The client must send `notifications/initialized` before any other request.
        if let Err(e) = self.notify_initialized(session_id.as_deref()).await {
            self.close_session(session_id.as_deref()).await;
            return Err(e);
        }
        Ok(session_id)
    }

    async fn notify_initialized(&self, session_id: Option<&str>) -> Result<()> {
        let initialized: ClientJsonRpcMessage = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }))?;
        match streamable_http::post_message(&self.http, &self.url, initialized, session_id, &self.headers)
            .await
            .map_err(transport_error)?
        {
            StreamableHttpPostResponse::Accepted => Ok(()),
            other => Err(RelayError::Protocol(format!(
                "unexpected response to notifications/initialized: {other:?}"
            ))),
        }
    }

    async fn close_session(&self, session_id: Option<&str>) {
        let Some(session_id) = session_id else {
            return;
        };
        if let Err(e) =
            streamable_http::delete_session(&self.http, &self.url, session_id, &self.headers).await
        {
            tracing::debug!(error = %e, "mcp session teardown failed");
        }
    }
}

fn jsonrpc_request(id: u64, method: &str, params: Value) -> Result<ClientJsonRpcMessage> {
    Ok(serde_json::from_value(json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    }))?)
}

#[async_trait]
impl QueryTool for McpToolClient {
    fn tool_name(&self) -> &str {
        &self.tool_name
    }

    async fn query(&self, text: &str) -> Result<ToolOutput> {
        let mut args = Map::new();
        args.insert("query".to_string(), Value::String(text.to_string()));
        self.call_tool(&self.tool_name, args).await
    }
}
