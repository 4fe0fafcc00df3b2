//! Minimal MCP streamable-HTTP server for integration tests.
//!
//! It speaks JSON-RPC directly and does not reuse any production code paths.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse as _, Response},
    routing::post,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

const SESSION_HEADER: &str = "mcp-session-id";

/// What `tools/call` answers with.
#[derive(Debug, Clone)]
pub enum MockCallResult {
    /// A `CallToolResult` JSON object.
    Result(Value),
    /// A JSON-RPC error with this message.
    JsonRpcError(String),
}

#[derive(Debug, Clone)]
pub struct MockMcpConfig {
    pub api_key: String,
    pub call_result: MockCallResult,
    /// Answer requests over `text/event-stream` instead of `application/json`.
    pub sse: bool,
}

impl MockMcpConfig {
    #[must_use]
    pub fn new(api_key: &str, call_result: MockCallResult) -> Self {
        Self {
            api_key: api_key.to_string(),
            call_result,
            sse: false,
        }
    }
}

struct MockState {
    config: MockMcpConfig,
    next_session: AtomicU64,
    open_sessions: Mutex<Vec<String>>,
    deleted_sessions: Mutex<Vec<String>>,
    calls: Mutex<Vec<Value>>,
}

pub struct MockMcpServer {
    /// Full MCP endpoint URL (`http://127.0.0.1:<port>/mcp`).
    pub url: String,
    state: Arc<MockState>,
    _shutdown: tokio::sync::oneshot::Sender<()>,
}

impl MockMcpServer {
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start(config: MockMcpConfig) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            config,
            next_session: AtomicU64::new(1),
            open_sessions: Mutex::new(Vec::new()),
            deleted_sessions: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/mcp", post(handle_post).delete(handle_delete))
            .with_state(state.clone());
        let (base, shutdown) = crate::serve_ephemeral(app).await?;
        Ok(Self {
            url: format!("{base}/mcp"),
            state,
            _shutdown: shutdown,
        })
    }

    /// `params` of every `tools/call` received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Value> {
        self.state.calls.lock().clone()
    }

    #[must_use]
    pub fn deleted_sessions(&self) -> Vec<String> {
        self.state.deleted_sessions.lock().clone()
    }

    #[must_use]
    pub fn opened_sessions(&self) -> Vec<String> {
        self.state.open_sessions.lock().clone()
    }
}

fn authorized(state: &MockState, headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {}", state.config.api_key);
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|v| v == expected)
}

fn session_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}

async fn handle_post(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !authorized(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, "invalid bearer token").into_response();
    }
    let Ok(msg) = serde_json::from_slice::<Value>(&body) else {
        return (StatusCode::BAD_REQUEST, "invalid json").into_response();
    };
    let method = msg.get("method").and_then(Value::as_str).unwrap_or_default();

    if method == "initialize" {
        let id = msg.get("id").cloned().unwrap_or(Value::Null);
        let session = format!("session-{}", state.next_session.fetch_add(1, Ordering::SeqCst));
        state.open_sessions.lock().push(session.clone());
        let result = json!({
            "protocolVersion": msg
                .get("params")
                .and_then(|p| p.get("protocolVersion"))
                .cloned()
                .unwrap_or_else(|| json!("2025-03-26")),
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "slackmcp-mock-mcp", "version": "0" }
        });
        let mut resp = reply(&state, &jsonrpc_ok(&id, &result));
        if let Ok(v) = HeaderValue::from_str(&session) {
            resp.headers_mut().insert(SESSION_HEADER, v);
        }
        return resp;
    }

    let known_session = session_of(&headers).is_some_and(|sid| {
        state.open_sessions.lock().contains(&sid) && !state.deleted_sessions.lock().contains(&sid)
    });
    if !known_session {
        return (StatusCode::NOT_FOUND, "unknown session").into_response();
    }

    // Notifications carry no id.
    let Some(id) = msg.get("id").cloned() else {
        return StatusCode::ACCEPTED.into_response();
    };

    match method {
        "tools/list" => reply(
            &state,
            &jsonrpc_ok(
                &id,
                &json!({
                    "tools": [{
                        "name": "search_api",
                        "description": "Natural-language search",
                        "inputSchema": {
                            "type": "object",
                            "properties": { "query": { "type": "string" } }
                        }
                    }]
                }),
            ),
        ),
        "tools/call" => {
            let params = msg.get("params").cloned().unwrap_or(Value::Null);
            state.calls.lock().push(params);
            match &state.config.call_result {
                MockCallResult::Result(result) => reply(&state, &jsonrpc_ok(&id, result)),
                MockCallResult::JsonRpcError(message) => reply(
                    &state,
                    &json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": { "code": -32603, "message": message }
                    }),
                ),
            }
        }
        _ => reply(
            &state,
            &json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": "method not found" }
            }),
        ),
    }
}

async fn handle_delete(State(state): State<Arc<MockState>>, headers: HeaderMap) -> StatusCode {
    if !authorized(&state, &headers) {
        return StatusCode::UNAUTHORIZED;
    }
    match session_of(&headers) {
        Some(sid) => {
            state.deleted_sessions.lock().push(sid);
            StatusCode::OK
        }
        None => StatusCode::BAD_REQUEST,
    }
}

fn reply(state: &MockState, msg: &Value) -> Response {
    if state.config.sse {
        let body = format!("event: message\ndata: {msg}\n\n");
        ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
    } else {
        ([(header::CONTENT_TYPE, "application/json")], msg.to_string()).into_response()
    }
}

fn jsonrpc_ok(id: &Value, result: &Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}
