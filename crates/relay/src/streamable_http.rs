//! Raw MCP streamable-HTTP requests (one POST or DELETE per call).
//!
//! The session handshake and result handling live in [`crate::client`].

use futures::{StreamExt as _, stream::BoxStream};
use reqwest::header::{HeaderMap, HeaderValue};
use rmcp::model::{ClientJsonRpcMessage, ServerJsonRpcMessage, ServerResult};
use rmcp::transport::common::http_header::{EVENT_STREAM_MIME_TYPE, HEADER_SESSION_ID, JSON_MIME_TYPE};
use rmcp::transport::streamable_http_client::{StreamableHttpError, StreamableHttpPostResponse};

use crate::error::{RelayError, Result};

pub(crate) type HttpError = StreamableHttpError<reqwest::Error>;

fn header_to_string(h: &HeaderValue) -> Option<String> {
    h.to_str().ok().map(std::string::ToString::to_string)
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(header_to_string)
        .map(|s| s.split(';').next().unwrap_or(&s).trim().to_string())
}

pub(crate) async fn post_message(
    http: &reqwest::Client,
    uri: &str,
    message: ClientJsonRpcMessage,
    session_id: Option<&str>,
    headers: &HeaderMap,
) -> std::result::Result<StreamableHttpPostResponse, HttpError> {
    let body = serde_json::to_vec(&message)?;

    let mut req = http
        .post(uri)
        .header(reqwest::header::CONTENT_TYPE, JSON_MIME_TYPE)
        .header(
            reqwest::header::ACCEPT,
            format!("{JSON_MIME_TYPE}, {EVENT_STREAM_MIME_TYPE}"),
        )
        .headers(headers.clone())
        .body(body);

    if let Some(sid) = session_id {
        req = req.header(HEADER_SESSION_ID, sid);
    }

    let resp = req.send().await.map_err(StreamableHttpError::Client)?;
    let status = resp.status();

    if status == reqwest::StatusCode::ACCEPTED {
        return Ok(StreamableHttpPostResponse::Accepted);
    }
    if status.is_client_error() || status.is_server_error() {
        return Err(StreamableHttpError::UnexpectedServerResponse(
            format!("mcp server returned http {status}").into(),
        ));
    }

    let session_id = resp
        .headers()
        .get(HEADER_SESSION_ID)
        .and_then(header_to_string);

    match content_type(resp.headers()).as_deref() {
        Some(ct) if ct.eq_ignore_ascii_case(EVENT_STREAM_MIME_TYPE) => {
            let stream: BoxStream<'static, std::result::Result<sse_stream::Sse, sse_stream::Error>> =
                sse_stream::SseStream::from_byte_stream(resp.bytes_stream()).boxed();
            Ok(StreamableHttpPostResponse::Sse(stream, session_id))
        }
        Some(ct) if ct.eq_ignore_ascii_case(JSON_MIME_TYPE) => {
            let msg: ServerJsonRpcMessage =
                resp.json().await.map_err(StreamableHttpError::Client)?;
            Ok(StreamableHttpPostResponse::Json(msg, session_id))
        }
        other => Err(StreamableHttpError::UnexpectedContentType(
            other.map(std::string::ToString::to_string),
        )),
    }
}

pub(crate) async fn delete_session(
    http: &reqwest::Client,
    uri: &str,
    session_id: &str,
    headers: &HeaderMap,
) -> std::result::Result<(), HttpError> {
    http.delete(uri)
        .header(HEADER_SESSION_ID, session_id)
        .headers(headers.clone())
        .send()
        .await
        .map_err(StreamableHttpError::Client)?;
    Ok(())
}

/// Wait for the first JSON-RPC response carried by a POST reply.
///
/// Server-initiated requests and notifications that precede the response on an SSE stream
/// are skipped.
pub(crate) async fn read_first_response(resp: StreamableHttpPostResponse) -> Result<ServerResult> {
    match resp {
        StreamableHttpPostResponse::Json(msg, ..) => response_result(msg)?
            .ok_or_else(|| RelayError::Protocol("expected a JSON-RPC response".to_string())),
        StreamableHttpPostResponse::Sse(mut stream, ..) => {
            while let Some(evt) = stream.next().await {
                let evt = evt.map_err(|e| RelayError::Transport(e.to_string()))?;
                let payload = evt.data.unwrap_or_default();
                if payload.trim().is_empty() {
                    continue;
                }
                let msg: ServerJsonRpcMessage = serde_json::from_str(&payload)?;
                if let Some(result) = response_result(msg)? {
                    return Ok(result);
                }
            }
            Err(RelayError::Transport(
                "unexpected end of sse stream".to_string(),
            ))
        }
        StreamableHttpPostResponse::Accepted => Err(RelayError::Protocol(
            "server accepted the request without a response".to_string(),
        )),
    }
}

fn response_result(msg: ServerJsonRpcMessage) -> Result<Option<ServerResult>> {
    match msg {
        ServerJsonRpcMessage::Response(r) => Ok(Some(r.result)),
        ServerJsonRpcMessage::Error(e) => Err(RelayError::Tool(e.error.message.to_string())),
        _ => Ok(None),
    }
}
