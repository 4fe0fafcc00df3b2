//! Stand-in for Slack's reply endpoints (`response_url` and the Web API).

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Uri, header},
    routing::post,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RecordedReply {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

pub struct ReplySink {
    /// Base URL (`http://127.0.0.1:<port>`); any path is accepted.
    pub base_url: String,
    replies: Arc<Mutex<Vec<RecordedReply>>>,
    _shutdown: tokio::sync::oneshot::Sender<()>,
}

impl ReplySink {
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> anyhow::Result<Self> {
        let replies = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/{*path}", post(record))
            .with_state(replies.clone());
        let (base_url, shutdown) = crate::serve_ephemeral(app).await?;
        Ok(Self {
            base_url,
            replies,
            _shutdown: shutdown,
        })
    }

    #[must_use]
    pub fn replies(&self) -> Vec<RecordedReply> {
        self.replies.lock().clone()
    }

    /// Wait until at least `count` replies arrived.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout elapses first.
    pub async fn wait_for(&self, count: usize, timeout_dur: Duration) -> anyhow::Result<Vec<RecordedReply>> {
        let start = Instant::now();
        loop {
            let replies = self.replies();
            if replies.len() >= count {
                return Ok(replies);
            }
            if start.elapsed() > timeout_dur {
                anyhow::bail!("timed out waiting for {count} replies (got {})", replies.len());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

async fn record(
    State(replies): State<Arc<Mutex<Vec<RecordedReply>>>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let body = serde_json::from_slice(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
    replies.lock().push(RecordedReply {
        path: uri.path().to_string(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string),
        body,
    });
    Json(json!({ "ok": true }))
}
