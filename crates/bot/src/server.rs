//! HTTP entry point: `POST /slack/events` and `GET /health`.

use crate::config::Config;
use crate::responder::{SlackResponder, SlashReply};
use crate::slack::{SlackVerifier, SlashCommand};
use anyhow::Context as _;
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse as _, Response},
    routing::{get, post},
};
use slackmcp_relay::{CommandHandler, CommandRequest, McpToolClient, ReplySettings};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<SlackVerifier>,
    pub handler: CommandHandler,
    pub responder: Arc<SlackResponder>,
    pub slash_command: Arc<str>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn slack_events(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let cmd = SlashCommand::from_form(&body);
    if cmd.ssl_check {
        return StatusCode::OK.into_response();
    }

    if let Err(e) = state.verifier.verify(&headers, &body) {
        tracing::warn!(error = %e, "rejected slack request");
        return (StatusCode::UNAUTHORIZED, "invalid request signature").into_response();
    }

    if cmd.command.as_deref() != Some(state.slash_command.as_ref()) {
        tracing::debug!(command = ?cmd.command, "ignoring unknown slash command");
        return (StatusCode::NOT_FOUND, "unknown command").into_response();
    }

    let request = CommandRequest {
        caller_id: cmd.user_id.clone(),
        text: cmd.text.clone().unwrap_or_default(),
    };

    // The command cycle runs to completion on its own task; its first step (ack) releases
    // this HTTP response, its last step posts the reply via `response_url`.
    let (ack_tx, ack_rx) = tokio::sync::oneshot::channel();
    let channel = SlashReply::new(ack_tx, state.responder.clone(), cmd);
    let handler = state.handler.clone();
    tokio::spawn(async move {
        handler.run(&request, &channel).await;
    });

    if ack_rx.await.is_err() {
        tracing::warn!("command task ended without acknowledging");
    }
    StatusCode::OK.into_response()
}

/// Build the application from validated configuration.
///
/// # Errors
///
/// Returns an error if the MCP client or the Slack HTTP client cannot be built.
pub fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let allowlist = config.allowlist();
    if allowlist.is_empty() {
        tracing::warn!(
            slash_command = %config.slash_command,
            "ADMIN_USER_IDS is empty; nobody is authorized to use the command"
        );
    }

    let tool = McpToolClient::new(config.mcp_client_config()).context("configure MCP client")?;
    let handler = CommandHandler::new(
        Arc::new(allowlist),
        Arc::new(tool),
        ReplySettings {
            command: config.slash_command.clone(),
            ..ReplySettings::default()
        },
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("build slack http client")?;
    let responder = SlackResponder::new(
        http,
        &config.slack_api_base,
        config.slack_bot_token.trim().to_string(),
        config.response_allowed_hosts(),
    );

    Ok(AppState {
        verifier: Arc::new(SlackVerifier::new(config.slack_signing_secret.trim())),
        handler,
        responder: Arc::new(responder),
        slash_command: Arc::from(config.slash_command.as_str()),
    })
}

/// Validate `config`, bind, and serve until ctrl-c / SIGTERM.
///
/// # Errors
///
/// Returns an error on invalid configuration or if the listener cannot be bound.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    config.validate()?;
    let state = build_state(&config)?;
    let admins = config.allowlist().len();

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(
        %addr,
        mcp_url = %config.mcp_url,
        mcp_tool = %config.mcp_tool,
        slash_command = %config.slash_command,
        admins,
        "slackmcp-bot listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutting down");
}
