//! One request/response cycle: acknowledge, authorize, forward, format.

use crate::allowlist::Allowlist;
use crate::client::QueryTool;
use async_trait::async_trait;
use std::sync::Arc;

pub const NOT_AUTHORIZED_MESSAGE: &str =
    ":no_entry: You are not authorized to use this search bot.";
pub const TRUNCATION_MARKER: &str = "\n... (truncated)";
/// Stays under Slack's ~3000 character limit for a single message section.
pub const DEFAULT_MAX_RESULT_CHARS: usize = 2800;

/// A single command as delivered by the inbound transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub caller_id: Option<String>,
    pub text: String,
}

impl CommandRequest {
    #[must_use]
    pub fn new(caller_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            caller_id: Some(caller_id.into()),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplySettings {
    /// Slash command name shown in the usage hint (e.g. `/jc`).
    pub command: String,
    pub max_result_chars: usize,
}

impl Default for ReplySettings {
    fn default() -> Self {
        Self {
            command: "/jc".to_string(),
            max_result_chars: DEFAULT_MAX_RESULT_CHARS,
        }
    }
}

/// The two sends of a command cycle: a fast acknowledgment, then the reply.
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    async fn ack(&self) -> anyhow::Result<()>;
    async fn respond(&self, text: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct CommandHandler {
    allowlist: Arc<Allowlist>,
    tool: Arc<dyn QueryTool>,
    settings: ReplySettings,
}

impl CommandHandler {
    #[must_use]
    pub fn new(allowlist: Arc<Allowlist>, tool: Arc<dyn QueryTool>, settings: ReplySettings) -> Self {
        Self {
            allowlist,
            tool,
            settings,
        }
    }

    #[must_use]
    pub fn usage_message(&self) -> String {
        format!(
            "Please provide a question, e.g. `{} count users by group`.",
            self.settings.command
        )
    }

    /// Full cycle: ack first, then the reply. Channel failures are logged, never returned.
    pub async fn run(&self, request: &CommandRequest, channel: &dyn ReplyChannel) {
        if let Err(e) = channel.ack().await {
            tracing::warn!(error = %e, "failed to acknowledge command");
        }
        let reply = self.handle(request).await;
        if let Err(e) = channel.respond(&reply).await {
            tracing::warn!(error = %e, "failed to deliver command reply");
        }
    }

    /// Produce the reply for one command. Never fails: every error becomes reply text.
    pub async fn handle(&self, request: &CommandRequest) -> String {
        let caller = request.caller_id.as_deref().unwrap_or_default();
        if !self.allowlist.is_authorized(caller) {
            tracing::info!(
                caller_id = %caller,
                authorized = false,
                outcome = "denied",
                "command handled"
            );
            return NOT_AUTHORIZED_MESSAGE.to_string();
        }

        let text = request.text.trim();
        if text.is_empty() {
            tracing::info!(
                caller_id = %caller,
                authorized = true,
                outcome = "usage",
                "command handled"
            );
            return self.usage_message();
        }

        let tool_name = self.tool.tool_name();
        match self.tool.query(text).await {
            Ok(output) => {
                tracing::info!(
                    caller_id = %caller,
                    authorized = true,
                    outcome = "relayed",
                    tool = %tool_name,
                    "command handled"
                );
                let body = truncate_chars(&output.render(), self.settings.max_result_chars);
                format!("Query: {text}\n*{tool_name} result:*\n```json\n{body}\n```")
            }
            Err(e) => {
                tracing::warn!(
                    caller_id = %caller,
                    authorized = true,
                    outcome = "tool_error",
                    tool = %tool_name,
                    error = %e,
                    "tool call failed"
                );
                format!(":warning: Error while calling MCP tool `{tool_name}`: `{e}`")
            }
        }
    }
}

/// Cut `text` to at most `max` characters, appending [`TRUNCATION_MARKER`] when cut.
///
/// Counts `char`s, not bytes, and ignores structure: the cut may land mid-token.
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.to_string(),
    }
}
