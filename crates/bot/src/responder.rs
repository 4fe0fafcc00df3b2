//! Delivery of the final command reply back to Slack.

use crate::error::{Result, SlackError};
use crate::slack::SlashCommand;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use slackmcp_relay::ReplyChannel;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::oneshot;

pub struct SlackResponder {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    /// Hosts a `response_url` may point at (case-insensitive).
    allowed_hosts: HashSet<String>,
}

impl SlackResponder {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        api_base: &str,
        bot_token: String,
        allowed_hosts: HashSet<String>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token,
            allowed_hosts: allowed_hosts
                .into_iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Post `text` as an ephemeral reply to whoever issued `cmd`.
    ///
    /// Uses the command's `response_url` when present, otherwise `chat.postEphemeral`.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination is not allowed or Slack rejects the reply.
    pub async fn post_reply(&self, cmd: &SlashCommand, text: &str) -> Result<()> {
        if let Some(response_url) = cmd.response_url.as_deref() {
            return self.post_to_response_url(response_url, text).await;
        }
        match (cmd.channel_id.as_deref(), cmd.user_id.as_deref()) {
            (Some(channel), Some(user)) => self.post_ephemeral(channel, user, text).await,
            _ => Err(SlackError::Delivery(
                "command has neither response_url nor channel/user".to_string(),
            )),
        }
    }

    fn check_reply_host(&self, url: &str) -> Result<reqwest::Url> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| SlackError::Delivery(format!("invalid response_url: {e}")))?;
        let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
        if !matches!(parsed.scheme(), "http" | "https") || !self.allowed_hosts.contains(&host) {
            return Err(SlackError::ReplyHostRejected(host));
        }
        Ok(parsed)
    }

    async fn post_to_response_url(&self, url: &str, text: &str) -> Result<()> {
        let url = self.check_reply_host(url)?;
        let resp = self
            .http
            .post(url)
            .json(&json!({ "response_type": "ephemeral", "text": text }))
            .send()
            .await
            .map_err(|e| SlackError::Delivery(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SlackError::Delivery(format!(
                "response_url returned http {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn post_ephemeral(&self, channel: &str, user: &str, text: &str) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}/chat.postEphemeral", self.api_base))
            .bearer_auth(&self.bot_token)
            .json(&json!({ "channel": channel, "user": user, "text": text }))
            .send()
            .await
            .map_err(|e| SlackError::Delivery(e.to_string()))?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| SlackError::Delivery(e.to_string()))?;
        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let reason = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(SlackError::Delivery(format!("chat.postEphemeral: {reason}")));
        }
        Ok(())
    }
}

/// Reply channel for one slash command.
///
/// `ack` releases the pending HTTP response (Slack's 3 second acknowledgment); `respond`
/// posts the final reply through [`SlackResponder`].
pub struct SlashReply {
    ack: Mutex<Option<oneshot::Sender<()>>>,
    responder: Arc<SlackResponder>,
    command: SlashCommand,
}

impl SlashReply {
    #[must_use]
    pub fn new(ack: oneshot::Sender<()>, responder: Arc<SlackResponder>, command: SlashCommand) -> Self {
        Self {
            ack: Mutex::new(Some(ack)),
            responder,
            command,
        }
    }
}

#[async_trait]
impl ReplyChannel for SlashReply {
    async fn ack(&self) -> anyhow::Result<()> {
        let sender = self.ack.lock().take();
        if let Some(sender) = sender {
            sender
                .send(())
                .map_err(|()| anyhow::anyhow!("request closed before acknowledgment"))?;
        }
        Ok(())
    }

    async fn respond(&self, text: &str) -> anyhow::Result<()> {
        self.responder.post_reply(&self.command, text).await?;
        Ok(())
    }
}
