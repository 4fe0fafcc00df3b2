//! Process configuration: flags with environment fallbacks.

use clap::{Parser, ValueEnum};
use slackmcp_relay::{Allowlist, McpClientConfig};
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Clone)]
#[command(name = "slackmcp-bot", version)]
#[command(about = "Relay an allow-listed Slack slash command to an MCP tool")]
pub struct Config {
    /// Slack bot token (`xoxb-...`), used for Web API replies.
    #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    pub slack_bot_token: String,

    /// Slack signing secret, used to verify inbound requests.
    #[arg(long, env = "SLACK_SIGNING_SECRET", hide_env_values = true)]
    pub slack_signing_secret: String,

    /// MCP streamable HTTP endpoint.
    #[arg(long, env = "MCP_URL", default_value = McpClientConfig::DEFAULT_URL)]
    pub mcp_url: String,

    /// Bearer credential for the MCP server.
    #[arg(long, env = "MCP_API_KEY", hide_env_values = true)]
    pub mcp_api_key: String,

    /// MCP tool that receives the command text as `{"query": ...}`.
    #[arg(long, env = "MCP_TOOL", default_value = McpClientConfig::DEFAULT_TOOL)]
    pub mcp_tool: String,

    /// Per-request HTTP timeout towards the MCP server (0 disables).
    #[arg(long, env = "MCP_TIMEOUT_SECS", default_value_t = 60)]
    pub mcp_timeout_secs: u64,

    /// Comma-separated Slack user ids allowed to use the command.
    #[arg(long, env = "ADMIN_USER_IDS", default_value = "")]
    pub admin_user_ids: String,

    /// Slash command this bot answers to.
    #[arg(long, env = "SLASH_COMMAND", default_value = "/jc")]
    pub slash_command: String,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Slack Web API base URL.
    #[arg(long, env = "SLACK_API_BASE", default_value = "https://slack.com/api")]
    pub slack_api_base: String,

    /// Comma-separated hosts a command's `response_url` may point at.
    #[arg(
        long,
        env = "SLACK_RESPONSE_ALLOWED_HOSTS",
        default_value = "hooks.slack.com"
    )]
    pub response_allowed_hosts: String,

    /// Log level (overridden by `RUST_LOG`).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    /// Reject blank credentials (clap only enforces presence).
    ///
    /// # Errors
    ///
    /// Returns an error naming the first blank credential.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("SLACK_BOT_TOKEN", &self.slack_bot_token),
            ("SLACK_SIGNING_SECRET", &self.slack_signing_secret),
            ("MCP_API_KEY", &self.mcp_api_key),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{name} must be set");
            }
        }
        if self.mcp_tool.trim().is_empty() {
            anyhow::bail!("MCP_TOOL must not be empty");
        }
        Ok(())
    }

    #[must_use]
    pub fn allowlist(&self) -> Allowlist {
        Allowlist::from_csv(&self.admin_user_ids)
    }

    #[must_use]
    pub fn mcp_client_config(&self) -> McpClientConfig {
        let config = McpClientConfig::new(&self.mcp_url, self.mcp_api_key.trim())
            .with_tool_name(self.mcp_tool.trim());
        if self.mcp_timeout_secs > 0 {
            config.with_timeout(Duration::from_secs(self.mcp_timeout_secs))
        } else {
            config
        }
    }

    #[must_use]
    pub fn response_allowed_hosts(&self) -> HashSet<String> {
        self.response_allowed_hosts
            .split(',')
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
