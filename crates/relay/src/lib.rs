//! Allow-listed relay from chat slash commands to a single MCP tool.
//!
//! This crate is intended to be used by:
//! - `slackmcp-bot` (the Slack-facing HTTP service)
//! - `slackmcp-cli` (operator CLI against the same MCP server)
//!
//! It intentionally contains **no** Slack transport logic; the bot owns signature
//! verification and reply delivery and plugs in through [`handler::ReplyChannel`].

pub mod allowlist;
pub mod client;
pub mod error;
pub mod handler;
mod streamable_http;

pub use allowlist::Allowlist;
pub use client::{McpClientConfig, McpToolClient, QueryTool, ToolOutput};
pub use error::{RelayError, Result};
pub use handler::{CommandHandler, CommandRequest, ReplyChannel, ReplySettings};
