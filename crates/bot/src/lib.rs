//! Slack-facing side of the relay: request verification, slash command parsing, reply delivery
//! and the HTTP server that ties them to [`slackmcp_relay::CommandHandler`].

pub mod config;
pub mod error;
pub mod responder;
pub mod server;
pub mod slack;
