use anyhow::Context as _;
use slackmcp_bot::slack::{SIGNATURE_HEADER, SlackVerifier, TIMESTAMP_HEADER};
use std::process::{Command, Stdio};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub use slackmcp_test_support::{KillOnDrop, pick_unused_port, wait_http_ok};

pub const SIGNING_SECRET: &str = "test-signing-secret";
pub const BOT_TOKEN: &str = "xoxb-test";
pub const MCP_API_KEY: &str = "jca_test";

const CONFIG_ENV: &[&str] = &[
    "SLACK_BOT_TOKEN",
    "SLACK_SIGNING_SECRET",
    "MCP_URL",
    "MCP_API_KEY",
    "MCP_TOOL",
    "MCP_TIMEOUT_SECS",
    "ADMIN_USER_IDS",
    "SLASH_COMMAND",
    "HOST",
    "PORT",
    "SLACK_API_BASE",
    "SLACK_RESPONSE_ALLOWED_HOSTS",
    "LOG_LEVEL",
    "LOG_FORMAT",
];

/// `slackmcp-bot` command with a clean configuration environment.
pub fn bot_command() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_slackmcp-bot"));
    for name in CONFIG_ENV {
        cmd.env_remove(name);
    }
    cmd.env_remove("RUST_LOG");
    cmd.stdout(Stdio::null()).stderr(Stdio::null());
    cmd
}

pub struct RunningBot {
    pub base_url: String,
    _child: KillOnDrop,
}

pub async fn spawn_bot(mcp_url: &str, reply_base: &str, admins: &str) -> anyhow::Result<RunningBot> {
    spawn_bot_with_stderr(mcp_url, reply_base, admins, Stdio::null()).await
}

/// Like [`spawn_bot`], with the bot's log output (stderr) sent to `stderr`.
pub async fn spawn_bot_with_stderr(
    mcp_url: &str,
    reply_base: &str,
    admins: &str,
    stderr: impl Into<Stdio>,
) -> anyhow::Result<RunningBot> {
    let port = pick_unused_port()?;
    let child = bot_command()
        .stderr(stderr)
        .args(["--slack-bot-token", BOT_TOKEN])
        .args(["--slack-signing-secret", SIGNING_SECRET])
        .args(["--mcp-url", mcp_url])
        .args(["--mcp-api-key", MCP_API_KEY])
        .args(["--admin-user-ids", admins])
        .args(["--host", "127.0.0.1"])
        .args(["--port", &port.to_string()])
        .args(["--slack-api-base", &format!("{reply_base}/api")])
        .args(["--response-allowed-hosts", "127.0.0.1"])
        .args(["--log-level", "warn"])
        .spawn()
        .context("spawn slackmcp-bot")?;
    let child = KillOnDrop(child);

    let base_url = format!("http://127.0.0.1:{port}");
    wait_http_ok(&format!("{base_url}/health"), Duration::from_secs(20)).await?;
    Ok(RunningBot {
        base_url,
        _child: child,
    })
}

pub fn form(fields: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish()
}

/// POST a slash command body signed with [`SIGNING_SECRET`].
pub async fn post_signed(base_url: &str, body: String) -> anyhow::Result<reqwest::Response> {
    let ts = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let signature = SlackVerifier::new(SIGNING_SECRET).sign(ts, body.as_bytes())?;
    post_with_signature(base_url, body, &ts.to_string(), &signature).await
}

pub async fn post_with_signature(
    base_url: &str,
    body: String,
    timestamp: &str,
    signature: &str,
) -> anyhow::Result<reqwest::Response> {
    Ok(reqwest::Client::new()
        .post(format!("{base_url}/slack/events"))
        .header("content-type", "application/x-www-form-urlencoded")
        .header(TIMESTAMP_HEADER, timestamp)
        .header(SIGNATURE_HEADER, signature)
        .body(body)
        .send()
        .await?)
}
