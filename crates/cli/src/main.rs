use anyhow::Context as _;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize as _;
use serde_json::{Map, Value};
use slackmcp_relay::{McpClientConfig, McpToolClient, QueryTool as _};

#[derive(Parser)]
#[command(name = "slackmcp", version)]
#[command(about = "Query the MCP server behind slackmcp-bot")]
struct Cli {
    #[arg(long, env = "MCP_URL")]
    mcp_url: Option<String>,

    #[arg(long, env = "MCP_API_KEY", hide_env_values = true)]
    mcp_api_key: Option<String>,

    /// Tool used by `search`.
    #[arg(long, env = "MCP_TOOL")]
    mcp_tool: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the tools the MCP server exposes.
    Tools,
    /// Ask the search tool a natural-language question.
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Call any tool with explicit arguments.
    Call {
        tool: String,
        /// `key=value`; values that parse as JSON (numbers, booleans, ...) are sent as JSON.
        #[arg(long = "arg", value_parser = parse_key_value)]
        args: Vec<(String, Value)>,
        /// Arguments as a JSON object; `--arg` entries override its keys.
        #[arg(long)]
        json: Option<String>,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn call_arguments(json: Option<&str>, args: Vec<(String, Value)>) -> anyhow::Result<Map<String, Value>> {
    let mut out = match json {
        Some(raw) => match serde_json::from_str(raw).context("parse --json")? {
            Value::Object(m) => m,
            _ => anyhow::bail!("--json must be a JSON object"),
        },
        None => Map::new(),
    };
    out.extend(args);
    Ok(out)
}

fn client_config(cli: &Cli) -> anyhow::Result<McpClientConfig> {
    let api_key = cli
        .mcp_api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .context("MCP_API_KEY is not set (use --mcp-api-key or the env var)")?;
    let url = cli
        .mcp_url
        .clone()
        .unwrap_or_else(|| McpClientConfig::DEFAULT_URL.to_string());
    let tool = cli
        .mcp_tool
        .clone()
        .unwrap_or_else(|| McpClientConfig::DEFAULT_TOOL.to_string());
    Ok(McpClientConfig::new(url, api_key).with_tool_name(tool))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = McpToolClient::new(client_config(&cli)?)?;

    match &cli.command {
        Command::Tools => {
            let tools = client.list_tools().await?;
            println!("Available tools:");
            for tool in tools {
                match tool.description.as_deref() {
                    Some(desc) => println!("- {}: {desc}", tool.name.bold()),
                    None => println!("- {}", tool.name.bold()),
                }
            }
        }
        Command::Search { query } => {
            let out = client.query(&query.join(" ")).await?;
            println!("{}", out.render());
        }
        Command::Call { tool, args, json } => {
            let arguments = call_arguments(json.as_deref(), args.clone())?;
            let out = client.call_tool(tool, arguments).await?;
            println!("{}", out.render());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_values_prefer_json() -> Result<(), String> {
        assert_eq!(parse_key_value("limit=10")?, ("limit".to_string(), json!(10)));
        assert_eq!(parse_key_value("disabled=true")?, ("disabled".to_string(), json!(true)));
        assert_eq!(parse_key_value("search=ada")?, ("search".to_string(), json!("ada")));
        assert_eq!(parse_key_value("q=a=b")?, ("q".to_string(), json!("a=b")));
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
        Ok(())
    }

    #[test]
    fn arg_flags_override_json_object() -> anyhow::Result<()> {
        let args = call_arguments(
            Some(r#"{"limit": 5, "skip": 0}"#),
            vec![("limit".to_string(), json!(10))],
        )?;
        assert_eq!(Value::Object(args), json!({ "limit": 10, "skip": 0 }));
        assert!(call_arguments(Some("[1]"), Vec::new()).is_err());
        Ok(())
    }

    #[test]
    fn connection_defaults_and_required_key() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "slackmcp",
            "--mcp-url",
            "http://flag/mcp",
            "--mcp-api-key",
            "k",
            "--mcp-tool",
            "search",
            "tools",
        ])?;
        let cfg = client_config(&cli)?;
        assert_eq!(cfg.url, "http://flag/mcp");
        assert_eq!(cfg.api_key, "k");
        assert_eq!(cfg.tool_name, "search");

        let cli = Cli::try_parse_from(["slackmcp", "--mcp-api-key", " ", "tools"])?;
        assert!(client_config(&cli).is_err());
        Ok(())
    }
}
