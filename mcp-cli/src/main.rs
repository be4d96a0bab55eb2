//! `mcp-probe`: send a single JSON-RPC request or notification to an MCP
//! server and print what comes back.
//!
//! Logs go to stderr; the response envelope is printed to stdout as JSON.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use mcp_core::transport::{AuthConfig, HttpConfig, StdioConfig, Transport, TransportConfig};
use mcp_core::TransportFactory;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "mcp-probe")]
#[command(about = "Send one JSON-RPC message to an MCP server over stdio or HTTP")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose logging (debug level for the transport layer)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a request and print the response envelope
    Request {
        /// JSON-RPC method name
        method: String,

        #[command(flatten)]
        message: MessageArgs,

        #[command(flatten)]
        target: TargetArgs,
    },
    /// Send a notification (no response is expected)
    Notify {
        /// JSON-RPC method name
        method: String,

        #[command(flatten)]
        message: MessageArgs,

        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args)]
pub struct MessageArgs {
    /// Parameters as a JSON document
    #[arg(short, long, value_parser = parse_json)]
    pub params: Option<Value>,
}

/// Where the server is and how to reach it.
#[derive(Args)]
pub struct TargetArgs {
    /// Load the transport from a JSON, YAML or TOML file
    #[arg(long, conflicts_with_all = ["command", "url"])]
    pub config: Option<PathBuf>,

    /// Server executable (stdio transport)
    #[arg(short, long, conflicts_with = "url")]
    pub command: Option<String>,

    /// Argument passed to the server executable (repeatable)
    #[arg(short = 'a', long = "arg", requires = "command", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Working directory for the server process
    #[arg(long, requires = "command")]
    pub cwd: Option<String>,

    /// Environment variable for the server process, as KEY=VALUE (repeatable)
    #[arg(short, long = "env", requires = "command", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Server base URL (HTTP transport)
    #[arg(short, long)]
    pub url: Option<String>,

    /// Extra HTTP header, as NAME=VALUE (repeatable)
    #[arg(short = 'H', long = "header", requires = "url", value_parser = parse_key_value)]
    pub headers: Vec<(String, String)>,

    /// Bearer token for the HTTP transport
    #[arg(long, requires = "url")]
    pub bearer: Option<String>,

    /// Request timeout, e.g. "500ms" or "1m"
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,
}

impl TargetArgs {
    /// Build the transport configuration these flags describe.
    fn transport_config(&self) -> Result<TransportConfig> {
        let mut config = if let Some(ref path) = self.config {
            TransportConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?
        } else if let Some(ref command) = self.command {
            let mut stdio = StdioConfig::new(command).args(self.args.iter().cloned());
            if let Some(ref cwd) = self.cwd {
                stdio = stdio.working_dir(cwd);
            }
            for (key, value) in &self.env {
                stdio = stdio.env(key, value);
            }
            TransportConfig::Stdio(stdio)
        } else if let Some(ref raw_url) = self.url {
            let base_url: url::Url = raw_url
                .parse()
                .with_context(|| format!("invalid URL: {}", raw_url))?;
            let mut http = HttpConfig::new(base_url);
            for (name, value) in &self.headers {
                http = http.header(name, value);
            }
            if let Some(ref token) = self.bearer {
                http = http.auth(AuthConfig::bearer(token));
            }
            TransportConfig::Http(http)
        } else {
            bail!("one of --config, --command or --url is required");
        };

        if let Some(timeout) = self.timeout {
            match config {
                TransportConfig::Stdio(ref mut stdio) => stdio.timeout = timeout,
                TransportConfig::Http(ref mut http) => http.timeout = timeout,
            }
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {}", e))
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got `{}`", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Request {
            method,
            message,
            target,
        } => {
            let response = run(&target, |transport| async move {
                transport.send_request(&method, message.params).await
            })
            .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Commands::Notify {
            method,
            message,
            target,
        } => {
            run(&target, |transport| async move {
                transport.send_notification(&method, message.params).await
            })
            .await
        }
    }
}

/// Connect, run one exchange, and always disconnect afterwards.
async fn run<T, F, Fut>(target: &TargetArgs, exchange: F) -> Result<T>
where
    F: FnOnce(std::sync::Arc<dyn Transport>) -> Fut,
    Fut: std::future::Future<Output = mcp_core::McpResult<T>>,
{
    let transport = TransportFactory::create_shared(target.transport_config()?)?;
    transport
        .connect()
        .await
        .with_context(|| format!("failed to connect {} transport", transport.transport_type()))?;

    let outcome = tokio::select! {
        outcome = exchange(transport.clone()) => outcome.map_err(anyhow::Error::from),
        _ = tokio::signal::ctrl_c() => Err(anyhow!("interrupted")),
    };

    if let Err(e) = transport.disconnect().await {
        tracing::warn!("Failed to disconnect cleanly: {}", e);
    }
    tracing::debug!(info = ?transport.get_info(), "Transport closed");

    outcome
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "mcp_core=debug,mcp_probe=debug"
    } else {
        "mcp_core=info,mcp_probe=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
