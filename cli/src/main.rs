//! mcp-rest: REST API wrapper around an MCP server.
//!
//! Connects to one upstream MCP server (streaming HTTP or STDIO subprocess),
//! verifies it by listing tools, then serves:
//! - `GET  /status`        connection status
//! - `GET  /tools`         tool listing
//! - `POST /tools/:toolId` tool invocation

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mcp_rest::{bootstrap, router, ConfigOverrides, GatewayConfig, McpUpstream, ENDPOINTS};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// mcp-rest: REST API wrapper around an MCP server.
#[derive(Parser)]
#[command(
    name = "mcp-rest",
    version,
    about = "mcp-rest: REST API wrapper around an MCP server"
)]
struct Cli {
    /// Connection type: "sse" or "stdio" [default: sse]
    #[arg(short = 't', long = "type")]
    transport: Option<String>,
    /// SSE server URL (for sse type) [default: http://localhost:8000/sse]
    #[arg(short, long)]
    url: Option<String>,
    /// HTTP server port [default: 3000]
    #[arg(short, long)]
    port: Option<u16>,
    /// Bind address [default: 127.0.0.1]
    #[arg(long)]
    host: Option<String>,
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
    /// Executable to spawn (for stdio type)
    #[arg(long)]
    command: Option<String>,
    /// JSON array of arguments for the stdio command, e.g. '["--flag", "value"]'
    #[arg(long)]
    args: Option<String>,
    /// JSON object of environment variables for the stdio command, e.g. '{"TOKEN": "${TOKEN}"}'
    #[arg(long)]
    env: Option<String>,
    /// Working directory for the stdio command
    #[arg(long)]
    cwd: Option<PathBuf>,
    /// Seconds to wait for the MCP handshake [default: 30]
    #[arg(long = "handshake-timeout")]
    handshake_timeout: Option<u64>,
    /// Path to an mcp-rest.toml config file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            transport: self.transport.clone(),
            url: self.url.clone(),
            command: self.command.clone(),
            args_json: self.args.clone(),
            env_json: self.env.clone(),
            cwd: self.cwd.clone(),
            handshake_timeout_secs: self.handshake_timeout,
            host: self.host.clone(),
            port: self.port,
            debug: self.debug,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = resolve_config(&cli).await?;
    init_tracing(config.debug);

    tracing::debug!(?config, "starting mcp-rest");

    let cancel = CancellationToken::new();

    // Ctrl-C handler cancels the root token for graceful shutdown
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutting down mcp-rest...");
        cancel_for_signal.cancel();
    });

    let upstream = bootstrap(&config, cancel.child_token())
        .await
        .with_context(|| format!("Error connecting to {}", config.upstream.transport))?;

    run_serve(config, upstream, cancel).await
}

/// Load the optional config file, layer CLI flags on top, and validate.
async fn resolve_config(cli: &Cli) -> Result<GatewayConfig> {
    let base = match &cli.config {
        Some(path) => GatewayConfig::load(path).await?,
        None => GatewayConfig::default(),
    };
    let config = base
        .with_overrides(cli.overrides())
        .context("Error parsing JSON arguments or environment")?;
    config.validate()?;
    Ok(config)
}

/// `RUST_LOG` controls verbosity; `--debug` forces debug level.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Bind the HTTP port and serve the gateway until cancelled.
async fn run_serve(
    config: GatewayConfig,
    upstream: McpUpstream,
    cancel: CancellationToken,
) -> Result<()> {
    let upstream = Arc::new(upstream);

    // The session is never re-established; requests keep failing with 500 after this.
    let watched = upstream.clone();
    let cancel_for_watch = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = watched.closed() => {
                tracing::error!("upstream MCP session closed; tool requests will fail");
            }
            _ = cancel_for_watch.cancelled() => {}
        }
    });

    let app = router(upstream.clone());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!(host = %config.host, port = %config.port, "mcp-rest server listening");
    print_endpoints();

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .context("mcp-rest HTTP server error")?;

    upstream.shutdown();
    tracing::info!("mcp-rest HTTP server stopped");
    Ok(())
}

fn print_endpoints() {
    tracing::info!("Available endpoints:");
    for (method, path, description) in ENDPOINTS {
        tracing::info!("  {:<4} {:<14} - {}", method, path, description);
    }
}
