//! Subprocess upstream: an MCP server spoken to over its stdin/stdout.
//!
//! Only lines that parse as JSON reach rmcp, so a server that prints a banner
//! on stdout still works. Stderr goes to the debug log. The child dies with
//! the session and is not restarted.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, DuplexStream, Lines,
};
use tokio::process::{Child, ChildStderr, Command};
use tokio_util::sync::CancellationToken;

use crate::config::{resolve_env_vars, TransportKind, UpstreamConfig};
use crate::error::GatewayError;
use crate::upstream::McpUpstream;

/// Buffer between the stdout reader task and rmcp.
const STDOUT_BUFFER: usize = 64 * 1024;

/// Start `command` directly (no shell) with every stdio stream piped.
fn spawn_child(config: &UpstreamConfig) -> crate::Result<Child> {
    let program = config.command.as_deref().ok_or_else(|| {
        GatewayError::InvalidConfig("stdio upstream needs a 'command'".to_string())
    })?;

    let mut command = Command::new(program);
    command
        .args(&config.args)
        .envs(resolve_env_vars(&config.env))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &config.cwd {
        command.current_dir(dir);
    }

    command
        .spawn()
        .map_err(|e| GatewayError::Transport(format!("could not start '{}': {}", program, e)))
}

/// Next line from the child, or `None` once the stream ends, fails or `cancel` fires.
async fn next_line<R>(lines: &mut Lines<R>, cancel: &CancellationToken) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        line = lines.next_line() => line.ok().flatten(),
        _ = cancel.cancelled() => None,
    }
}

/// Feed rmcp the JSON lines of `stdout`, newline-framed, and drop the rest.
///
/// The returned stream reaches EOF when the child's stdout does.
fn json_lines_only<R>(stdout: R, cancel: CancellationToken) -> DuplexStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (rmcp_side, mut feed) = tokio::io::duplex(STDOUT_BUFFER);

    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = next_line(&mut lines, &cancel).await {
            if serde_json::from_str::<serde_json::Value>(&line).is_err() {
                tracing::debug!(%line, "dropped non-JSON line from upstream stdout");
                continue;
            }
            let mut framed = line.into_bytes();
            framed.push(b'\n');
            if feed.write_all(&framed).await.is_err() {
                break;
            }
        }
    });

    rmcp_side
}

fn log_stderr(stderr: ChildStderr, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Some(line) = next_line(&mut lines, &cancel).await {
            tracing::debug!(%line, "upstream stderr");
        }
    });
}

/// Spawn the upstream process and perform the MCP handshake over its pipes.
pub async fn connect_stdio(
    config: &UpstreamConfig,
    cancel: CancellationToken,
) -> crate::Result<McpUpstream> {
    if let Some(url) = &config.url {
        tracing::warn!(url = %url, "ignoring url for stdio upstream");
    }
    let mut child = spawn_child(config)?;
    tracing::info!(
        command = config.command.as_deref().unwrap_or_default(),
        args = ?config.args,
        "spawned STDIO MCP server"
    );

    let child_stdin = child
        .stdin
        .take()
        .ok_or_else(|| GatewayError::Transport("failed to open stdin pipe".to_string()))?;
    let child_stdout = child
        .stdout
        .take()
        .ok_or_else(|| GatewayError::Transport("failed to open stdout pipe".to_string()))?;
    let child_stderr = child
        .stderr
        .take()
        .ok_or_else(|| GatewayError::Transport("failed to open stderr pipe".to_string()))?;

    log_stderr(child_stderr, cancel.clone());
    let transport = (json_lines_only(child_stdout, cancel.clone()), child_stdin);

    McpUpstream::connect_with(
        transport,
        TransportKind::Stdio,
        Some(child),
        Duration::from_secs(config.handshake_timeout_secs),
        cancel,
    )
    .await
}
