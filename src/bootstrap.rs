//! Startup sequence: validate config, open the single upstream connection,
//! and prove it works with one tool listing before the HTTP port is bound.
//!
//! Every step is fallible and returns an error instead of exiting, so the
//! binary alone decides how to terminate.

use tokio_util::sync::CancellationToken;

use crate::config::{GatewayConfig, TransportKind, UpstreamConfig};
use crate::upstream::sse::connect_sse;
use crate::upstream::stdio::connect_stdio;
use crate::upstream::{McpUpstream, ToolProvider};

/// Open the upstream connection over the configured transport.
pub async fn connect(
    config: &UpstreamConfig,
    cancel: CancellationToken,
) -> crate::Result<McpUpstream> {
    tracing::debug!(transport = %config.transport, "connecting to upstream");
    match config.transport {
        TransportKind::Sse => connect_sse(config, cancel).await,
        TransportKind::Stdio => connect_stdio(config, cancel).await,
    }
}

/// Smoke-test a provider by listing its tools. Returns the tool count.
pub async fn verify(provider: &dyn ToolProvider) -> crate::Result<usize> {
    tracing::debug!("testing connection by listing available tools");
    let tools = provider.list_tools().await?;
    tracing::debug!(tool_count = tools.len(), "retrieved tools from upstream");
    Ok(tools.len())
}

/// Validate, connect and verify. On verification failure the session is
/// shut down before the error is returned.
pub async fn bootstrap(
    config: &GatewayConfig,
    cancel: CancellationToken,
) -> crate::Result<McpUpstream> {
    config.validate()?;

    let upstream = connect(&config.upstream, cancel).await?;

    match verify(&upstream).await {
        Ok(count) => {
            tracing::info!(
                transport = %upstream.transport(),
                tool_count = count,
                "upstream connection verified"
            );
            Ok(upstream)
        }
        Err(e) => {
            upstream.shutdown();
            Err(e)
        }
    }
}
