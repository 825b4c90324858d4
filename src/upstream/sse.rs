//! Streaming HTTP transport for the upstream connection.
//!
//! `--type sse` is served by rmcp's streamable HTTP client, which consumes
//! server-sent-event response streams. No subprocess, no stdout filtering:
//! build the transport from the URL and run the handshake.

use std::time::Duration;

use rmcp::transport::StreamableHttpClientTransport;
use tokio_util::sync::CancellationToken;

use crate::config::{TransportKind, UpstreamConfig};
use crate::upstream::McpUpstream;

/// Connect to a streaming MCP endpoint and perform the handshake.
pub async fn connect_sse(
    config: &UpstreamConfig,
    cancel: CancellationToken,
) -> crate::Result<McpUpstream> {
    let url = config.url_or_default();
    tracing::info!(url = %url, "connecting to streaming MCP server");

    let transport = StreamableHttpClientTransport::from_uri(url);
    let upstream = McpUpstream::connect_with(
        transport,
        TransportKind::Sse,
        None,
        Duration::from_secs(config.handshake_timeout_secs),
        cancel,
    )
    .await?;

    tracing::info!(url = %url, "connected to streaming MCP server");
    Ok(upstream)
}
