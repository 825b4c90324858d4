//! Upstream MCP connection for mcp-rest.
//!
//! [`ToolProvider`] is the seam the HTTP gateway talks to. [`McpUpstream`]
//! implements it on top of a single rmcp client session; tests substitute
//! their own providers.
//!
//! The session is opened once. A background task owns the `RunningService`
//! and flips the published [`ConnectionState`] to `Disconnected` when the
//! session ends. Nothing reconnects.

pub mod sse;
pub mod stdio;

use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParams, CallToolResult, ClientInfo, Implementation, Tool};
use rmcp::service::{Peer, RunningService};
use rmcp::transport::IntoTransport;
use rmcp::{RoleClient, ServiceExt};
use tokio::process::Child;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::TransportKind;
use crate::error::GatewayError;

/// Whether the upstream session is still alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

/// Something that can enumerate and invoke tools.
///
/// Implementations must tolerate concurrent calls; the gateway adds no
/// locking around them.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Fetch the current tool list from the provider.
    async fn list_tools(&self) -> crate::Result<Vec<Tool>>;

    /// Invoke `name` with an optional argument map.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> crate::Result<CallToolResult>;

    /// Current state of the underlying connection.
    fn connection_state(&self) -> ConnectionState;
}

/// Convert the `arguments` value of an HTTP request into MCP call arguments.
///
/// `null` means no arguments. Objects are forwarded as-is. Anything else
/// cannot be expressed as MCP tool arguments.
pub fn into_arguments(
    tool: &str,
    value: serde_json::Value,
) -> crate::Result<Option<serde_json::Map<String, serde_json::Value>>> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(map) => Ok(Some(map)),
        other => Err(GatewayError::InvalidArguments(
            tool.to_string(),
            format!("expected a JSON object, got {}", json_kind(&other)),
        )),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Client identity sent in the MCP initialize request.
fn client_info() -> ClientInfo {
    ClientInfo {
        client_info: Implementation {
            name: "mcp-rest".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            title: None,
            icons: None,
            website_url: None,
        },
        ..Default::default()
    }
}

/// A live MCP client session shared by every HTTP request.
///
/// `Peer` multiplexes concurrent requests by JSON-RPC id, so calls go straight
/// through without any queueing on our side.
pub struct McpUpstream {
    peer: Peer<RoleClient>,
    transport: TransportKind,
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl McpUpstream {
    /// Perform the MCP handshake over `transport` and start the session task.
    ///
    /// `child` is the subprocess behind a STDIO transport, if any. It is killed
    /// once the session ends. The session ends when `cancel` fires or the
    /// upstream closes the transport.
    pub async fn connect_with<T, E, A>(
        transport: T,
        kind: TransportKind,
        child: Option<Child>,
        handshake_timeout: Duration,
        cancel: CancellationToken,
    ) -> crate::Result<Self>
    where
        T: IntoTransport<RoleClient, E, A>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let handshake_result = tokio::time::timeout(
            handshake_timeout,
            client_info().serve_with_ct(transport, cancel.clone()),
        )
        .await;

        let running: RunningService<RoleClient, ClientInfo> = match handshake_result {
            Err(_elapsed) => {
                return Err(GatewayError::InitializationFailed(format!(
                    "MCP handshake timed out after {}s",
                    handshake_timeout.as_secs()
                )));
            }
            Ok(Err(e)) => return Err(GatewayError::InitializationFailed(e.to_string())),
            Ok(Ok(running)) => running,
        };

        if let Some(server) = running.peer_info() {
            tracing::info!(
                upstream = %server.server_info.name,
                version = %server.server_info.version,
                transport = %kind,
                "MCP handshake complete"
            );
        }

        // Clone peer before handing `running` to the session task (waiting() consumes self)
        let peer = running.peer().clone();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connected);

        tokio::spawn(async move {
            match running.waiting().await {
                Ok(reason) => tracing::info!(?reason, "upstream MCP session ended"),
                Err(e) => tracing::error!(error = %e, "upstream MCP session task failed"),
            }
            let _ = state_tx.send(ConnectionState::Disconnected);
            if let Some(mut child) = child {
                let _ = child.kill().await;
            }
        });

        Ok(Self {
            peer,
            transport: kind,
            state_rx,
            cancel,
        })
    }

    /// Which transport this session runs over.
    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Resolve once the upstream session has ended.
    pub async fn closed(&self) {
        let mut rx = self.state_rx.clone();
        let _ = rx
            .wait_for(|state| *state == ConnectionState::Disconnected)
            .await;
    }

    /// End the session (and kill a STDIO child).
    pub fn shutdown(&self) {
        tracing::info!(transport = %self.transport, "shutting down upstream MCP session");
        self.cancel.cancel();
    }
}

#[async_trait]
impl ToolProvider for McpUpstream {
    async fn list_tools(&self) -> crate::Result<Vec<Tool>> {
        self.peer
            .list_all_tools()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> crate::Result<CallToolResult> {
        let params = CallToolRequestParams {
            name: name.to_string().into(),
            arguments,
            task: None,
            meta: None,
        };
        self.peer
            .call_tool(params)
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }
}
