//! mcp-rest: REST gateway over a single MCP server connection.
//! Connects once to an upstream MCP server (streaming HTTP or STDIO subprocess),
//! verifies it by listing tools, then proxies tool listing and tool calls
//! from plain HTTP routes.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod gateway;
pub mod upstream;

pub use bootstrap::{bootstrap, connect, verify};
pub use config::{
    parse_env_ref, parse_json_args, parse_json_env, resolve_env_vars, ConfigOverrides,
    GatewayConfig, TransportKind, UpstreamConfig,
};
pub use error::{GatewayError, Result};
pub use gateway::{router, ApiError, GatewayState, ENDPOINTS};
pub use upstream::{into_arguments, ConnectionState, McpUpstream, ToolProvider};
