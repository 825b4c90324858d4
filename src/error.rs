//! Error types for mcp-rest gateway operations.

use thiserror::Error;

/// Main error type for mcp-rest operations
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Startup configuration is invalid (bad transport kind, missing fields, malformed JSON)
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Transport could not be opened (spawn failure, broken pipes)
    #[error("transport error: {0}")]
    Transport(String),

    /// MCP handshake with the upstream failed or timed out
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    /// Upstream rejected or failed a request after the session was established
    #[error("upstream error: {0}")]
    Protocol(String),

    /// Tool arguments could not be forwarded as an argument map
    #[error("invalid arguments for tool '{0}': {1}")]
    InvalidArguments(String, String),
}

/// Result type alias for mcp-rest operations
pub type Result<T> = std::result::Result<T, GatewayError>;
