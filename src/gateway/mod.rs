//! REST gateway: axum router in front of a [`ToolProvider`].
//!
//! The provider is injected as router state; handlers never hold tool data
//! across requests.

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::upstream::ToolProvider;

pub use error::ApiError;

/// Routes served by the gateway, as `(method, path, description)`.
///
/// Used for the startup banner so it only ever lists registered routes.
pub const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("GET", "/status", "Check upstream connection status"),
    ("GET", "/tools", "List all available tools"),
    ("POST", "/tools/:toolId", "Call a specific tool with arguments"),
];

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct GatewayState {
    pub provider: Arc<dyn ToolProvider>,
}

/// Build the gateway router over `provider`.
pub fn router(provider: Arc<dyn ToolProvider>) -> Router {
    Router::new()
        .route("/status", get(routes::status))
        .route("/tools", get(routes::list_tools))
        .route("/tools/:tool_id", post(routes::call_tool))
        .with_state(GatewayState { provider })
}
