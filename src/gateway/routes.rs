//! Route handlers. Each one calls the provider once and translates the result.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rmcp::model::Tool;
use serde::Serialize;
use serde_json::{json, Value};

use crate::gateway::{ApiError, GatewayState};
use crate::upstream::{into_arguments, ConnectionState};

/// Body of `GET /tools`.
#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<Tool>,
}

/// Body of `POST /tools/:toolId`. A missing `arguments` field reads as `null`.
#[derive(Debug, Default)]
pub struct CallToolBody {
    pub arguments: Value,
}

impl CallToolBody {
    /// Read the request body leniently.
    ///
    /// An empty body, or one not declared as JSON, carries no arguments. Only a
    /// JSON-typed body that fails to parse is rejected (400).
    pub fn from_request(headers: &HeaderMap, body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) || !is_json_content_type(headers) {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                format!("failed to parse request body as JSON: {}", e),
            )
        })?;
        Ok(Self {
            arguments: value.get("arguments").cloned().unwrap_or(Value::Null),
        })
    }
}

/// `application/json` or any `+json` media type, parameters ignored.
fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let essence = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// GET /status
///
/// Reports the upstream session state without calling the upstream.
pub(crate) async fn status(State(state): State<GatewayState>) -> Response {
    let connection = state.provider.connection_state();
    let code = match connection {
        ConnectionState::Connected => StatusCode::OK,
        ConnectionState::Disconnected => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(json!({ "status": connection.as_str() }))).into_response()
}

/// GET /tools
///
/// Fetches the tool list fresh from the upstream on every request.
pub(crate) async fn list_tools(
    State(state): State<GatewayState>,
) -> Result<Json<ToolsResponse>, ApiError> {
    tracing::debug!("getting all tools");
    match state.provider.list_tools().await {
        Ok(tools) => {
            tracing::debug!(tool_count = tools.len(), "returning tools");
            Ok(Json(ToolsResponse { tools }))
        }
        Err(e) => {
            tracing::error!(error = %e, "error getting tools");
            Err(e.into())
        }
    }
}

/// POST /tools/:toolId
///
/// Forwards `arguments` to the named tool and returns only the result's
/// `content` array.
pub(crate) async fn call_tool(
    State(state): State<GatewayState>,
    Path(tool_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let body = CallToolBody::from_request(&headers, &body)?;
    tracing::debug!(tool = %tool_id, arguments = %body.arguments, "calling tool");

    let result = match into_arguments(&tool_id, body.arguments) {
        Ok(arguments) => state.provider.call_tool(&tool_id, arguments).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(result) => {
            if result.is_error == Some(true) {
                tracing::warn!(tool = %tool_id, "tool reported an error result");
            } else {
                tracing::debug!(tool = %tool_id, "tool returned successfully");
            }
            Ok(Json(result.content).into_response())
        }
        Err(e) => {
            tracing::error!(tool = %tool_id, error = %e, "error calling tool");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use rmcp::model::{CallToolResult, Content};
    use tower::ServiceExt;

    use crate::error::GatewayError;
    use crate::gateway::router;
    use crate::upstream::{ConnectionState, ToolProvider};

    type Arguments = Option<serde_json::Map<String, Value>>;

    fn make_tool(name: &str, description: Option<&str>) -> Tool {
        let schema = Arc::new(
            json!({"type": "object", "properties": {}})
                .as_object()
                .unwrap()
                .clone(),
        );
        Tool {
            name: name.to_string().into(),
            title: None,
            description: description.map(|d| d.to_string().into()),
            input_schema: schema,
            output_schema: None,
            annotations: None,
            icons: None,
            meta: None,
        }
    }

    /// In-memory provider: `echo` returns its arguments as text, `flaky`
    /// returns an error-flagged result, anything else is unknown.
    struct FakeProvider {
        tools: Vec<Tool>,
        list_failure: Option<String>,
        state: ConnectionState,
        calls: Mutex<Vec<(String, Arguments)>>,
    }

    impl FakeProvider {
        fn new() -> Self {
            Self {
                tools: vec![
                    make_tool("echo", Some("Echo the arguments back")),
                    make_tool("flaky", None),
                ],
                list_failure: None,
                state: ConnectionState::Connected,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ToolProvider for FakeProvider {
        async fn list_tools(&self) -> crate::Result<Vec<Tool>> {
            match &self.list_failure {
                Some(msg) => Err(GatewayError::Protocol(msg.clone())),
                None => Ok(self.tools.clone()),
            }
        }

        async fn call_tool(&self, name: &str, arguments: Arguments) -> crate::Result<CallToolResult> {
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), arguments.clone()));
            match name {
                "echo" => {
                    let echoed = Value::Object(arguments.unwrap_or_default());
                    Ok(CallToolResult::success(vec![Content::text(echoed.to_string())]))
                }
                "flaky" => Ok(CallToolResult::error(vec![Content::text("it broke")])),
                other => Err(GatewayError::Protocol(format!("tool '{}' not found", other))),
            }
        }

        fn connection_state(&self) -> ConnectionState {
            self.state
        }
    }

    fn app(provider: Arc<FakeProvider>) -> Router {
        router(provider)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_raw(uri: &str, content_type: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_list_tools_returns_tools_array() {
        let (status, body) = send(app(Arc::new(FakeProvider::new())), get("/tools")).await;

        assert_eq!(status, StatusCode::OK);
        let tools = body["tools"].as_array().expect("tools should be an array");
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["name"], "echo");
        assert_eq!(tools[1]["name"], "flaky");
        assert_eq!(tools[0]["description"], "Echo the arguments back");
    }

    #[tokio::test]
    async fn test_list_tools_failure_is_500() {
        let mut provider = FakeProvider::new();
        provider.list_failure = Some("connection reset".to_string());

        let (status, body) = send(app(Arc::new(provider)), get("/tools")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "upstream error: connection reset");
    }

    #[tokio::test]
    async fn test_call_tool_returns_content_only() {
        let provider = Arc::new(FakeProvider::new());
        let (status, body) = send(
            app(provider.clone()),
            post_json("/tools/echo", r#"{"arguments":{"x":1}}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let content = body.as_array().expect("content should be an array");
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["type"], "text");
        let echoed: Value = serde_json::from_str(content[0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(echoed, json!({"x": 1}));
        assert!(body.get("isError").is_none());

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "echo");
    }

    #[tokio::test]
    async fn test_call_tool_missing_arguments_forwarded_as_none() {
        let provider = Arc::new(FakeProvider::new());
        let (status, _) = send(app(provider.clone()), post_json("/tools/echo", "{}")).await;

        assert_eq!(status, StatusCode::OK);
        let calls = provider.calls.lock().unwrap();
        assert!(calls[0].1.is_none());
    }

    #[tokio::test]
    async fn test_call_tool_without_body_has_no_arguments() {
        let provider = Arc::new(FakeProvider::new());
        let (status, body) = send(app(provider.clone()), post_raw("/tools/echo", None, "")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["text"], "{}");
        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.is_none());
    }

    #[tokio::test]
    async fn test_call_unknown_tool_without_body_is_500() {
        let (status, body) = send(
            app(Arc::new(FakeProvider::new())),
            post_raw("/tools/nonexistent", None, ""),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("nonexistent"));
    }

    #[tokio::test]
    async fn test_call_tool_empty_json_body_has_no_arguments() {
        let provider = Arc::new(FakeProvider::new());
        let (status, _) = send(
            app(provider.clone()),
            post_raw("/tools/echo", Some("application/json"), ""),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(provider.calls.lock().unwrap()[0].1.is_none());
    }

    #[tokio::test]
    async fn test_call_tool_form_content_type_ignores_body() {
        let provider = Arc::new(FakeProvider::new());
        let (status, _) = send(
            app(provider.clone()),
            post_raw(
                "/tools/echo",
                Some("application/x-www-form-urlencoded"),
                r#"{"arguments":{"x":1}}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(provider.calls.lock().unwrap()[0].1.is_none());
    }

    #[tokio::test]
    async fn test_call_tool_json_content_type_with_charset() {
        let provider = Arc::new(FakeProvider::new());
        let (status, _) = send(
            app(provider.clone()),
            post_raw(
                "/tools/echo",
                Some("application/json; charset=utf-8"),
                r#"{"arguments":{"x":1}}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls[0].1.as_ref().unwrap()["x"], 1);
    }

    #[tokio::test]
    async fn test_call_unknown_tool_is_500() {
        let (status, body) = send(
            app(Arc::new(FakeProvider::new())),
            post_json("/tools/nonexistent", r#"{"arguments":{}}"#),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = body["error"].as_str().expect("error should be a string");
        assert!(message.contains("nonexistent"));
    }

    #[tokio::test]
    async fn test_call_tool_non_object_arguments_is_500_without_upstream_call() {
        let provider = Arc::new(FakeProvider::new());
        let (status, body) = send(
            app(provider.clone()),
            post_json("/tools/echo", r#"{"arguments":[1,2,3]}"#),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("got array"));
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_call_tool_error_result_still_returns_content() {
        let (status, body) = send(
            app(Arc::new(FakeProvider::new())),
            post_json("/tools/flaky", r#"{"arguments":{}}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["text"], "it broke");
    }

    #[tokio::test]
    async fn test_call_tool_malformed_body_rejected() {
        let provider = Arc::new(FakeProvider::new());
        let (status, body) =
            send(app(provider.clone()), post_json("/tools/echo", "{not json")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("JSON"));
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_connected() {
        let (status, body) = send(app(Arc::new(FakeProvider::new())), get("/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "connected" }));
    }

    #[tokio::test]
    async fn test_status_disconnected_is_503() {
        let mut provider = FakeProvider::new();
        provider.state = ConnectionState::Disconnected;

        let (status, body) = send(app(Arc::new(provider)), get("/status")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, json!({ "status": "disconnected" }));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (status, _) = send(app(Arc::new(FakeProvider::new())), get("/health")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
