//! Gateway configuration: TOML deserialization, CLI overrides and validation.

use crate::error::GatewayError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Upstream endpoint used when `sse` is selected and no URL is configured.
pub const DEFAULT_URL: &str = "http://localhost:8000/sse";

/// Default HTTP listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default HTTP bind address.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Strip an env var reference to its variable name.
///
/// Accepts `${VAR_NAME}` syntax only. Returns `None` for anything else.
pub fn parse_env_ref(value: &str) -> Option<&str> {
    value.strip_prefix("${").and_then(|s| s.strip_suffix('}'))
}

/// Resolve the subprocess environment.
///
/// `${VAR}` values are read from the gateway's own environment (unset
/// variables resolve to the empty string); any other value is passed through
/// literally.
pub fn resolve_env_vars(env: &HashMap<String, String>) -> HashMap<String, String> {
    env.iter()
        .map(|(k, v)| {
            let resolved = match parse_env_ref(v) {
                Some(var_name) => std::env::var(var_name).unwrap_or_default(),
                None => v.clone(),
            };
            (k.clone(), resolved)
        })
        .collect()
}

/// Parse the `--args` flag: a JSON array of strings.
pub fn parse_json_args(raw: &str) -> crate::Result<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| {
        GatewayError::InvalidConfig(format!("--args must be a JSON array of strings: {}", e))
    })
}

/// Parse the `--env` flag: a JSON object with string values.
pub fn parse_json_env(raw: &str) -> crate::Result<HashMap<String, String>> {
    serde_json::from_str(raw).map_err(|e| {
        GatewayError::InvalidConfig(format!(
            "--env must be a JSON object with string values: {}",
            e
        ))
    })
}

/// Supported upstream transport types.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Streaming HTTP endpoint
    #[default]
    Sse,
    /// Local subprocess speaking MCP over stdin/stdout
    Stdio,
}

impl FromStr for TransportKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sse" => Ok(TransportKind::Sse),
            "stdio" => Ok(TransportKind::Stdio),
            other => Err(GatewayError::InvalidConfig(format!(
                "unknown transport type '{}': expected \"sse\" or \"stdio\"",
                other
            ))),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Sse => f.write_str("sse"),
            TransportKind::Stdio => f.write_str("stdio"),
        }
    }
}

fn default_handshake_timeout_secs() -> u64 {
    30
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// How to reach the upstream MCP server.
#[derive(Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default)]
    pub transport: TransportKind,
    // SSE fields
    pub url: Option<String>,
    // STDIO fields
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
    /// Bound on the MCP initialize handshake. Request-time calls are never timed out.
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            url: None,
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            handshake_timeout_secs: default_handshake_timeout_secs(),
        }
    }
}

// `env` values may be inline secrets; only the keys are shown.
impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut env_keys: Vec<&str> = self.env.keys().map(String::as_str).collect();
        env_keys.sort_unstable();
        f.debug_struct("UpstreamConfig")
            .field("transport", &self.transport)
            .field("url", &self.url)
            .field("command", &self.command)
            .field("args", &self.args)
            .field("env_keys", &env_keys)
            .field("cwd", &self.cwd)
            .field("handshake_timeout_secs", &self.handshake_timeout_secs)
            .finish()
    }
}

impl UpstreamConfig {
    /// The streaming endpoint to connect to, falling back to [`DEFAULT_URL`].
    pub fn url_or_default(&self) -> &str {
        self.url.as_deref().unwrap_or(DEFAULT_URL)
    }
}

/// Top-level gateway configuration, parsed from TOML and/or CLI flags.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub debug: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig::default(),
            host: default_host(),
            port: default_port(),
            debug: false,
        }
    }
}

/// Values given on the command line. `None` means "not given" so the file
/// value (or the default) is kept.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub transport: Option<String>,
    pub url: Option<String>,
    pub command: Option<String>,
    /// Raw JSON array, as passed to `--args`.
    pub args_json: Option<String>,
    /// Raw JSON object, as passed to `--env`.
    pub env_json: Option<String>,
    pub cwd: Option<PathBuf>,
    pub handshake_timeout_secs: Option<u64>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub debug: bool,
}

impl GatewayConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| GatewayError::InvalidConfig(format!("failed to parse config: {}", e)))
    }

    /// Read and parse a TOML config file.
    pub async fn load(path: &Path) -> crate::Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            GatewayError::InvalidConfig(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Layer CLI overrides on top of this config.
    ///
    /// JSON-encoded `--args` / `--env` are parsed here, so malformed values
    /// fail before any connection is attempted.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> crate::Result<Self> {
        if let Some(kind) = overrides.transport {
            self.upstream.transport = kind.parse()?;
        }
        if let Some(url) = overrides.url {
            self.upstream.url = Some(url);
        }
        if let Some(command) = overrides.command {
            self.upstream.command = Some(command);
        }
        if let Some(raw) = overrides.args_json {
            self.upstream.args = parse_json_args(&raw)?;
        }
        if let Some(raw) = overrides.env_json {
            self.upstream.env = parse_json_env(&raw)?;
        }
        if let Some(cwd) = overrides.cwd {
            self.upstream.cwd = Some(cwd);
        }
        if let Some(secs) = overrides.handshake_timeout_secs {
            self.upstream.handshake_timeout_secs = secs;
        }
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        self.debug |= overrides.debug;
        Ok(self)
    }

    /// Validate the config, failing fast before any connection is attempted.
    pub fn validate(&self) -> crate::Result<()> {
        let upstream = &self.upstream;

        match upstream.transport {
            TransportKind::Sse => {
                if upstream.url.as_deref().is_some_and(|u| u.trim().is_empty()) {
                    return Err(GatewayError::InvalidConfig(
                        "SSE transport requires a non-empty 'url'".to_string(),
                    ));
                }
                if upstream.command.is_some() {
                    return Err(GatewayError::InvalidConfig(
                        "SSE transport should not have 'command' field".to_string(),
                    ));
                }
            }
            TransportKind::Stdio => {
                match upstream.command.as_deref() {
                    None => {
                        return Err(GatewayError::InvalidConfig(
                            "STDIO transport requires 'command' field".to_string(),
                        ));
                    }
                    Some(cmd) if cmd.trim().is_empty() => {
                        return Err(GatewayError::InvalidConfig(
                            "STDIO transport requires non-empty 'command' field".to_string(),
                        ));
                    }
                    Some(_) => {}
                }
                // A leftover `url` is ignored here; connect_stdio warns about it.
            }
        }

        if upstream.handshake_timeout_secs == 0 {
            return Err(GatewayError::InvalidConfig(
                "handshake_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.host.trim().is_empty() {
            return Err(GatewayError::InvalidConfig(
                "host must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
