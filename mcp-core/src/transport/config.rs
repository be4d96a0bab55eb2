//! Transport configuration for MCP clients.
//!
//! Configurations can be built programmatically with the builder-style
//! setters or loaded from JSON, YAML or TOML files.
//!
//! # Examples
//!
//! ```rust
//! use mcp_core::transport::{HttpConfig, StdioConfig, TransportConfig};
//! use std::time::Duration;
//!
//! // Stdio transport configuration
//! let stdio_config = TransportConfig::Stdio(
//!     StdioConfig::new("python")
//!         .arg("server.py")
//!         .timeout(Duration::from_secs(10))
//!         .env("LOG_LEVEL", "debug"),
//! );
//!
//! // HTTP transport configuration
//! let http_config = TransportConfig::Http(
//!     HttpConfig::new("https://api.example.com/mcp".parse().unwrap())
//!         .header("X-Client", "mcp-probe")
//!         .max_connections(10),
//! );
//!
//! assert_eq!(stdio_config.transport_type(), "stdio");
//! assert_eq!(http_config.transport_type(), "http");
//! ```

use crate::error::{ConfigError, McpResult};
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use tokio::sync::Semaphore;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_MAX_CONNECTIONS: usize = 100;
const DEFAULT_MAX_KEEPALIVE_CONNECTIONS: usize = 20;

/// Transport configuration enum supporting all MCP transport types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Local process communication via stdio
    Stdio(StdioConfig),

    /// Remote server reached through JSON-RPC over HTTP POST
    Http(HttpConfig),
}

impl TransportConfig {
    /// Create a new stdio transport configuration.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mcp_core::transport::TransportConfig;
    ///
    /// let config = TransportConfig::stdio("python", &["server.py"]);
    /// ```
    pub fn stdio(command: impl Into<String>, args: &[impl ToString]) -> Self {
        Self::Stdio(StdioConfig::new(command).args(args.iter().map(|s| s.to_string())))
    }

    /// Create a new HTTP transport configuration.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mcp_core::transport::TransportConfig;
    ///
    /// let config = TransportConfig::http("https://api.example.com/mcp").unwrap();
    /// assert!(TransportConfig::http("not a url").is_err());
    /// ```
    pub fn http(base_url: impl AsRef<str>) -> McpResult<Self> {
        let url = base_url
            .as_ref()
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                parameter: "base_url".to_string(),
                value: base_url.as_ref().to_string(),
                reason: format!("Invalid URL: {}", e),
            })?;

        Ok(Self::Http(HttpConfig::new(url)))
    }

    /// Get a human-readable name for this transport type.
    pub fn transport_type(&self) -> &'static str {
        match self {
            Self::Stdio(_) => "stdio",
            Self::Http(_) => "http",
        }
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> McpResult<()> {
        match self {
            Self::Stdio(config) => config.validate(),
            Self::Http(config) => config.validate(),
        }
    }

    /// Load configuration from a file.
    ///
    /// Supports JSON, YAML, and TOML formats based on file extension.
    pub fn from_file(path: impl AsRef<Path>) -> McpResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_e| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let invalid = |reason: String| ConfigError::InvalidFormat {
            path: path.display().to_string(),
            reason,
        };

        let config: Self = match ConfigFormat::from_path(path)? {
            ConfigFormat::Json => {
                serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?
            }
            ConfigFormat::Yaml => {
                serde_yaml::from_str(&content).map_err(|e| invalid(e.to_string()))?
            }
            ConfigFormat::Toml => toml::from_str(&content).map_err(|e| invalid(e.to_string()))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file.
    ///
    /// The format is chosen from the file extension, as for
    /// [`TransportConfig::from_file`].
    pub fn to_file(&self, path: impl AsRef<Path>) -> McpResult<()> {
        let path = path.as_ref();
        let invalid = |reason: String| ConfigError::InvalidFormat {
            path: path.display().to_string(),
            reason,
        };

        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Json => {
                serde_json::to_string_pretty(self).map_err(|e| invalid(e.to_string()))?
            }
            ConfigFormat::Yaml => serde_yaml::to_string(self).map_err(|e| invalid(e.to_string()))?,
            ConfigFormat::Toml => toml::to_string(self).map_err(|e| invalid(e.to_string()))?,
        };

        std::fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(())
    }
}

enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> McpResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            _ => Err(ConfigError::InvalidFormat {
                path: path.display().to_string(),
                reason: "Unsupported file format. Use .json, .yaml, or .toml".to_string(),
            }
            .into()),
        }
    }
}

/// Configuration for stdio (local process) transport.
///
/// This transport spawns a local process and communicates via stdin/stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdioConfig {
    /// Command to execute (e.g., "python", "/usr/bin/node")
    pub command: String,

    /// Arguments to pass to the command
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the process (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    /// How long `send_request` waits for a correlated response
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    /// Environment variables set on top of the inherited environment
    #[serde(default)]
    pub environment: HashMap<String, String>,

    /// How long `disconnect` waits after SIGTERM before killing the process
    #[serde(with = "humantime_serde", default = "default_shutdown_grace")]
    pub shutdown_grace: Duration,

    /// Log every stderr line of the child at debug level instead of
    /// leaving the pipe to the caller
    #[serde(default)]
    pub forward_stderr: bool,
}

impl StdioConfig {
    /// Create a new stdio configuration.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
            timeout: DEFAULT_TIMEOUT,
            environment: HashMap::new(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            forward_stderr: false,
        }
    }

    /// Add an argument to the command.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments to the command.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Set the terminate-then-kill grace period.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Forward child stderr to `tracing`.
    pub fn forward_stderr(mut self, enabled: bool) -> Self {
        self.forward_stderr = enabled;
        self
    }

    /// Validate the stdio configuration.
    pub fn validate(&self) -> McpResult<()> {
        if self.command.is_empty() {
            return Err(ConfigError::MissingParameter {
                parameter: "command".to_string(),
            }
            .into());
        }

        if let Some(ref dir) = self.working_dir {
            if !PathBuf::from(dir).exists() {
                return Err(ConfigError::InvalidValue {
                    parameter: "working_dir".to_string(),
                    value: dir.clone(),
                    reason: "Directory does not exist".to_string(),
                }
                .into());
            }
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                parameter: "timeout".to_string(),
                value: "0s".to_string(),
                reason: "Timeout must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Connection pool limits for the HTTP transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLimits {
    /// Maximum number of requests in flight at once
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Maximum number of idle connections kept alive per host
    #[serde(default = "default_max_keepalive_connections")]
    pub max_keepalive_connections: usize,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_keepalive_connections: DEFAULT_MAX_KEEPALIVE_CONNECTIONS,
        }
    }
}

/// Configuration for the HTTP transport.
///
/// Every message is POSTed to `<base_url>/` as a standalone JSON-RPC
/// envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Base URL for the MCP server
    pub base_url: Url,

    /// Timeout for HTTP requests
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    /// Additional HTTP headers to include
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Connection pool limits
    #[serde(default)]
    pub pool: PoolLimits,

    /// Authentication configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
}

impl HttpConfig {
    /// Create a new HTTP configuration.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            headers: HashMap::new(),
            pool: PoolLimits::default(),
            auth: None,
        }
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add an HTTP header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the maximum number of concurrent connections.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.pool.max_connections = max;
        self
    }

    /// Set the maximum number of idle keep-alive connections.
    pub fn max_keepalive_connections(mut self, max: usize) -> Self {
        self.pool.max_keepalive_connections = max;
        self
    }

    /// Set authentication configuration.
    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    /// The URL every envelope is POSTed to: the base URL with exactly one
    /// trailing slash.
    pub fn endpoint(&self) -> String {
        format!("{}/", self.base_url.as_str().trim_end_matches('/'))
    }

    /// Validate the HTTP configuration.
    pub fn validate(&self) -> McpResult<()> {
        if self.base_url.scheme() != "http" && self.base_url.scheme() != "https" {
            return Err(ConfigError::InvalidValue {
                parameter: "base_url".to_string(),
                value: self.base_url.to_string(),
                reason: "URL must use http or https scheme".to_string(),
            }
            .into());
        }

        if self.pool.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "pool.max_connections".to_string(),
                value: "0".to_string(),
                reason: "At least one connection must be allowed".to_string(),
            }
            .into());
        }

        if self.pool.max_connections > Semaphore::MAX_PERMITS {
            return Err(ConfigError::InvalidValue {
                parameter: "pool.max_connections".to_string(),
                value: self.pool.max_connections.to_string(),
                reason: format!("At most {} connections are supported", Semaphore::MAX_PERMITS),
            }
            .into());
        }

        for (key, value) in &self.headers {
            HeaderName::from_bytes(key.as_bytes()).map_err(|e| ConfigError::InvalidValue {
                parameter: "headers".to_string(),
                value: key.clone(),
                reason: e.to_string(),
            })?;
            HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidValue {
                parameter: format!("headers.{}", key),
                value: value.clone(),
                reason: e.to_string(),
            })?;
        }

        if let Some(ref auth) = self.auth {
            auth.validate()?;
        }

        Ok(())
    }
}

/// Authentication configuration for the HTTP transport.
///
/// Each variant is turned into a [`crate::auth::StaticAuth`] provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum AuthConfig {
    /// HTTP Basic Authentication
    Basic { username: String, password: String },

    /// Bearer token authentication
    Bearer { token: String },

    /// Custom header-based authentication
    Header { name: String, value: String },
}

impl AuthConfig {
    /// Create a new basic authentication configuration.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Create a new bearer token authentication configuration.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Create a new custom header authentication configuration.
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Header {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Name of the authentication scheme.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "basic",
            Self::Bearer { .. } => "bearer",
            Self::Header { .. } => "header",
        }
    }

    /// Validate the authentication configuration.
    pub fn validate(&self) -> McpResult<()> {
        let reason = match self {
            Self::Basic { username, password } if username.is_empty() || password.is_empty() => {
                "Username and password cannot be empty"
            }
            Self::Bearer { token } if token.is_empty() => "Token cannot be empty",
            Self::Header { name, value } if name.is_empty() || value.is_empty() => {
                "Header name and value cannot be empty"
            }
            _ => return Ok(()),
        };

        Err(ConfigError::InvalidValue {
            parameter: "auth".to_string(),
            value: self.scheme().to_string(),
            reason: reason.to_string(),
        }
        .into())
    }
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_shutdown_grace() -> Duration {
    DEFAULT_SHUTDOWN_GRACE
}

fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

fn default_max_keepalive_connections() -> usize {
    DEFAULT_MAX_KEEPALIVE_CONNECTIONS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdio_defaults() {
        let config = StdioConfig::new("node");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
        assert!(!config.forward_stderr);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_stdio_empty_command_rejected() {
        assert!(StdioConfig::new("").validate().is_err());
    }

    #[test]
    fn test_stdio_missing_working_dir_rejected() {
        let config = StdioConfig::new("node").working_dir("/definitely/not/a/dir");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_http_endpoint_has_single_trailing_slash() {
        let config = HttpConfig::new("http://localhost:8080".parse().unwrap());
        assert_eq!(config.endpoint(), "http://localhost:8080/");

        let config = HttpConfig::new("http://localhost:8080/mcp/".parse().unwrap());
        assert_eq!(config.endpoint(), "http://localhost:8080/mcp/");

        let config = HttpConfig::new("http://localhost:8080/mcp".parse().unwrap());
        assert_eq!(config.endpoint(), "http://localhost:8080/mcp/");
    }

    #[test]
    fn test_http_pool_defaults() {
        let config = HttpConfig::new("http://localhost".parse().unwrap());
        assert_eq!(config.pool.max_connections, 100);
        assert_eq!(config.pool.max_keepalive_connections, 20);
    }

    #[test]
    fn test_http_rejects_unusable_connection_limits() {
        let base = HttpConfig::new("http://localhost".parse().unwrap());
        assert!(base.clone().max_connections(0).validate().is_err());
        assert!(base.clone().max_connections(usize::MAX).validate().is_err());
        assert!(base
            .max_connections(Semaphore::MAX_PERMITS)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_http_rejects_non_http_scheme() {
        let config = HttpConfig::new("ftp://example.com".parse().unwrap());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_http_rejects_invalid_header() {
        let config = HttpConfig::new("http://localhost".parse().unwrap()).header("bad header", "x");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_auth_validation() {
        assert!(AuthConfig::bearer("token").validate().is_ok());
        assert!(AuthConfig::bearer("").validate().is_err());
        assert!(AuthConfig::basic("user", "").validate().is_err());
        assert!(AuthConfig::header("", "v").validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: TransportConfig = serde_json::from_str(
            r#"{"type": "http", "base_url": "http://localhost:3000", "timeout": "2s"}"#,
        )
        .unwrap();

        match config {
            TransportConfig::Http(http) => {
                assert_eq!(http.timeout, Duration::from_secs(2));
                assert_eq!(http.pool, PoolLimits::default());
                assert!(http.auth.is_none());
            }
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let config = TransportConfig::stdio("node", &["server.js"]);
        assert!(config.to_file("config.ini").is_err());
    }
}
