//! Error types for MCP transport operations.
//!
//! Every failure surfaced by this crate is an [`McpError`]. The variants map
//! onto four distinguishable kinds:
//!
//! - **Connection**: no live channel (not connected, spawn failure, socket
//!   establishment failure, channel closed while awaiting a response)
//! - **Protocol**: malformed or unexpected responses, non-2xx HTTP statuses,
//!   generic send failures
//! - **Timeout**: no correlated response within the configured window
//! - **Tool**: application-level tool failures, reserved for client layers
//!   built on top of the transports (transports never produce it)
//!
//! Configuration errors form a fifth, ambient category raised while loading
//! or validating a [`crate::transport::TransportConfig`].

use std::time::Duration;
use thiserror::Error;

/// The main error type for all MCP transport operations.
///
/// # Examples
///
/// ```rust
/// use mcp_core::error::{ConnectionError, McpError};
///
/// let error = McpError::Connection(ConnectionError::NotConnected {
///     transport_type: "stdio".to_string(),
/// });
///
/// assert!(error.is_connection());
/// println!("Error: {}", error);
/// ```
#[derive(Error, Debug)]
pub enum McpError {
    /// No live channel to the server
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Malformed/unexpected response or generic send failure
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No response within the configured window
    #[error("Request to {operation} timed out after {duration_ms}ms")]
    Timeout {
        /// The operation (usually the JSON-RPC method) that timed out
        operation: String,
        /// The timeout duration in milliseconds
        duration_ms: u64,
    },

    /// Application-level tool failure signalled by a higher client layer
    #[error("Tool '{tool}' failed: {message}")]
    Tool {
        /// Name of the failing tool
        tool: String,
        /// Failure description reported by the tool
        message: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures to establish or use a live channel.
#[derive(Error, Debug, Clone)]
#[allow(missing_docs)]
pub enum ConnectionError {
    /// Operation requires a connected transport
    #[error("Transport not connected ({transport_type})")]
    NotConnected { transport_type: String },

    /// The child process could not be created
    #[error("Failed to start MCP server `{command}`: {reason}")]
    SpawnFailed { command: String, reason: String },

    /// A standard stream of the child process is not available
    #[error("Child process {stream} unavailable")]
    StreamUnavailable { stream: String },

    /// The remote endpoint could not be reached
    #[error("Failed to reach {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// The pooled HTTP client could not be built
    #[error("Failed to build HTTP client: {reason}")]
    ClientBuild { reason: String },

    /// The child process is no longer running
    #[error("MCP server process exited ({status})")]
    ProcessExited { status: String },

    /// The channel went away before a response to `method` arrived
    #[error("Connection closed before a response to '{method}' arrived")]
    Closed { method: String },

    /// The child process could not be brought down
    #[error("Failed to stop MCP server process: {reason}")]
    ShutdownFailed { reason: String },
}

/// Protocol-level failures.
#[derive(Error, Debug, Clone)]
#[allow(missing_docs)]
pub enum ProtocolError {
    /// Server answered with a non-2xx HTTP status
    #[error("HTTP error {status_code}: {body}")]
    HttpStatus { status_code: u16, body: String },

    /// Response could not be interpreted as JSON
    #[error("Invalid response: {reason}")]
    InvalidResponse { reason: String },

    /// Writing or posting the envelope failed
    #[error("Failed to send request via {transport_type}: {reason}")]
    SendFailed {
        transport_type: String,
        reason: String,
    },

    /// Envelope could not be encoded
    #[error("Failed to encode message: {reason}")]
    Serialization { reason: String },

    /// Credentials could not be refreshed or applied
    #[error("Authentication failed: {reason}")]
    Auth { reason: String },
}

/// Configuration-related errors.
#[derive(Error, Debug, Clone)]
#[allow(missing_docs)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Configuration file has invalid format
    #[error("Invalid configuration format in {path}: {reason}")]
    InvalidFormat { path: String, reason: String },

    /// Required configuration parameter is missing
    #[error("Missing required configuration parameter: {parameter}")]
    MissingParameter { parameter: String },

    /// Configuration parameter has invalid value
    #[error("Invalid value for parameter '{parameter}': {value} - {reason}")]
    InvalidValue {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Configuration file could not be written
    #[error("Failed to write configuration to {path}: {reason}")]
    WriteFailed { path: String, reason: String },
}

/// Coarse classification of an [`McpError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`McpError::Connection`]
    Connection,
    /// See [`McpError::Protocol`]
    Protocol,
    /// See [`McpError::Timeout`]
    Timeout,
    /// See [`McpError::Tool`]
    Tool,
    /// See [`McpError::Config`]
    Config,
}

/// Convenience type alias for Results using McpError.
pub type McpResult<T> = Result<T, McpError>;

impl McpError {
    /// Create a new timeout error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mcp_core::error::McpError;
    /// use std::time::Duration;
    ///
    /// let error = McpError::timeout("tools/list", Duration::from_secs(30));
    /// assert!(error.is_timeout());
    /// ```
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Create a tool-level error.
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a "not connected" connection error.
    pub fn not_connected(transport_type: impl Into<String>) -> Self {
        ConnectionError::NotConnected {
            transport_type: transport_type.into(),
        }
        .into()
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            McpError::Connection(_) => ErrorKind::Connection,
            McpError::Protocol(_) => ErrorKind::Protocol,
            McpError::Timeout { .. } => ErrorKind::Timeout,
            McpError::Tool { .. } => ErrorKind::Tool,
            McpError::Config(_) => ErrorKind::Config,
        }
    }

    /// Get the error category for this error.
    ///
    /// This is useful for error reporting and log fields.
    pub fn category(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Connection => "connection",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Tool => "tool",
            ErrorKind::Config => "config",
        }
    }

    /// Whether this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// Whether this is a connection error.
    pub fn is_connection(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }

    /// Whether this is a protocol error.
    pub fn is_protocol(&self) -> bool {
        self.kind() == ErrorKind::Protocol
    }

    /// Whether a pending request was cancelled because the channel closed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, McpError::Connection(ConnectionError::Closed { .. }))
    }

    /// HTTP status code carried by this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            McpError::Protocol(ProtocolError::HttpStatus { status_code, .. }) => {
                Some(*status_code)
            }
            _ => None,
        }
    }

    /// Check if this error is worth retrying.
    ///
    /// The transports themselves never retry; this is advisory metadata for
    /// callers that implement their own policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            McpError::Connection(err) => err.is_retryable(),
            McpError::Protocol(ProtocolError::HttpStatus { status_code, .. }) => {
                // 5xx errors are generally retryable, 4xx are not
                *status_code >= 500
            }
            McpError::Protocol(_) => false,
            McpError::Timeout { .. } => true,
            McpError::Tool { .. } => false,
            McpError::Config(_) => false,
        }
    }
}

impl ConnectionError {
    /// Check if this connection error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConnectionError::Unreachable { .. } => true,
            ConnectionError::Closed { .. } => true,
            ConnectionError::NotConnected { .. } => false,
            ConnectionError::SpawnFailed { .. } => false,
            ConnectionError::StreamUnavailable { .. } => false,
            ConnectionError::ProcessExited { .. } => false,
            ConnectionError::ClientBuild { .. } => false,
            ConnectionError::ShutdownFailed { .. } => false,
        }
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        McpError::Protocol(ProtocolError::Serialization {
            reason: err.to_string(),
        })
    }
}

impl From<url::ParseError> for McpError {
    fn from(err: url::ParseError) -> Self {
        McpError::Config(ConfigError::InvalidValue {
            parameter: "url".to_string(),
            value: err.to_string(),
            reason: "Invalid URL format".to_string(),
        })
    }
}
