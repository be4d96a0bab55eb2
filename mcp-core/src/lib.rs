//! # MCP Core Library
//!
//! `mcp-core` provides the client-side transport layer for the Model Context
//! Protocol (MCP): a single [`Transport`] contract for exchanging JSON-RPC 2.0
//! messages with an MCP server, and two implementations of it.
//!
//! ## Features
//!
//! - **Transport Abstraction**: One async interface over local processes
//!   (stdio) and remote servers (HTTP POST)
//! - **Request Correlation**: String ids, strictly increasing per transport,
//!   with any number of requests in flight
//! - **Type-Safe Configuration**: Builder-style or file-based (JSON, YAML,
//!   TOML) configuration for both transports
//! - **Pluggable Authentication**: An [`auth::AuthProvider`] capability
//!   consulted before every HTTP request
//! - **Structured Errors**: Connection, protocol, timeout and tool failures
//!   are distinguishable by kind
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mcp_core::{Transport, TransportConfig, TransportFactory};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TransportConfig::stdio("python", &["server.py"]);
//!     let transport = TransportFactory::create(config)?;
//!
//!     transport.connect().await?;
//!     let response = transport
//!         .send_request("tools/call", Some(json!({"name": "echo"})))
//!         .await?;
//!     println!("Response: {}", response);
//!     transport.disconnect().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`error`]: Error types for all transport operations
//! - [`messages`]: JSON-RPC envelopes and request id allocation
//! - [`auth`]: Authentication capability for the HTTP transport
//! - [`transport`]: Transport abstraction, configuration and implementations
//!
//! ## Transport Support
//!
//! - **stdio**: Local process communication (enabled by default)
//! - **http**: JSON-RPC over HTTP POST (enabled by default)
//!
//! Transport support can be controlled via feature flags.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::uninlined_format_args)]

pub mod auth;
pub mod error;
pub mod messages;
pub mod transport;

// Re-export commonly used types for convenience
pub use auth::{AuthProvider, StaticAuth};
pub use error::{ConfigError, ConnectionError, ErrorKind, McpError, McpResult, ProtocolError};
pub use messages::{JsonRpcNotification, JsonRpcRequest, RequestIdCounter};
pub use transport::{Transport, TransportConfig, TransportFactory, TransportInfo};

#[cfg(feature = "http")]
pub use transport::http::HttpTransport;
#[cfg(feature = "stdio")]
pub use transport::stdio::StdioTransport;

/// Current version of the mcp-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
