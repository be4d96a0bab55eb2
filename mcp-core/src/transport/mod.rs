//! MCP transport layer abstraction and implementations.
//!
//! This module provides one contract, [`Transport`], and two implementations:
//! - **stdio** ([`stdio::StdioTransport`]): owns a child process and speaks
//!   newline-delimited JSON-RPC over its stdin/stdout
//! - **HTTP** ([`http::HttpTransport`]): POSTs each envelope through a pooled
//!   HTTP client; the HTTP response is the JSON-RPC response
//!
//! Callers should hold a `Box<dyn Transport>` or `Arc<dyn Transport>` rather
//! than a concrete type, so a mock or fallback transport can be swapped in
//! without touching client logic.
//!
//! # Examples
//!
//! ```rust,no_run
//! use mcp_core::transport::{Transport, TransportFactory, TransportConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TransportConfig::stdio("python", &["server.py"]);
//!     let transport = TransportFactory::create(config)?;
//!
//!     transport.connect().await?;
//!     let response = transport.send_request("tools/list", Some(json!({}))).await?;
//!     println!("Received: {}", response);
//!     transport.send_notification("notifications/initialized", None).await?;
//!     transport.disconnect().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod factory;

#[cfg(feature = "stdio")]
pub mod stdio;

#[cfg(feature = "http")]
pub mod http;

pub use config::*;
pub use factory::*;

use crate::error::McpResult;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Core transport trait for MCP communication.
///
/// All methods take `&self`: implementations keep their connection state
/// behind interior mutability so that one transport can serve many
/// concurrent requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the MCP server.
    ///
    /// Idempotent: connecting an already connected transport is a no-op.
    async fn connect(&self) -> McpResult<()>;

    /// Disconnect from the MCP server and release every resource.
    ///
    /// Safe to call repeatedly and on a transport that never connected.
    async fn disconnect(&self) -> McpResult<()>;

    /// Check if the transport is currently connected.
    fn is_connected(&self) -> bool;

    /// Send a JSON-RPC request and wait for the correlated response.
    ///
    /// The full response envelope is returned verbatim.
    ///
    /// # Errors
    ///
    /// - [`crate::McpError::Connection`] if the transport is not connected
    ///   or the channel is lost while waiting
    /// - [`crate::McpError::Timeout`] if no response arrives in time
    /// - [`crate::McpError::Protocol`] for send failures, non-2xx statuses
    ///   and malformed responses
    async fn send_request(&self, method: &str, params: Option<Value>) -> McpResult<Value>;

    /// Send a JSON-RPC notification (fire-and-forget).
    ///
    /// Delivery failures are logged and discarded; they are never returned.
    ///
    /// # Errors
    ///
    /// Only [`crate::McpError::Connection`] when the transport is not
    /// connected.
    async fn send_notification(&self, method: &str, params: Option<Value>) -> McpResult<()>;

    /// Get transport-specific metadata and statistics.
    fn get_info(&self) -> TransportInfo;

    /// Short name of the transport ("stdio", "http").
    fn transport_type(&self) -> &'static str;
}

/// Transport information and statistics.
///
/// A point-in-time snapshot produced by [`Transport::get_info`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransportInfo {
    /// Type of transport (stdio, http)
    pub transport_type: String,

    /// Whether the transport is currently connected
    pub connected: bool,

    /// Connection establishment time (if connected)
    pub connected_since: Option<SystemTime>,

    /// Number of requests sent
    pub requests_sent: u64,

    /// Number of responses received
    pub responses_received: u64,

    /// Number of notifications sent
    pub notifications_sent: u64,

    /// Number of unsolicited messages received from the server
    pub notifications_received: u64,

    /// Number of errors encountered
    pub errors: u64,

    /// Transport-specific metadata
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
}

impl TransportInfo {
    /// Create a new transport info structure.
    pub fn new(transport_type: impl Into<String>) -> Self {
        Self {
            transport_type: transport_type.into(),
            connected: false,
            connected_since: None,
            requests_sent: 0,
            responses_received: 0,
            notifications_sent: 0,
            notifications_received: 0,
            errors: 0,
            metadata: std::collections::HashMap::new(),
        }
    }

    /// Add transport-specific metadata.
    pub fn add_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Get the duration since connection was established.
    pub fn connection_duration(&self) -> Option<Duration> {
        self.connected_since.map(|since| {
            SystemTime::now()
                .duration_since(since)
                .unwrap_or_default()
        })
    }
}

/// Lock-free counters shared between a transport and its background tasks.
#[derive(Debug, Default)]
pub(crate) struct TransportStats {
    connected: AtomicBool,
    /// Milliseconds since the Unix epoch, 0 while disconnected
    connected_since_ms: AtomicU64,
    requests_sent: AtomicU64,
    responses_received: AtomicU64,
    notifications_sent: AtomicU64,
    notifications_received: AtomicU64,
    errors: AtomicU64,
}

impl TransportStats {
    pub(crate) fn mark_connected(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.connected_since_ms.store(now.max(1), Ordering::Relaxed);
        self.connected.store(true, Ordering::Release);
    }

    pub(crate) fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
        self.connected_since_ms.store(0, Ordering::Relaxed);
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub(crate) fn request_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn response_received(&self) {
        self.responses_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn notification_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn notification_received(&self) {
        self.notifications_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, transport_type: &str) -> TransportInfo {
        let since_ms = self.connected_since_ms.load(Ordering::Relaxed);
        let mut info = TransportInfo::new(transport_type);
        info.connected = self.is_connected();
        info.connected_since =
            (since_ms != 0).then(|| UNIX_EPOCH + Duration::from_millis(since_ms));
        info.requests_sent = self.requests_sent.load(Ordering::Relaxed);
        info.responses_received = self.responses_received.load(Ordering::Relaxed);
        info.notifications_sent = self.notifications_sent.load(Ordering::Relaxed);
        info.notifications_received = self.notifications_received.load(Ordering::Relaxed);
        info.errors = self.errors.load(Ordering::Relaxed);
        info
    }
}

/// Settle a fire-and-forget delivery attempt.
///
/// Notifications are best-effort: a failure is counted and logged, then
/// dropped.
pub(crate) fn discard_notification_failure(
    stats: &TransportStats,
    transport_type: &str,
    method: &str,
    outcome: McpResult<()>,
) {
    match outcome {
        Ok(()) => stats.notification_sent(),
        Err(e) => {
            stats.error();
            tracing::warn!(
                transport = transport_type,
                method,
                error = %e,
                "Dropping failed notification"
            );
        }
    }
}
