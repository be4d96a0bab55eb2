//! Core JSON-RPC 2.0 envelopes produced by the transports.
//!
//! Only the outbound side is typed: requests (which always carry an `id`)
//! and notifications (which never do). Responses are consumed as raw
//! [`serde_json::Value`]s and handed back to the caller verbatim.
//!
//! # Examples
//!
//! ```rust
//! use mcp_core::messages::core::{JsonRpcNotification, JsonRpcRequest, RequestIdCounter};
//! use serde_json::json;
//!
//! let ids = RequestIdCounter::new();
//! let request = JsonRpcRequest::new(ids.next_id(), "tools/list", Some(json!({})));
//! assert_eq!(request.id, "1");
//!
//! let notification = JsonRpcNotification::new("notifications/initialized", None);
//! let line = notification.to_line().unwrap();
//! assert!(!line.contains("\"id\""));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC protocol version carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request message.
///
/// Always carries an `id`; the matching response is correlated through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Unique identifier for request/response correlation
    pub id: String,

    /// Method name being invoked
    pub method: String,

    /// Parameters for the method (can be object or array)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Serialize into a single newline-terminated line for stdio framing.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        to_line(self)
    }
}

/// JSON-RPC 2.0 notification message.
///
/// A one-way message; it never carries an `id` and never gets a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Method name being invoked
    pub method: String,

    /// Parameters for the method (can be object or array)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new JSON-RPC notification.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }

    /// Serialize into a single newline-terminated line for stdio framing.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        to_line(self)
    }
}

fn to_line<T: Serialize>(message: &T) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Per-transport request id allocator.
///
/// Ids are decimal strings starting at `"1"` and strictly increasing. The
/// counter is never reset, so an id is never reused by the same transport
/// instance, even across reconnects.
#[derive(Debug, Default)]
pub struct RequestIdCounter {
    last: AtomicU64,
}

impl RequestIdCounter {
    /// Create a counter whose first id will be `"1"`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next request id.
    pub fn next_id(&self) -> String {
        (self.last.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }

    /// Number of ids handed out so far.
    pub fn allocated(&self) -> u64 {
        self.last.load(Ordering::Relaxed)
    }
}

/// Extract the correlation id of an inbound message.
///
/// Only string ids are recognised, since that is the only form this crate
/// ever sends.
pub fn response_id(message: &Value) -> Option<&str> {
    message.get("id").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_envelope_shape() {
        let request = JsonRpcRequest::new("7", "tools/call", Some(json!({"name": "echo"})));
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "id": "7",
                "method": "tools/call",
                "params": {"name": "echo"}
            })
        );
    }

    #[test]
    fn test_params_omitted_when_none() {
        let request = JsonRpcRequest::new("1", "ping", None);
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("params").is_none());
    }

    #[test]
    fn test_notification_never_has_id() {
        let notification = JsonRpcNotification::new("notifications/progress", Some(json!({})));
        let value = serde_json::to_value(&notification).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["jsonrpc"], "2.0");
    }

    #[test]
    fn test_to_line_is_single_terminated_line() {
        let request = JsonRpcRequest::new("1", "ping", Some(json!({"text": "a\nb"})));
        let line = request.to_line().unwrap();

        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn test_request_ids_start_at_one_and_increase() {
        let ids = RequestIdCounter::new();
        assert_eq!(ids.allocated(), 0);

        let allocated: Vec<String> = (0..5).map(|_| ids.next_id()).collect();
        assert_eq!(allocated, vec!["1", "2", "3", "4", "5"]);
        assert_eq!(ids.allocated(), 5);
    }

    #[test]
    fn test_response_id_only_matches_strings() {
        assert_eq!(response_id(&json!({"id": "3", "result": 1})), Some("3"));
        assert_eq!(response_id(&json!({"id": 3, "result": 1})), None);
        assert_eq!(response_id(&json!({"method": "notifications/message"})), None);
    }
}
