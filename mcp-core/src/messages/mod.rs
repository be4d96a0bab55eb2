//! JSON-RPC envelope types and request id helpers.
//!
//! The transports build every outbound message from [`JsonRpcRequest`] and
//! [`JsonRpcNotification`]. Inbound messages stay untyped
//! ([`serde_json::Value`]) because the transport layer only needs their `id`
//! for correlation.

pub mod core;

pub use self::core::*;
