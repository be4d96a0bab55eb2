//! Transport factory for creating transport instances.

use std::sync::Arc;

use super::{Transport, TransportConfig};
use crate::error::McpResult;

#[cfg(feature = "stdio")]
use super::stdio::StdioTransport;

#[cfg(feature = "http")]
use super::http::HttpTransport;

/// Factory for creating transport instances.
///
/// The factory validates a [`TransportConfig`] and returns the matching
/// implementation behind the [`Transport`] trait, so callers never name a
/// concrete transport type.
///
/// # Examples
///
/// ```rust
/// use mcp_core::transport::{TransportConfig, TransportFactory};
///
/// let config = TransportConfig::stdio("python", &["server.py"]);
/// let transport = TransportFactory::create(config).unwrap();
/// assert_eq!(transport.transport_type(), "stdio");
/// assert!(!transport.is_connected());
/// ```
pub struct TransportFactory;

impl TransportFactory {
    /// Create a transport instance from configuration.
    ///
    /// Nothing is spawned or dialled here; call [`Transport::connect`] on
    /// the result.
    ///
    /// # Errors
    ///
    /// * `ConfigError` - If the configuration is invalid, or the requested
    ///   transport type is not compiled in
    pub fn create(config: TransportConfig) -> McpResult<Box<dyn Transport>> {
        config.validate()?;

        match config {
            #[cfg(feature = "stdio")]
            TransportConfig::Stdio(stdio_config) => Ok(Box::new(StdioTransport::new(stdio_config))),

            #[cfg(not(feature = "stdio"))]
            TransportConfig::Stdio(_) => Err(not_compiled_in("stdio")),

            #[cfg(feature = "http")]
            TransportConfig::Http(http_config) => {
                Ok(Box::new(HttpTransport::from_config(http_config)?))
            }

            #[cfg(not(feature = "http"))]
            TransportConfig::Http(_) => Err(not_compiled_in("http")),
        }
    }

    /// Like [`TransportFactory::create`], but returns a shareable handle for
    /// issuing requests from several tasks.
    pub fn create_shared(config: TransportConfig) -> McpResult<Arc<dyn Transport>> {
        Self::create(config).map(Arc::from)
    }

    /// Get a list of supported transport types for this build.
    pub fn supported_transports() -> Vec<&'static str> {
        vec![
            #[cfg(feature = "stdio")]
            "stdio",
            #[cfg(feature = "http")]
            "http",
        ]
    }
}

#[cfg(any(not(feature = "stdio"), not(feature = "http")))]
fn not_compiled_in(transport_type: &str) -> crate::error::McpError {
    crate::error::ConfigError::InvalidValue {
        parameter: "type".to_string(),
        value: transport_type.to_string(),
        reason: format!(
            "{} transport support not compiled in (enable '{}' feature)",
            transport_type, transport_type
        ),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{AuthConfig, HttpConfig};

    #[test]
    fn test_supported_transports() {
        let transports = TransportFactory::supported_transports();

        #[cfg(feature = "stdio")]
        assert!(transports.contains(&"stdio"));

        #[cfg(feature = "http")]
        assert!(transports.contains(&"http"));
    }

    #[test]
    fn test_create_stdio_transport() {
        let config = TransportConfig::stdio("echo", &["hello"]);
        let result = TransportFactory::create(config);

        #[cfg(feature = "stdio")]
        assert_eq!(result.unwrap().get_info().transport_type, "stdio");

        #[cfg(not(feature = "stdio"))]
        assert!(result.is_err());
    }

    #[test]
    fn test_create_http_transport_with_auth() {
        let config = TransportConfig::Http(
            HttpConfig::new("https://example.com/mcp".parse().unwrap())
                .auth(AuthConfig::bearer("token")),
        );
        let result = TransportFactory::create_shared(config);

        #[cfg(feature = "http")]
        {
            let transport = result.unwrap();
            let info = transport.get_info();
            assert_eq!(info.transport_type, "http");
            assert_eq!(info.metadata["has_auth"], serde_json::json!(true));
        }

        #[cfg(not(feature = "http"))]
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_config() {
        let config = TransportConfig::stdio("", &[] as &[String]);
        assert!(TransportFactory::create(config).is_err());
    }
}
