//! Authentication capability consumed by the HTTP transport.
//!
//! The transport owns no credential state. Before every POST it asks the
//! configured [`AuthProvider`] to refresh stale credentials and then to
//! decorate the outgoing header set. Refresh/signing logic lives entirely
//! in the provider.
//!
//! [`StaticAuth`] covers the fixed-credential schemes that can be expressed
//! in a configuration file ([`AuthConfig`]).

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};

use crate::error::{ConfigError, McpResult};
use crate::transport::config::AuthConfig;

/// Pluggable credential source for HTTP requests.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use mcp_core::auth::AuthProvider;
/// use mcp_core::McpResult;
/// use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
///
/// struct ApiKey(&'static str);
///
/// #[async_trait]
/// impl AuthProvider for ApiKey {
///     async fn refresh_if_needed(&self) -> McpResult<()> {
///         Ok(())
///     }
///
///     fn apply_auth(&self, mut headers: HeaderMap) -> HeaderMap {
///         headers.insert(AUTHORIZATION, HeaderValue::from_static(self.0));
///         headers
///     }
/// }
/// ```
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Suspend until the credentials are fresh.
    ///
    /// Called before every request, ahead of [`AuthProvider::apply_auth`].
    async fn refresh_if_needed(&self) -> McpResult<()>;

    /// Apply credentials to the outgoing headers.
    ///
    /// Must not block. May add new keys or overwrite existing ones
    /// (including `Content-Type` or caller-supplied extra headers).
    fn apply_auth(&self, headers: HeaderMap) -> HeaderMap;
}

/// Fixed credentials built from an [`AuthConfig`].
///
/// Refreshing is a no-op; the header value is computed once at construction.
#[derive(Debug, Clone)]
pub struct StaticAuth {
    name: HeaderName,
    value: HeaderValue,
}

impl StaticAuth {
    /// Build a provider from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the configured header name or
    /// value is not a valid HTTP header.
    pub fn from_config(config: &AuthConfig) -> McpResult<Self> {
        let (name, value) = match config {
            AuthConfig::Bearer { token } => (AUTHORIZATION, format!("Bearer {}", token)),
            AuthConfig::Basic { username, password } => {
                let credentials = STANDARD.encode(format!("{}:{}", username, password));
                (AUTHORIZATION, format!("Basic {}", credentials))
            }
            AuthConfig::Header { name, value } => {
                let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                    ConfigError::InvalidValue {
                        parameter: "auth.name".to_string(),
                        value: name.clone(),
                        reason: e.to_string(),
                    }
                })?;
                (name, value.clone())
            }
        };

        let mut value =
            HeaderValue::from_str(&value).map_err(|e| ConfigError::InvalidValue {
                parameter: "auth".to_string(),
                value: config.scheme().to_string(),
                reason: e.to_string(),
            })?;
        value.set_sensitive(true);

        Ok(Self { name, value })
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn refresh_if_needed(&self) -> McpResult<()> {
        Ok(())
    }

    fn apply_auth(&self, mut headers: HeaderMap) -> HeaderMap {
        headers.insert(self.name.clone(), self.value.clone());
        headers
    }
}
