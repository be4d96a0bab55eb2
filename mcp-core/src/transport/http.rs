//! HTTP transport implementation for remote MCP servers.
//!
//! Each JSON-RPC envelope is POSTed to `<base_url>/` and the HTTP response
//! body is the JSON-RPC response, so correlation is implicit. Connections are
//! pooled by a shared `reqwest::Client`; an optional [`AuthProvider`]
//! decorates the headers of every request.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, info};

use super::{discard_notification_failure, HttpConfig, Transport, TransportInfo, TransportStats};
use crate::auth::{AuthProvider, StaticAuth};
use crate::error::{ConfigError, ConnectionError, McpError, McpResult, ProtocolError};
use crate::messages::{JsonRpcNotification, JsonRpcRequest, RequestIdCounter};

const TRANSPORT_TYPE: &str = "http";

/// The pooled client and its companions, alive between connect and
/// disconnect.
#[derive(Clone)]
struct Pool {
    client: Client,
    permits: Arc<Semaphore>,
    base_headers: HeaderMap,
}

/// HTTP transport for remote MCP servers.
///
/// Cloning is not needed for concurrency: every method takes `&self` and
/// requests share the underlying connection pool.
pub struct HttpTransport {
    config: HttpConfig,
    endpoint: String,
    auth: Option<Arc<dyn AuthProvider>>,
    ids: RequestIdCounter,
    pool: RwLock<Option<Pool>>,
    stats: TransportStats,
}

impl HttpTransport {
    /// Create a new HTTP transport without authentication.
    ///
    /// `config.auth` is ignored here; use [`HttpTransport::from_config`] to
    /// honour it.
    pub fn new(config: HttpConfig) -> Self {
        let endpoint = config.endpoint();
        Self {
            config,
            endpoint,
            auth: None,
            ids: RequestIdCounter::new(),
            pool: RwLock::new(None),
            stats: TransportStats::default(),
        }
    }

    /// Create a transport, turning `config.auth` into a [`StaticAuth`]
    /// provider when present.
    pub fn from_config(config: HttpConfig) -> McpResult<Self> {
        let auth = config.auth.as_ref().map(StaticAuth::from_config).transpose()?;
        let transport = Self::new(config);

        Ok(match auth {
            Some(auth) => transport.with_auth(Arc::new(auth)),
            None => transport,
        })
    }

    /// Attach an authentication provider, replacing any previous one.
    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// The configuration this transport was built from.
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// The URL every envelope is POSTed to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send a notification and report delivery failures to the caller.
    ///
    /// [`Transport::send_notification`] is built on this and swallows the
    /// error.
    pub async fn try_send_notification(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        let pool = self.pool().await?;
        let body = serde_json::to_vec(&JsonRpcNotification::new(method, params))?;

        self.within_timeout(method, async {
            let _permit = acquire(&pool).await?;
            let response = self.post(&pool, method, body).await?;
            check_status(response).await?;
            Ok::<(), McpError>(())
        })
        .await
    }

    fn build_pool(&self) -> McpResult<Pool> {
        let mut base_headers = HeaderMap::new();
        base_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (key, value) in &self.config.headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                ConfigError::InvalidValue {
                    parameter: "headers".to_string(),
                    value: key.clone(),
                    reason: e.to_string(),
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidValue {
                parameter: format!("headers.{}", key),
                value: value.clone(),
                reason: e.to_string(),
            })?;
            base_headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(self.config.timeout)
            .pool_max_idle_per_host(self.config.pool.max_keepalive_connections)
            .build()
            .map_err(|e| ConnectionError::ClientBuild {
                reason: e.to_string(),
            })?;

        Ok(Pool {
            client,
            permits: Arc::new(Semaphore::new(
                self.config.pool.max_connections.min(Semaphore::MAX_PERMITS),
            )),
            base_headers,
        })
    }

    async fn pool(&self) -> McpResult<Pool> {
        self.pool
            .read()
            .await
            .clone()
            .ok_or_else(|| McpError::not_connected(TRANSPORT_TYPE))
    }

    /// Base headers plus whatever the auth provider adds.
    async fn request_headers(&self, pool: &Pool) -> McpResult<HeaderMap> {
        let headers = pool.base_headers.clone();
        match self.auth {
            Some(ref auth) => {
                auth.refresh_if_needed().await?;
                Ok(auth.apply_auth(headers))
            }
            None => Ok(headers),
        }
    }

    async fn post(&self, pool: &Pool, method: &str, body: Vec<u8>) -> McpResult<reqwest::Response> {
        let headers = self.request_headers(pool).await?;

        debug!(endpoint = %self.endpoint, method, "Posting JSON-RPC message");
        pool.client
            .post(&self.endpoint)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(method, e))
    }

    fn map_send_error(&self, method: &str, e: reqwest::Error) -> McpError {
        if e.is_timeout() {
            McpError::timeout(method, self.config.timeout)
        } else if e.is_connect() {
            ConnectionError::Unreachable {
                url: self.endpoint.clone(),
                reason: e.to_string(),
            }
            .into()
        } else {
            ProtocolError::SendFailed {
                transport_type: TRANSPORT_TYPE.to_string(),
                reason: e.to_string(),
            }
            .into()
        }
    }

    /// Bound a whole exchange, including the wait for a pool slot, by the
    /// configured timeout.
    async fn within_timeout<T>(
        &self,
        method: &str,
        exchange: impl Future<Output = McpResult<T>>,
    ) -> McpResult<T> {
        tokio::time::timeout(self.config.timeout, exchange)
            .await
            .map_err(|_| McpError::timeout(method, self.config.timeout))?
    }

    async fn exchange(&self, pool: &Pool, method: &str, body: Vec<u8>) -> McpResult<Value> {
        self.within_timeout(method, self.round_trip(pool, method, body))
            .await
    }

    async fn round_trip(&self, pool: &Pool, method: &str, body: Vec<u8>) -> McpResult<Value> {
        let _permit = acquire(pool).await?;
        let response = self.post(pool, method, body).await?;
        let response = check_status(response).await?;

        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                McpError::timeout(method, self.config.timeout)
            } else {
                ProtocolError::InvalidResponse {
                    reason: format!("Failed to read response body: {}", e),
                }
                .into()
            }
        })?;

        serde_json::from_str(&text).map_err(|e| {
            ProtocolError::InvalidResponse {
                reason: format!("Response is not JSON: {} ({})", e, text),
            }
            .into()
        })
    }
}

/// Wait for a free slot under `max_connections`.
async fn acquire(pool: &Pool) -> McpResult<tokio::sync::SemaphorePermit<'_>> {
    pool.permits
        .acquire()
        .await
        .map_err(|_| McpError::not_connected(TRANSPORT_TYPE))
}

/// Map any non-2xx status to a protocol error carrying the body.
async fn check_status(response: reqwest::Response) -> McpResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ProtocolError::HttpStatus {
        status_code: status.as_u16(),
        body,
    }
    .into())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self) -> McpResult<()> {
        let mut pool = self.pool.write().await;
        if pool.is_some() {
            debug!("HTTP transport already connected");
            return Ok(());
        }

        info!("Connecting HTTP transport to {}", self.endpoint);
        *pool = Some(self.build_pool()?);
        self.stats.mark_connected();

        info!("HTTP transport connected successfully");
        Ok(())
    }

    async fn disconnect(&self) -> McpResult<()> {
        let Some(pool) = self.pool.write().await.take() else {
            debug!("HTTP transport not connected, nothing to disconnect");
            return Ok(());
        };

        info!("Disconnecting HTTP transport");
        // Requests queued for a slot fail instead of waiting on a dead pool.
        pool.permits.close();
        drop(pool);
        self.stats.mark_disconnected();

        info!("HTTP transport disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stats.is_connected()
    }

    async fn send_request(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        let pool = self.pool().await?;

        let id = self.ids.next_id();
        let body = serde_json::to_vec(&JsonRpcRequest::new(id, method, params))?;

        self.stats.request_sent();
        match self.exchange(&pool, method, body).await {
            Ok(response) => {
                self.stats.response_received();
                Ok(response)
            }
            Err(e) => {
                self.stats.error();
                debug!(method, error = %e, "HTTP request failed");
                Err(e)
            }
        }
    }

    async fn send_notification(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        if !self.is_connected() {
            return Err(McpError::not_connected(TRANSPORT_TYPE));
        }

        let outcome = self.try_send_notification(method, params).await;
        discard_notification_failure(&self.stats, TRANSPORT_TYPE, method, outcome);
        Ok(())
    }

    fn get_info(&self) -> TransportInfo {
        let mut info = self.stats.snapshot(TRANSPORT_TYPE);

        info.add_metadata("base_url", serde_json::json!(self.config.base_url.as_str()));
        info.add_metadata("endpoint", serde_json::json!(self.endpoint));
        info.add_metadata(
            "timeout_ms",
            serde_json::json!(self.config.timeout.as_millis() as u64),
        );
        info.add_metadata(
            "max_connections",
            serde_json::json!(self.config.pool.max_connections),
        );
        info.add_metadata(
            "max_keepalive_connections",
            serde_json::json!(self.config.pool.max_keepalive_connections),
        );
        info.add_metadata("header_count", serde_json::json!(self.config.headers.len()));
        info.add_metadata("has_auth", serde_json::json!(self.auth.is_some()));

        info
    }

    fn transport_type(&self) -> &'static str {
        TRANSPORT_TYPE
    }
}
