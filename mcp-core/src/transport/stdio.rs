//! Stdio transport implementation for local process MCP communication.
//!
//! This transport spawns a local process and exchanges newline-delimited
//! JSON-RPC messages over its stdin/stdout. A background reader task routes
//! each response to the request waiting for its id; everything else goes to
//! an optional unsolicited-message handler or is dropped.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{discard_notification_failure, StdioConfig, Transport, TransportInfo, TransportStats};
use crate::error::{ConnectionError, McpError, McpResult, ProtocolError};
use crate::messages::{response_id, JsonRpcNotification, JsonRpcRequest, RequestIdCounter};

const TRANSPORT_TYPE: &str = "stdio";

/// Callback invoked by the reader task for every inbound message that does
/// not answer a pending request.
pub type UnsolicitedHandler = Arc<dyn Fn(Value) + Send + Sync>;

type PendingRequests = Arc<Mutex<HashMap<String, oneshot::Sender<Value>>>>;

/// Resources that only exist while connected.
struct StdioConnection {
    child: Child,
    stdin: Arc<Mutex<ChildStdin>>,
    stderr: Option<ChildStderr>,
    reader: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Stdio transport for local process MCP communication.
///
/// This transport implementation provides:
/// - Local process spawning with configurable command, arguments,
///   environment and working directory
/// - Request/response correlation by id, with any number of requests in
///   flight at once
/// - Line-atomic writes to the child's stdin
/// - Two-stage shutdown: SIGTERM, a grace period, then SIGKILL
/// - Automatic cleanup of the child process when dropped
pub struct StdioTransport {
    config: StdioConfig,
    ids: RequestIdCounter,
    pending: PendingRequests,
    connection: Mutex<Option<StdioConnection>>,
    unsolicited: Option<UnsolicitedHandler>,
    stats: Arc<TransportStats>,
}

impl StdioTransport {
    /// Create a new stdio transport instance.
    ///
    /// Nothing is spawned until [`Transport::connect`] is called.
    pub fn new(config: StdioConfig) -> Self {
        Self {
            config,
            ids: RequestIdCounter::new(),
            pending: Arc::new(Mutex::new(HashMap::new())),
            connection: Mutex::new(None),
            unsolicited: None,
            stats: Arc::new(TransportStats::default()),
        }
    }

    /// Install a handler for server-initiated messages (notifications,
    /// server requests, responses nobody is waiting for).
    ///
    /// The handler runs on the reader task and must not block. Without a
    /// handler such messages are logged and dropped.
    pub fn on_unsolicited(mut self, handler: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.unsolicited = Some(Arc::new(handler));
        self
    }

    /// The configuration this transport was built from.
    pub fn config(&self) -> &StdioConfig {
        &self.config
    }

    /// Take ownership of the child's stderr pipe.
    ///
    /// Returns `None` when not connected, when the pipe was already taken,
    /// or when `forward_stderr` routes it to the log instead.
    pub async fn take_stderr(&self) -> Option<ChildStderr> {
        self.connection
            .lock()
            .await
            .as_mut()
            .and_then(|connection| connection.stderr.take())
    }

    /// OS process id of the running child, if connected.
    pub async fn process_id(&self) -> Option<u32> {
        self.connection
            .lock()
            .await
            .as_ref()
            .and_then(|connection| connection.child.id())
    }

    /// Number of requests still waiting for a response.
    pub async fn pending_requests(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Send a notification and report delivery failures to the caller.
    ///
    /// [`Transport::send_notification`] is built on this and swallows the
    /// error.
    pub async fn try_send_notification(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        let stdin = self.stdin().await?;
        let line = JsonRpcNotification::new(method, params).to_line()?;
        write_line(&stdin, &line).await.map_err(send_failed)
    }

    /// Spawn the child process and start the reader task.
    fn spawn_process(&self) -> McpResult<StdioConnection> {
        debug!(
            "Spawning process: {} {:?}",
            self.config.command, self.config.args
        );

        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref working_dir) = self.config.working_dir {
            command.current_dir(working_dir);
        }

        // Layered over the inherited environment
        command.envs(&self.config.environment);

        let mut child = command.spawn().map_err(|e| ConnectionError::SpawnFailed {
            command: self.config.command.clone(),
            reason: e.to_string(),
        })?;

        let stdin = child.stdin.take().ok_or_else(|| stream_unavailable("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| stream_unavailable("stdout"))?;
        let mut stderr = child.stderr.take();

        if self.config.forward_stderr {
            if let Some(stderr) = stderr.take() {
                tokio::spawn(forward_stderr(stderr));
            }
        }

        let cancel = CancellationToken::new();
        let reader = tokio::spawn(read_loop(
            stdout,
            self.pending.clone(),
            self.unsolicited.clone(),
            self.stats.clone(),
            cancel.clone(),
        ));

        debug!("Spawned process with PID {:?}", child.id());

        Ok(StdioConnection {
            child,
            stdin: Arc::new(Mutex::new(stdin)),
            stderr,
            reader,
            cancel,
        })
    }

    /// The shared stdin writer, provided the child is still running.
    async fn stdin(&self) -> McpResult<Arc<Mutex<ChildStdin>>> {
        let mut connection = self.connection.lock().await;
        let connection = connection
            .as_mut()
            .ok_or_else(|| McpError::not_connected(TRANSPORT_TYPE))?;

        if let Ok(Some(status)) = connection.child.try_wait() {
            return Err(ConnectionError::ProcessExited {
                status: status.to_string(),
            }
            .into());
        }

        Ok(connection.stdin.clone())
    }

    /// Resolve every outstanding request as cancelled.
    async fn cancel_pending(&self) -> usize {
        let mut pending = self.pending.lock().await;
        let count = pending.len();
        // Dropping a sender wakes its waiter with a closed-channel error.
        pending.clear();
        count
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn connect(&self) -> McpResult<()> {
        let mut connection = self.connection.lock().await;
        if connection.is_some() {
            debug!("Stdio transport already connected");
            return Ok(());
        }

        info!("Connecting stdio transport");
        *connection = Some(self.spawn_process()?);
        self.stats.mark_connected();

        info!("Stdio transport connected successfully");
        Ok(())
    }

    async fn disconnect(&self) -> McpResult<()> {
        let mut guard = self.connection.lock().await;
        let Some(connection) = guard.take() else {
            debug!("Stdio transport not connected, nothing to disconnect");
            return Ok(());
        };

        info!("Disconnecting stdio transport");
        let StdioConnection {
            mut child,
            stdin,
            stderr,
            reader,
            cancel,
        } = connection;

        cancel.cancel();
        if let Err(e) = reader.await {
            warn!("Stdout reader task failed: {}", e);
        }
        drop(stdin);
        drop(stderr);

        let outcome = terminate(&mut child, self.config.shutdown_grace).await;

        let cancelled = self.cancel_pending().await;
        if cancelled > 0 {
            debug!("Cancelled {} pending request(s)", cancelled);
        }
        self.stats.mark_disconnected();

        info!("Stdio transport disconnected");
        outcome
    }

    fn is_connected(&self) -> bool {
        self.stats.is_connected()
    }

    async fn send_request(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        let stdin = self.stdin().await?;

        let id = self.ids.next_id();
        let line = JsonRpcRequest::new(id.clone(), method, params).to_line()?;

        let (response_sender, response_receiver) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), response_sender);

        debug!(id = %id, method, "Sending request");
        if let Err(e) = write_line(&stdin, &line).await {
            self.pending.lock().await.remove(&id);
            self.stats.error();
            return Err(send_failed(e));
        }
        self.stats.request_sent();

        match timeout(self.config.timeout, response_receiver).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                self.stats.error();
                Err(ConnectionError::Closed {
                    method: method.to_string(),
                }
                .into())
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                self.stats.error();
                warn!(id = %id, method, "Request timed out after {:?}", self.config.timeout);
                Err(McpError::timeout(method, self.config.timeout))
            }
        }
    }

    async fn send_notification(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        if !self.is_connected() {
            return Err(McpError::not_connected(TRANSPORT_TYPE));
        }

        let outcome = self.try_send_notification(method, params).await;
        if matches!(
            outcome,
            Err(McpError::Connection(ConnectionError::NotConnected { .. }))
        ) {
            return outcome;
        }

        discard_notification_failure(&self.stats, TRANSPORT_TYPE, method, outcome);
        Ok(())
    }

    fn get_info(&self) -> TransportInfo {
        let mut info = self.stats.snapshot(TRANSPORT_TYPE);

        info.add_metadata("command", serde_json::json!(self.config.command));
        info.add_metadata("args", serde_json::json!(self.config.args));
        info.add_metadata("working_dir", serde_json::json!(self.config.working_dir));
        info.add_metadata(
            "timeout_ms",
            serde_json::json!(self.config.timeout.as_millis() as u64),
        );
        info.add_metadata(
            "environment_vars",
            serde_json::json!(self.config.environment.len()),
        );
        info.add_metadata("request_ids_allocated", serde_json::json!(self.ids.allocated()));

        if let Ok(pending) = self.pending.try_lock() {
            info.add_metadata("pending_requests", serde_json::json!(pending.len()));
        }
        if let Ok(connection) = self.connection.try_lock() {
            if let Some(pid) = connection.as_ref().and_then(|c| c.child.id()) {
                info.add_metadata("process_id", serde_json::json!(pid));
            }
        }

        info
    }

    fn transport_type(&self) -> &'static str {
        TRANSPORT_TYPE
    }
}

/// Write one line to the child's stdin while holding the writer lock, so
/// concurrent senders never interleave.
async fn write_line(stdin: &Mutex<ChildStdin>, line: &str) -> std::io::Result<()> {
    let mut stdin = stdin.lock().await;
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await
}

fn send_failed(e: std::io::Error) -> McpError {
    ProtocolError::SendFailed {
        transport_type: TRANSPORT_TYPE.to_string(),
        reason: e.to_string(),
    }
    .into()
}

fn stream_unavailable(stream: &str) -> McpError {
    ConnectionError::StreamUnavailable {
        stream: stream.to_string(),
    }
    .into()
}

/// Read stdout line by line until EOF, a read error or cancellation.
async fn read_loop(
    stdout: ChildStdout,
    pending: PendingRequests,
    unsolicited: Option<UnsolicitedHandler>,
    stats: Arc<TransportStats>,
    cancel: CancellationToken,
) {
    let mut reader = BufReader::new(stdout);
    let mut line = Vec::new();

    loop {
        line.clear();
        let read = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Stdout reader cancelled");
                break;
            }
            read = reader.read_until(b'\n', &mut line) => read,
        };

        match read {
            Ok(0) => {
                debug!("Child process stdout closed (EOF)");
                break;
            }
            Ok(_) => dispatch_line(&line, &pending, unsolicited.as_ref(), &stats).await,
            Err(e) => {
                warn!("Error reading from stdout: {}", e);
                break;
            }
        }
    }

    debug!("Stdout reader task finished");
}

/// Route one inbound line to its waiting request, or to the unsolicited
/// handler.
async fn dispatch_line(
    line: &[u8],
    pending: &PendingRequests,
    unsolicited: Option<&UnsolicitedHandler>,
    stats: &TransportStats,
) {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text.trim(),
        Err(e) => {
            warn!("Discarding non UTF-8 line from stdout: {}", e);
            return;
        }
    };
    if text.is_empty() {
        return;
    }

    let message: Value = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Failed to parse JSON message from stdout: {} ({})", e, text);
            return;
        }
    };

    let waiter = match response_id(&message) {
        Some(id) => pending.lock().await.remove(id),
        None => None,
    };

    match waiter {
        Some(waiter) => {
            stats.response_received();
            if waiter.send(message).is_err() {
                debug!("Response arrived after its request gave up");
            }
        }
        None => {
            stats.notification_received();
            match unsolicited {
                Some(handler) => handler(message),
                None => debug!("Discarding unsolicited message: {}", text),
            }
        }
    }
}

async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if !line.trim().is_empty() => {
                debug!(target: "mcp_core::transport::stdio::stderr", "{}", line.trim_end());
            }
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(e) => {
                warn!("Error reading from stderr: {}", e);
                break;
            }
        }
    }
    debug!("Stderr forwarder finished");
}

/// Stop the child: SIGTERM, wait up to `grace`, then SIGKILL and reap.
async fn terminate(child: &mut Child, grace: Duration) -> McpResult<()> {
    debug!("Terminating child process (PID: {:?})", child.id());
    request_graceful_exit(child);

    match timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            debug!("Child process exited with status: {}", status);
            return Ok(());
        }
        Ok(Err(e)) => warn!("Error waiting for child process to exit: {}", e),
        Err(_) => warn!("Child process did not exit within {:?}, killing it", grace),
    }

    child
        .kill()
        .await
        .map_err(|e| ConnectionError::ShutdownFailed {
            reason: e.to_string(),
        })?;
    Ok(())
}

#[cfg(unix)]
fn request_graceful_exit(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    // SAFETY: `pid` belongs to a child we spawned and have not reaped yet.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        debug!(
            "SIGTERM to PID {} failed: {}",
            pid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn request_graceful_exit(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!("Failed to signal child process: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sh(script: &str) -> StdioConfig {
        StdioConfig::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn test_stdio_transport_creation() {
        let transport = StdioTransport::new(StdioConfig::new("echo").arg("hello"));

        assert_eq!(transport.get_info().transport_type, "stdio");
        assert_eq!(transport.transport_type(), "stdio");
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_transport_info_metadata() {
        let config = StdioConfig::new("python")
            .args(["-m", "server"])
            .env("TEST_VAR", "test_value");
        let transport = StdioTransport::new(config);

        let info = transport.get_info();
        assert!(info.metadata.contains_key("command"));
        assert!(info.metadata.contains_key("args"));
        assert!(info.metadata.contains_key("timeout_ms"));
        assert_eq!(
            info.metadata.get("environment_vars").unwrap(),
            &serde_json::json!(1)
        );
    }

    #[tokio::test]
    async fn test_process_spawn_failure() {
        let transport = StdioTransport::new(StdioConfig::new("nonexistent_command_12345"));

        let err = transport.connect().await.unwrap_err();
        assert!(err.is_connection());
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let transport = StdioTransport::new(StdioConfig::new("cat"));

        let err = transport.send_request("ping", None).await.unwrap_err();
        assert!(matches!(
            err,
            McpError::Connection(ConnectionError::NotConnected { .. })
        ));

        let err = transport.send_notification("ping", None).await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_disconnect_without_connect_is_noop() {
        let transport = StdioTransport::new(StdioConfig::new("cat"));
        transport.disconnect().await.unwrap();
        transport.disconnect().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_notifications_do_not_consume_ids() {
        // `cat` echoes the request back; its string id matches the pending entry.
        let transport = StdioTransport::new(StdioConfig::new("cat"));
        transport.connect().await.unwrap();

        transport.send_notification("first", None).await.unwrap();
        let response = transport
            .send_request("echo", Some(json!({"n": 1})))
            .await
            .unwrap();
        assert_eq!(response["id"], "1");
        assert_eq!(response["method"], "echo");

        transport.send_notification("second", None).await.unwrap();
        let response = transport.send_request("echo", None).await.unwrap();
        assert_eq!(response["id"], "2");

        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_removes_pending_entry() {
        let transport = StdioTransport::new(
            sh("while read line; do :; done").timeout(Duration::from_millis(100)),
        );
        transport.connect().await.unwrap();

        let err = transport.send_request("ping", None).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(transport.pending_requests().await, 0);

        transport.disconnect().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let transport = StdioTransport::new(sh(
            r#"echo 'not json'; echo '{"jsonrpc":"2.0","method":"hello"}'; read line; echo '{"jsonrpc":"2.0","id":"1","result":true}'; read line"#,
        ));
        transport.connect().await.unwrap();

        let response = transport.send_request("ping", None).await.unwrap();
        assert_eq!(response["result"], true);

        transport.disconnect().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exited_process_is_a_connection_error() {
        let transport = StdioTransport::new(StdioConfig::new("true"));
        transport.connect().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let err = transport.send_request("ping", None).await.unwrap_err();
        assert!(matches!(
            err,
            McpError::Connection(ConnectionError::ProcessExited { .. })
        ));
        // Notifications still report only "not connected" to the caller.
        transport.send_notification("ping", None).await.unwrap();

        transport.disconnect().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stderr_can_be_taken_once() {
        let transport = StdioTransport::new(sh("echo oops >&2; cat"));
        transport.connect().await.unwrap();

        let stderr = transport.take_stderr().await.unwrap();
        assert!(transport.take_stderr().await.is_none());

        let mut lines = BufReader::new(stderr).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("oops"));

        transport.disconnect().await.unwrap();
    }
}
