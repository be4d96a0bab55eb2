//! Scriptable MCP server used by the integration tests.
//!
//! Speaks newline-delimited JSON-RPC over stdin/stdout. Requests are
//! answered on worker threads so responses can arrive out of order.
//!
//! # Handled Methods
//!
//! - `ping` -- responds with `"ok"`
//! - `echo` -- responds with `{"method": .., "params": ..}`
//! - `sleep` -- waits `params.ms` milliseconds, then responds like `echo`
//! - `silent` -- never responds
//! - `noisy` -- writes a malformed line, a server notification and a
//!   response with an unknown id before the real response
//! - `env` -- responds with the value of the variable named `params.name`
//! - `cwd` -- responds with the current working directory
//! - `notifications_seen` -- responds with the number of notifications
//!   received so far
//! - anything else -- JSON-RPC `-32601 Method not found`
//!
//! # Flags
//!
//! - `--ignore-sigterm` -- ignore SIGTERM and keep running after stdin
//!   closes, so only SIGKILL stops the process
//! - `--stderr <line>` -- write `<line>` to stderr on startup

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};

fn main() {
    let mut ignore_sigterm = false;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--ignore-sigterm" => ignore_sigterm = true,
            "--stderr" => {
                if let Some(line) = args.next() {
                    eprintln!("{}", line);
                }
            }
            other => eprintln!("mcp_test_server: unknown flag {}", other),
        }
    }

    if ignore_sigterm {
        ignore_termination();
    }

    let out = Arc::new(Mutex::new(io::stdout()));
    let notifications = Arc::new(AtomicU64::new(0));

    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let message: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(_) => {
                write_message(&out, &make_error(&Value::Null, -32700, "Parse error"));
                continue;
            }
        };

        let Some(id) = message.get("id").cloned() else {
            notifications.fetch_add(1, Ordering::SeqCst);
            continue;
        };

        let out = Arc::clone(&out);
        let notifications = Arc::clone(&notifications);
        thread::spawn(move || handle_request(&out, &id, &message, &notifications));
    }

    if ignore_sigterm {
        loop {
            thread::sleep(Duration::from_secs(60));
        }
    }
}

fn handle_request(out: &Mutex<io::Stdout>, id: &Value, request: &Value, notifications: &AtomicU64) {
    let method = request.get("method").and_then(Value::as_str).unwrap_or("");
    let params = request.get("params").cloned().unwrap_or(Value::Null);

    let result = match method {
        "ping" => json!("ok"),
        "echo" => json!({"method": method, "params": params}),
        "sleep" => {
            let ms = params.get("ms").and_then(Value::as_u64).unwrap_or(0);
            thread::sleep(Duration::from_millis(ms));
            json!({"method": method, "params": params})
        }
        "silent" => return,
        "noisy" => {
            write_line(out, "this is not json");
            write_message(
                out,
                &json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {"level": "info"}}),
            );
            write_message(out, &json!({"jsonrpc": "2.0", "id": "no-such-request", "result": {}}));
            json!({"method": method})
        }
        "env" => {
            let name = params.get("name").and_then(Value::as_str).unwrap_or("");
            json!(std::env::var(name).ok())
        }
        "cwd" => json!(std::env::current_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default()),
        "notifications_seen" => json!(notifications.load(Ordering::SeqCst)),
        _ => {
            write_message(
                out,
                &make_error(id, -32601, &format!("Method not found: {}", method)),
            );
            return;
        }
    };

    write_message(out, &json!({"jsonrpc": "2.0", "id": id, "result": result}));
}

fn make_error(id: &Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message}
    })
}

fn write_message(out: &Mutex<io::Stdout>, message: &Value) {
    write_line(out, &message.to_string());
}

fn write_line(out: &Mutex<io::Stdout>, line: &str) {
    let mut out = out.lock().unwrap();
    let _ = writeln!(out, "{}", line);
    let _ = out.flush();
}

#[cfg(unix)]
fn ignore_termination() {
    // SAFETY: installing SIG_IGN for SIGTERM has no preconditions.
    unsafe {
        libc::signal(libc::SIGTERM, libc::SIG_IGN);
    }
}

#[cfg(not(unix))]
fn ignore_termination() {}
