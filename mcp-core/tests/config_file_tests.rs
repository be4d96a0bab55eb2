//! Loading and saving transport configuration files.

use std::time::Duration;

use mcp_core::error::{ConfigError, McpError};
use mcp_core::transport::{AuthConfig, HttpConfig, StdioConfig, TransportConfig};

#[test]
fn test_yaml_stdio_config_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.yaml");
    std::fs::write(
        &path,
        r#"
type: stdio
command: python
args: ["-m", "my_server"]
environment:
  LOG_LEVEL: debug
timeout: 10s
"#,
    )
    .unwrap();

    let config = TransportConfig::from_file(&path).unwrap();
    let TransportConfig::Stdio(stdio) = config else {
        panic!("expected stdio config");
    };
    assert_eq!(stdio.command, "python");
    assert_eq!(stdio.args, vec!["-m", "my_server"]);
    assert_eq!(stdio.timeout, Duration::from_secs(10));
    assert_eq!(stdio.shutdown_grace, Duration::from_secs(5));
    assert_eq!(stdio.environment.get("LOG_LEVEL").unwrap(), "debug");
}

#[test]
fn test_toml_http_config_with_auth() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.toml");
    std::fs::write(
        &path,
        r#"
type = "http"
base_url = "https://mcp.example.com/rpc"
timeout = "1m"

[headers]
X-Client = "mcp-probe"

[pool]
max_connections = 8

[auth]
type = "basic"
username = "user"
password = "pass"
"#,
    )
    .unwrap();

    let config = TransportConfig::from_file(&path).unwrap();
    let TransportConfig::Http(http) = config else {
        panic!("expected http config");
    };
    assert_eq!(http.endpoint(), "https://mcp.example.com/rpc/");
    assert_eq!(http.timeout, Duration::from_secs(60));
    assert_eq!(http.pool.max_connections, 8);
    assert_eq!(http.pool.max_keepalive_connections, 20);
    assert_eq!(http.auth, Some(AuthConfig::basic("user", "pass")));
}

#[test]
fn test_saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let original = TransportConfig::Http(
        HttpConfig::new("http://localhost:3000".parse().unwrap())
            .timeout(Duration::from_millis(1500))
            .header("X-Trace", "1")
            .auth(AuthConfig::header("X-Api-Key", "k")),
    );

    for name in ["config.json", "config.yml"] {
        let path = dir.path().join(name);
        original.to_file(&path).unwrap();
        assert_eq!(TransportConfig::from_file(&path).unwrap(), original);
    }
}

#[test]
fn test_invalid_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();

    let missing = TransportConfig::from_file(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(
        missing,
        McpError::Config(ConfigError::FileNotFound { .. })
    ));

    let path = dir.path().join("broken.json");
    std::fs::write(&path, r#"{"type": "carrier-pigeon"}"#).unwrap();
    let broken = TransportConfig::from_file(&path).unwrap_err();
    assert!(matches!(
        broken,
        McpError::Config(ConfigError::InvalidFormat { .. })
    ));

    let path = dir.path().join("empty-command.json");
    std::fs::write(&path, r#"{"type": "stdio", "command": ""}"#).unwrap();
    let invalid = TransportConfig::from_file(&path).unwrap_err();
    assert!(matches!(
        invalid,
        McpError::Config(ConfigError::MissingParameter { .. })
    ));
}

#[test]
fn test_stdio_builder_matches_file_form() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stdio.json");
    std::fs::write(
        &path,
        r#"{"type": "stdio", "command": "node", "args": ["server.js"], "shutdown_grace": "2s", "forward_stderr": true}"#,
    )
    .unwrap();

    let expected = TransportConfig::Stdio(
        StdioConfig::new("node")
            .arg("server.js")
            .shutdown_grace(Duration::from_secs(2))
            .forward_stderr(true),
    );
    assert_eq!(TransportConfig::from_file(&path).unwrap(), expected);
}
