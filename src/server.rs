//! Newline-delimited JSON-RPC 2.0 transports.
//!
//! The same session loop serves both stdio (the default MCP transport) and a
//! TCP listener for containerized deployments. Each TCP connection gets its
//! own session with its own initialization gate.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::handlers;
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

/// Maximum bytes per JSON-RPC message (1 MiB).
const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// MCP server for the report tools.
pub struct McpServer {
    config: Arc<ServerConfig>,
}

impl McpServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Serve a single session over stdio. Returns when stdin closes.
    pub async fn run_stdio(&self) -> Result<(), Box<dyn std::error::Error>> {
        let reader = BufReader::new(tokio::io::stdin());
        let writer = tokio::io::stdout();
        serve_session(reader, writer, self.config.clone()).await?;
        Ok(())
    }

    /// Accept TCP connections and serve each as an independent session.
    pub async fn run_tcp(&self, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "listening");

        loop {
            let (stream, peer) = listener.accept().await?;
            info!(%peer, "connection accepted");
            let config = self.config.clone();
            tokio::spawn(async move {
                let (read_half, write_half) = stream.into_split();
                let reader = BufReader::new(read_half);
                if let Err(e) = serve_session(reader, write_half, config).await {
                    warn!(%peer, "session error: {e}");
                }
                info!(%peer, "connection closed");
            });
        }
    }
}

/// One JSON-RPC session: read newline-delimited requests until EOF, write
/// one response line per request. Only `initialize` is accepted before the
/// handshake completes.
async fn serve_session<R, W>(
    reader: R,
    mut writer: W,
    config: Arc<ServerConfig>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut initialized = false;
    let mut raw = Vec::new();
    // Bound each read so a newline-free stream cannot grow the buffer past
    // the message cap. One extra byte distinguishes "exactly at the cap"
    // from "over it".
    let read_limit = MAX_MESSAGE_BYTES as u64 + 1;
    let mut reader = reader.take(read_limit);

    loop {
        raw.clear();
        reader.set_limit(read_limit);
        let n = reader.read_until(b'\n', &mut raw).await?;
        if n == 0 {
            break;
        }

        if n > MAX_MESSAGE_BYTES {
            warn!("message too large: over {MAX_MESSAGE_BYTES} bytes");
            write_response(
                &mut writer,
                &JsonRpcResponse::error(None, JsonRpcError::parse_error()),
            )
            .await?;
            // Discard the rest of the oversized line so the next message
            // starts clean.
            while !raw.ends_with(b"\n") {
                raw.clear();
                reader.set_limit(read_limit);
                if reader.read_until(b'\n', &mut raw).await? == 0 {
                    return Ok(());
                }
            }
            continue;
        }

        let trimmed = match std::str::from_utf8(&raw) {
            Ok(s) => s.trim(),
            Err(_) => {
                write_response(
                    &mut writer,
                    &JsonRpcResponse::error(None, JsonRpcError::parse_error()),
                )
                .await?;
                continue;
            }
        };

        if trimmed.is_empty() {
            continue;
        }

        let req: JsonRpcRequest = match serde_json::from_str(trimmed) {
            Ok(r) => r,
            Err(e) => {
                warn!("parse error: {e}");
                write_response(
                    &mut writer,
                    &JsonRpcResponse::error(None, JsonRpcError::parse_error()),
                )
                .await?;
                continue;
            }
        };

        if req.jsonrpc != "2.0" {
            write_response(
                &mut writer,
                &JsonRpcResponse::error(req.id.clone(), JsonRpcError::invalid_request()),
            )
            .await?;
            continue;
        }

        // Initialization gate: only `initialize` is allowed before the
        // handshake completes. Pre-init notifications are dropped silently.
        if !initialized && req.method != "initialize" {
            if req.id.is_none() {
                continue;
            }
            write_response(
                &mut writer,
                &JsonRpcResponse::error(
                    req.id.clone(),
                    JsonRpcError::invalid_request_with("Server not initialized"),
                ),
            )
            .await?;
            continue;
        }

        if let Some(resp) = handlers::dispatch(&req, &config).await {
            write_response(&mut writer, &resp).await?;
        }

        if req.method == "initialize" {
            initialized = true;
        }
    }

    Ok(())
}

async fn write_response<W>(writer: &mut W, resp: &JsonRpcResponse) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let out = serde_json::to_string(resp).map_err(std::io::Error::other)?;
    writer.write_all(out.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use serde_json::Value;

    use super::*;
    use crate::config::DatabaseProfile;

    fn test_config() -> Arc<ServerConfig> {
        let mut databases = BTreeMap::new();
        databases.insert(
            "default".to_string(),
            DatabaseProfile {
                host: "127.0.0.1".to_string(),
                port: 1,
                database: "ECOSYSTEM_DEV".to_string(),
                username: "sa".to_string(),
                password: "secret".to_string(),
            },
        );
        Arc::new(ServerConfig {
            databases,
            tool_timeout: Duration::from_secs(5),
        })
    }

    /// Run one in-memory session and return the parsed response lines.
    async fn run_session(input: &[u8]) -> Vec<Value> {
        let mut out = Vec::new();
        serve_session(BufReader::new(input), &mut out, test_config())
            .await
            .unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    const INITIALIZE: &str =
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#;

    #[tokio::test]
    async fn requests_before_initialize_are_rejected() {
        let input = br#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}
"#;
        let responses = run_session(input).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], -32600);
        assert_eq!(responses[0]["error"]["message"], "Server not initialized");
        assert_eq!(responses[0]["id"], 7);
    }

    #[tokio::test]
    async fn notifications_before_initialize_are_dropped() {
        let input = br#"{"jsonrpc":"2.0","method":"notifications/initialized"}
"#;
        assert!(run_session(input).await.is_empty());
    }

    #[tokio::test]
    async fn malformed_json_gets_parse_error() {
        let responses = run_session(b"this is not json\n").await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn invalid_utf8_gets_parse_error() {
        let responses = run_session(b"\xff\xfe\n").await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn wrong_jsonrpc_version_is_invalid_request() {
        let input = br#"{"jsonrpc":"1.0","id":1,"method":"initialize"}
"#;
        let responses = run_session(input).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn oversized_message_is_rejected_and_session_continues() {
        let mut input = vec![b'a'; MAX_MESSAGE_BYTES + 64];
        input.push(b'\n');
        input.extend_from_slice(INITIALIZE.as_bytes());
        input.push(b'\n');

        let responses = run_session(&input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["error"]["code"], -32700);
        // The rest of the oversized line was discarded; the next message
        // parses normally.
        assert_eq!(
            responses[1]["result"]["serverInfo"]["name"],
            "ecosystem-report-generator"
        );
    }

    #[tokio::test]
    async fn oversized_message_without_newline_does_not_hang() {
        let input = vec![b'a'; MAX_MESSAGE_BYTES + 64];
        let responses = run_session(&input).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn initialize_opens_the_gate() {
        let mut input = Vec::new();
        input.extend_from_slice(INITIALIZE.as_bytes());
        input.push(b'\n');
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#);
        input.push(b'\n');

        let responses = run_session(&input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(responses[1]["id"], 2);
        assert!(responses[1]["result"]["tools"].is_array());
    }

    #[tokio::test]
    async fn blank_lines_are_ignored() {
        let mut input = b"\n   \n".to_vec();
        input.extend_from_slice(INITIALIZE.as_bytes());
        input.push(b'\n');

        let responses = run_session(&input).await;
        assert_eq!(responses.len(), 1);
        assert!(responses[0]["result"].is_object());
    }
}
