use serde::Serialize;

use crate::config::ServerConfig;
use crate::protocol::ToolResult;

use super::{to_json, SERVER_NAME};

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    server: &'static str,
    version: &'static str,
    databases: Vec<String>,
}

/// Liveness probe. Reports the configured database keys without connecting
/// to any of them.
pub async fn handle(config: &ServerConfig) -> ToolResult {
    match to_json(&HealthResponse {
        status: "ok",
        server: SERVER_NAME,
        version: env!("CARGO_PKG_VERSION"),
        databases: config.database_keys(),
    }) {
        Ok(json) => ToolResult::text(json),
        Err(e) => e.into(),
    }
}
