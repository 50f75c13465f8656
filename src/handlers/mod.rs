pub mod assignments;
pub mod health;
pub mod query;
pub mod reports;
pub mod roles;
pub mod tables;

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

use crate::catalog;
use crate::config::ServerConfig;
use crate::protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpErrorCode, McpErrorResponse, ToolCallParams,
    ToolResult,
};
use crate::schema;

/// Name advertised in the `initialize` handshake.
pub const SERVER_NAME: &str = "ecosystem-report-generator";

/// Dispatch a JSON-RPC request to the appropriate handler.
///
/// Returns `None` for notifications (no response required).
pub async fn dispatch(req: &JsonRpcRequest, config: &ServerConfig) -> Option<JsonRpcResponse> {
    match req.method.as_str() {
        "initialize" => {
            let result = serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION")
                }
            });
            Some(JsonRpcResponse::success(req.id.clone(), result))
        }

        "notifications/initialized" => None,

        "ping" => Some(JsonRpcResponse::success(
            req.id.clone(),
            serde_json::json!({}),
        )),

        "tools/list" => {
            let result = serde_json::json!({ "tools": catalog::tools() });
            Some(JsonRpcResponse::success(req.id.clone(), result))
        }

        "tools/call" => {
            let params: ToolCallParams = match &req.params {
                Some(v) => match serde_json::from_value(v.clone()) {
                    Ok(p) => p,
                    Err(e) => {
                        return Some(JsonRpcResponse::error(
                            req.id.clone(),
                            JsonRpcError::invalid_params(format!("Invalid tools/call params: {e}")),
                        ));
                    }
                },
                None => {
                    return Some(JsonRpcResponse::error(
                        req.id.clone(),
                        JsonRpcError::invalid_params("Missing params for tools/call"),
                    ));
                }
            };

            let tool_result = dispatch_tool_call(&params, config).await;
            let result_json = serde_json::to_value(&tool_result)
                .expect("ToolResult must serialize to JSON Value");
            Some(JsonRpcResponse::success(req.id.clone(), result_json))
        }

        _ => Some(JsonRpcResponse::error(
            req.id.clone(),
            JsonRpcError::method_not_found(&req.method),
        )),
    }
}

async fn dispatch_tool_call(params: &ToolCallParams, config: &ServerConfig) -> ToolResult {
    // Advertised tools carry a JSON Schema; reject bad shapes before touching
    // the typed deserializers so agents get schema-level diagnostics.
    if let Some(spec) = catalog::find(&params.name) {
        let args = params
            .arguments
            .clone()
            .unwrap_or_else(|| serde_json::json!({}));
        if let Err(e) = schema::validate(&spec.input_schema, &args) {
            return ToolResult::error(format!("Invalid arguments for {}: {e}", params.name));
        }
    }

    match params.name.as_str() {
        "get_table_structure" => match parse_args(params) {
            Ok(p) => tables::get_table_structure(p, config).await,
            Err(e) => e,
        },
        "list_tables" => match parse_args(params) {
            Ok(p) => tables::list_tables(p, config).await,
            Err(e) => e,
        },
        "test_query" => match parse_args(params) {
            Ok(p) => query::test_query(p, config).await,
            Err(e) => e,
        },
        "create_report" => match parse_args(params) {
            Ok(p) => reports::create_report(p, config).await,
            Err(e) => e,
        },
        "assign_report_to_role" => match parse_args(params) {
            Ok(p) => assignments::assign_report_to_role(p, config).await,
            Err(e) => e,
        },
        "get_table_structures_across_databases" => match parse_args(params) {
            Ok(p) => tables::get_table_structures_across_databases(p, config).await,
            Err(e) => e,
        },
        "get_multiple_table_structures" => match parse_args(params) {
            Ok(p) => tables::get_multiple_table_structures(p, config).await,
            Err(e) => e,
        },
        "bulk_search_tables_in_databases" => match parse_args(params) {
            Ok(p) => tables::bulk_search_tables_in_databases(p, config).await,
            Err(e) => e,
        },
        "bulk_create_reports" => match parse_args(params) {
            Ok(p) => reports::bulk_create_reports(p, config).await,
            Err(e) => e,
        },
        "bulk_assign_reports_to_roles" => match parse_args(params) {
            Ok(p) => assignments::bulk_assign_reports_to_roles(p, config).await,
            Err(e) => e,
        },
        "bulk_get_report_assignments" => match parse_args(params) {
            Ok(p) => assignments::bulk_get_report_assignments(p, config).await,
            Err(e) => e,
        },
        "bulk_update_report_assignments" => match parse_args(params) {
            Ok(p) => assignments::bulk_update_report_assignments(p, config).await,
            Err(e) => e,
        },
        "update_report_assignment" => match parse_args(params) {
            Ok(p) => assignments::update_report_assignment(p, config).await,
            Err(e) => e,
        },
        "list_available_roles" => match parse_args(params) {
            Ok(p) => roles::list_available_roles(p, config).await,
            Err(e) => e,
        },
        "get_report_assignments" => match parse_args(params) {
            Ok(p) => assignments::get_report_assignments(p, config).await,
            Err(e) => e,
        },
        "search_table_in_all_databases" => match parse_args(params) {
            Ok(p) => tables::search_table_in_all_databases(p, config).await,
            Err(e) => e,
        },

        "health" => health::handle(config).await,

        _ => ToolResult::error(format!("Unknown tool: {}", params.name)),
    }
}

fn parse_args<T: DeserializeOwned>(params: &ToolCallParams) -> Result<T, ToolResult> {
    let value = params
        .arguments
        .clone()
        .unwrap_or(serde_json::Value::Object(Default::default()));
    serde_json::from_value(value).map_err(|e| {
        ToolResult::error(format!("Invalid arguments for {}: {e}", params.name))
    })
}

/// Run a database-touching tool body under the configured timeout.
pub(crate) async fn with_timeout<F>(config: &ServerConfig, fut: F) -> ToolResult
where
    F: Future<Output = Result<String, McpErrorResponse>>,
{
    match tokio::time::timeout(config.tool_timeout, fut).await {
        Ok(Ok(json)) => ToolResult::text(json),
        Ok(Err(err)) => err.into(),
        Err(_) => {
            warn!(
                timeout_secs = config.tool_timeout.as_secs(),
                "tool call timed out"
            );
            McpErrorResponse::canonical(McpErrorCode::Timeout).into()
        }
    }
}

pub(crate) fn to_json<T: Serialize>(payload: &T) -> Result<String, McpErrorResponse> {
    serde_json::to_string(payload).map_err(|e| {
        error!("serialization failed: {e}");
        McpErrorResponse::canonical(McpErrorCode::InternalError)
    })
}

pub(crate) fn unknown_database(key: &str) -> McpErrorResponse {
    McpErrorResponse::new(
        McpErrorCode::DatabaseUnknown,
        format!("Database '{key}' is not configured"),
    )
}
