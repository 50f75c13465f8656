//! End-to-end dispatch tests that never reach a real database. Argument and
//! domain validation must reject bad calls before any connection is opened,
//! so these run against profiles pointing at an unroutable port.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{json, Value};

use mcp_report_server::config::{DatabaseProfile, ServerConfig};
use mcp_report_server::handlers;
use mcp_report_server::protocol::{JsonRpcRequest, RpcId};

fn test_config() -> ServerConfig {
    let profile = |database: &str| DatabaseProfile {
        host: "127.0.0.1".to_string(),
        port: 1,
        database: database.to_string(),
        username: "sa".to_string(),
        password: "secret".to_string(),
    };

    let mut databases = BTreeMap::new();
    databases.insert("default".to_string(), profile("ECOSYSTEM_DEV"));
    databases.insert(
        "INTEGRACION_CW_20_DEV".to_string(),
        profile("INTEGRACION_CW_20_DEV"),
    );

    ServerConfig {
        databases,
        tool_timeout: Duration::from_secs(5),
    }
}

fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(RpcId::Number(1)),
        method: method.to_string(),
        params,
    }
}

async fn call_tool(name: &str, arguments: Value) -> Value {
    let req = request(
        "tools/call",
        Some(json!({ "name": name, "arguments": arguments })),
    );
    let resp = handlers::dispatch(&req, &test_config())
        .await
        .expect("tools/call must produce a response");
    assert!(resp.error.is_none(), "tools/call must not fail at the RPC layer");
    resp.result.expect("tools/call must carry a result")
}

fn tool_text(result: &Value) -> Value {
    let text = result["content"][0]["text"]
        .as_str()
        .expect("tool result must carry a text block");
    serde_json::from_str(text).expect("tool text must be JSON")
}

fn is_error(result: &Value) -> bool {
    result["isError"].as_bool().unwrap_or(false)
}

#[tokio::test]
async fn initialize_reports_server_info() {
    let req = request("initialize", Some(json!({ "protocolVersion": "2024-11-05" })));
    let resp = handlers::dispatch(&req, &test_config()).await.unwrap();
    let result = resp.result.unwrap();

    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], "ecosystem-report-generator");
    assert!(result["serverInfo"]["version"].is_string());
}

#[tokio::test]
async fn initialized_notification_produces_no_response() {
    let mut req = request("notifications/initialized", None);
    req.id = None;
    assert!(handlers::dispatch(&req, &test_config()).await.is_none());
}

#[tokio::test]
async fn ping_returns_empty_object() {
    let resp = handlers::dispatch(&request("ping", None), &test_config())
        .await
        .unwrap();
    assert_eq!(resp.result.unwrap(), json!({}));
}

#[tokio::test]
async fn tools_list_advertises_the_full_catalog() {
    let resp = handlers::dispatch(&request("tools/list", None), &test_config())
        .await
        .unwrap();
    let result = resp.result.unwrap();
    let tools = result["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 16);

    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    for expected in [
        "get_table_structure",
        "list_tables",
        "test_query",
        "create_report",
        "assign_report_to_role",
        "bulk_create_reports",
        "bulk_update_report_assignments",
        "search_table_in_all_databases",
    ] {
        assert!(names.contains(&expected), "missing tool {expected}");
    }
    for tool in tools {
        assert!(tool["inputSchema"]["type"] == "object");
        assert!(tool["description"].as_str().is_some_and(|d| !d.is_empty()));
    }
}

#[tokio::test]
async fn unknown_method_is_method_not_found() {
    let resp = handlers::dispatch(&request("tools/destroy", None), &test_config())
        .await
        .unwrap();
    assert_eq!(resp.error.unwrap().code, -32601);
}

#[tokio::test]
async fn unknown_tool_is_a_tool_error() {
    let result = call_tool("drop_database", json!({})).await;
    assert!(is_error(&result));
    assert!(result["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("Unknown tool"));
}

#[tokio::test]
async fn missing_required_argument_fails_schema_validation() {
    let result = call_tool("get_table_structure", json!({})).await;
    assert!(is_error(&result));
    assert!(result["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("Invalid arguments for get_table_structure"));
}

#[tokio::test]
async fn wrongly_typed_argument_fails_schema_validation() {
    let result = call_tool("get_table_structure", json!({ "table_name": 42 })).await;
    assert!(is_error(&result));
}

#[tokio::test]
async fn unknown_database_key_is_rejected_before_connecting() {
    let result = call_tool(
        "get_table_structure",
        json!({ "table_name": "orders", "database_key": "prod" }),
    )
    .await;
    assert!(is_error(&result));
    let body = tool_text(&result);
    assert_eq!(body["error"]["code"], "database_unknown");
}

#[tokio::test]
async fn test_query_requires_business_unit_placeholder() {
    let result = call_tool(
        "test_query",
        json!({ "query": "SELECT 1", "business_unit": "unit-01" }),
    )
    .await;
    assert!(is_error(&result));
    let body = tool_text(&result);
    assert_eq!(body["error"]["code"], "invalid_query");
    assert_eq!(body["error"]["message"], "Query must reference @business_unit");
}

#[tokio::test]
async fn create_report_requires_business_unit_placeholder() {
    let result = call_tool(
        "create_report",
        json!({
            "report_prefix": "rpt_sales",
            "report_description_en": "Sales",
            "report_description_es": "Ventas",
            "query": "SELECT * FROM sales"
        }),
    )
    .await;
    assert!(is_error(&result));
    assert_eq!(tool_text(&result)["error"]["code"], "invalid_query");
}

#[tokio::test]
async fn bulk_create_rejects_empty_batch() {
    let result = call_tool("bulk_create_reports", json!({ "reports_data": [] })).await;
    assert!(is_error(&result));
    assert_eq!(tool_text(&result)["error"]["code"], "invalid_arguments");
}

#[tokio::test]
async fn bulk_create_reports_each_invalid_item_without_connecting() {
    let result = call_tool(
        "bulk_create_reports",
        json!({
            "reports_data": [
                { "report_prefix": "rpt_a" },
                {
                    "report_prefix": "rpt_b",
                    "report_description_en": "B",
                    "report_description_es": "B",
                    "query": "SELECT 1"
                }
            ]
        }),
    )
    .await;
    // All items are invalid, so the batch completes without touching the
    // database and reports every failure individually.
    assert!(!is_error(&result));
    let body = tool_text(&result);
    assert_eq!(body["created"], 0);
    let failed = body["failed"].as_array().unwrap();
    assert_eq!(failed.len(), 2);
    assert_eq!(failed[0]["index"], 1);
    assert_eq!(failed[1]["index"], 2);
    assert_eq!(failed[1]["report_prefix"], "rpt_b");
}

#[tokio::test]
async fn bulk_assign_requires_application_type_per_item() {
    let result = call_tool(
        "bulk_assign_reports_to_roles",
        json!({
            "assignments_data": [
                {
                    "report_prefix": "rpt_a",
                    "business_unit": "unit-01",
                    "role_description": "Supervisor"
                },
                {
                    "report_prefix": "rpt_b",
                    "business_unit": "unit-01",
                    "role_description": "Manager",
                    "application_type": "backoffice"
                }
            ]
        }),
    )
    .await;
    assert!(!is_error(&result));
    let body = tool_text(&result);
    assert_eq!(body["inserted"], 0);
    let failed = body["failed"].as_array().unwrap();
    assert_eq!(failed.len(), 2);
    assert!(failed[0]["error"]
        .as_str()
        .unwrap()
        .contains("application_type is required"));
    assert!(failed[1]["error"].as_str().unwrap().contains("backoffice"));
}

#[tokio::test]
async fn single_assign_rejects_invalid_application_type() {
    let result = call_tool(
        "assign_report_to_role",
        json!({
            "report_prefix": "rpt_a",
            "business_unit": "unit-01",
            "role_description": "Supervisor",
            "application_type": "backoffice"
        }),
    )
    .await;
    assert!(is_error(&result));
    assert_eq!(tool_text(&result)["error"]["code"], "invalid_arguments");
}

#[tokio::test]
async fn update_assignment_requires_fields() {
    let result = call_tool(
        "update_report_assignment",
        json!({
            "report_prefix": "rpt_a",
            "business_unit": "unit-01",
            "role_code": "supervisor"
        }),
    )
    .await;
    assert!(is_error(&result));
    let body = tool_text(&result);
    assert_eq!(body["error"]["code"], "invalid_arguments");
    assert_eq!(body["error"]["message"], "No fields to update");
}

#[tokio::test]
async fn bulk_update_requires_role_codes_and_fields() {
    let no_roles = call_tool(
        "bulk_update_report_assignments",
        json!({
            "report_prefix": "rpt_a",
            "business_unit": "unit-01",
            "role_codes": [],
            "order": 2
        }),
    )
    .await;
    assert!(is_error(&no_roles));
    assert!(tool_text(&no_roles)["error"]["message"]
        .as_str()
        .unwrap()
        .contains("No role codes"));

    let no_fields = call_tool(
        "bulk_update_report_assignments",
        json!({
            "report_prefix": "rpt_a",
            "business_unit": "unit-01",
            "role_codes": ["supervisor"]
        }),
    )
    .await;
    assert!(is_error(&no_fields));
    assert_eq!(tool_text(&no_fields)["error"]["message"], "No fields to update");
}

#[tokio::test]
async fn bulk_search_rejects_unknown_database_keys() {
    let result = call_tool(
        "bulk_search_tables_in_databases",
        json!({ "table_names": ["orders"], "database_keys": ["prod", "default"] }),
    )
    .await;
    assert!(is_error(&result));
    let body = tool_text(&result);
    assert_eq!(body["error"]["code"], "database_unknown");
    assert!(body["error"]["message"].as_str().unwrap().contains("prod"));
}

#[tokio::test]
async fn bulk_get_assignments_rejects_empty_prefixes() {
    let result = call_tool(
        "bulk_get_report_assignments",
        json!({ "report_prefixes": [] }),
    )
    .await;
    assert!(is_error(&result));
    assert_eq!(tool_text(&result)["error"]["code"], "invalid_arguments");
}

#[tokio::test]
async fn multiple_table_structures_rejects_empty_list() {
    let result = call_tool(
        "get_multiple_table_structures",
        json!({ "table_names": [] }),
    )
    .await;
    assert!(is_error(&result));
    assert_eq!(tool_text(&result)["error"]["code"], "invalid_arguments");
}

#[tokio::test]
async fn unreachable_database_surfaces_connection_failed() {
    // Port 1 on loopback refuses immediately; the failure must map onto the
    // domain taxonomy rather than escaping as a transport error.
    let result = call_tool(
        "get_table_structure",
        json!({ "table_name": "orders", "database_key": "default" }),
    )
    .await;
    assert!(is_error(&result));
    assert_eq!(tool_text(&result)["error"]["code"], "connection_failed");
}

#[tokio::test]
async fn health_tool_reports_configured_databases() {
    let result = call_tool("health", json!({})).await;
    assert!(!is_error(&result));
    let body = tool_text(&result);
    assert_eq!(body["status"], "ok");
    assert_eq!(
        body["databases"],
        json!(["INTEGRACION_CW_20_DEV", "default"])
    );
}
