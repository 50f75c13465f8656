use jsonschema::validator_for;
use serde_json::Value;

use mcp_report_server::protocol::{McpErrorCode, McpErrorResponse};

#[test]
fn golden_mcp_error_schema_validation() {
    // 1. Build a canonical error response
    let response = McpErrorResponse::new(
        McpErrorCode::AssignmentExists,
        "Assignment already exists",
    );

    let json_str = serde_json::to_string_pretty(&response).unwrap();
    let json_value: Value = serde_json::from_str(&json_str).unwrap();

    // 2. Schema (v0) — frozen
    let schema_str = r#"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "$id": "https://ecosystemhq.dev/schemas/mcp/error-v0.json",
  "title": "MCP Error Response v0",
  "type": "object",
  "required": ["error"],
  "additionalProperties": false,
  "properties": {
    "error": {
      "type": "object",
      "required": ["code", "message"],
      "additionalProperties": false,
      "properties": {
        "code": {
          "type": "string",
          "enum": [
            "database_unknown",
            "connection_failed",
            "query_failed",
            "invalid_query",
            "invalid_arguments",
            "table_missing",
            "role_missing",
            "assignment_exists",
            "assignment_missing",
            "timeout",
            "internal_error"
          ]
        },
        "message": {
          "type": "string",
          "minLength": 1
        }
      }
    }
  }
}"#;

    let schema_json: Value = serde_json::from_str(schema_str).unwrap();
    let validator = validator_for(&schema_json).unwrap();

    // 3. Validate against schema
    assert!(validator.is_valid(&json_value), "MCP error JSON must satisfy v0 schema");

    // 4. Golden snapshot (byte-identical, stable)
    let expected = r#"{
  "error": {
    "code": "assignment_exists",
    "message": "Assignment already exists"
  }
}"#;

    assert_eq!(json_str.trim(), expected.trim(), "MCP error JSON snapshot mismatch");
}

#[test]
fn every_code_has_a_canonical_message_and_rpc_code() {
    let codes = [
        McpErrorCode::DatabaseUnknown,
        McpErrorCode::ConnectionFailed,
        McpErrorCode::QueryFailed,
        McpErrorCode::InvalidQuery,
        McpErrorCode::InvalidArguments,
        McpErrorCode::TableMissing,
        McpErrorCode::RoleMissing,
        McpErrorCode::AssignmentExists,
        McpErrorCode::AssignmentMissing,
        McpErrorCode::Timeout,
        McpErrorCode::InternalError,
    ];
    for code in codes {
        let rpc = code.json_rpc_code();
        assert!(rpc == -32602 || rpc == -32603, "unexpected JSON-RPC code {rpc}");
        let canonical = McpErrorResponse::canonical(code);
        assert!(!canonical.error.message.is_empty());
    }
}
