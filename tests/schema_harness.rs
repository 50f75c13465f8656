use serde_json::json;

use mcp_report_server::schema::{compile_check, validate};

#[test]
fn json_schema_harness_validates_instance() {
    let schema = json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["error"],
        "additionalProperties": false,
        "properties": {
            "error": {
                "type": "object",
                "required": ["code", "message"],
                "additionalProperties": false,
                "properties": {
                    "code": { "type": "string" },
                    "message": { "type": "string", "minLength": 1 }
                }
            }
        }
    });

    let instance = json!({
        "error": {
            "code": "assignment_exists",
            "message": "Assignment already exists"
        }
    });

    validate(&schema, &instance).expect("schema validation failed");
}

#[test]
fn json_schema_harness_rejects_invalid_instance() {
    let schema = json!({
        "type": "object",
        "required": ["table_name"],
        "properties": {
            "table_name": { "type": "string" }
        }
    });

    assert!(validate(&schema, &json!({})).is_err());
    assert!(validate(&schema, &json!({ "table_name": 7 })).is_err());
    assert!(validate(&schema, &json!({ "table_name": "orders" })).is_ok());
}

#[test]
fn every_catalog_schema_compiles() {
    for tool in mcp_report_server::catalog::tools() {
        compile_check(&tool.input_schema)
            .unwrap_or_else(|e| panic!("schema for {} does not compile: {e}", tool.name));
    }
}
