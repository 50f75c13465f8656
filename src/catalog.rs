//! Declarative catalog of the advertised tools.
//!
//! Single source of truth for `tools/list`, per-call argument validation, and
//! the introspection artifact.

use serde::Serialize;
use serde_json::{json, Value};

/// One advertised tool: name, description, and the JSON Schema its arguments
/// must satisfy.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Look up one tool by name.
pub fn find(name: &str) -> Option<ToolSpec> {
    tools().into_iter().find(|tool| tool.name == name)
}

fn database_key_property() -> Value {
    json!({
        "type": "string",
        "description": "Database profile key ('default' or 'INTEGRACION_CW_20_DEV')"
    })
}

fn table_names_property() -> Value {
    json!({
        "type": "array",
        "items": { "type": "string" },
        "description": "Table names to look up"
    })
}

fn assignment_field_properties() -> Value {
    json!({
        "application_type": {
            "type": "string",
            "description": "Application type ('sales_force' or 'merchandising')"
        },
        "order": { "type": "integer", "description": "Display order" },
        "custom_tag": { "type": "string", "description": "Custom tag" },
        "sales_office": { "type": "string", "description": "Sales office" },
        "center_logistical": { "type": "string", "description": "Logistics center" }
    })
}

/// The full tool catalog, in advertisement order.
pub fn tools() -> Vec<ToolSpec> {
    let assignment_fields = assignment_field_properties()
        .as_object()
        .cloned()
        .unwrap_or_default();

    let mut update_single = serde_json::Map::new();
    update_single.insert("report_prefix".into(), json!({ "type": "string" }));
    update_single.insert("business_unit".into(), json!({ "type": "string" }));
    update_single.insert(
        "role_code".into(),
        json!({ "type": "string", "description": "Role code to update" }),
    );
    update_single.extend(assignment_fields.clone());

    let mut update_bulk = serde_json::Map::new();
    update_bulk.insert("report_prefix".into(), json!({ "type": "string" }));
    update_bulk.insert("business_unit".into(), json!({ "type": "string" }));
    update_bulk.insert(
        "role_codes".into(),
        json!({
            "type": "array",
            "items": { "type": "string" },
            "description": "Role codes to update"
        }),
    );
    update_bulk.extend(assignment_fields);

    vec![
        ToolSpec {
            name: "get_table_structure",
            description: "Describe the columns of a table in the selected database",
            input_schema: json!({
                "type": "object",
                "required": ["table_name"],
                "properties": {
                    "table_name": { "type": "string", "description": "Table to describe" },
                    "database_key": database_key_property()
                }
            }),
        },
        ToolSpec {
            name: "list_tables",
            description: "List base tables in a schema of the selected database",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "schema": { "type": "string", "description": "Schema name (default 'dbo')" },
                    "database_key": database_key_property()
                }
            }),
        },
        ToolSpec {
            name: "test_query",
            description: "Run a report query with a trial business_unit and preview the first rows",
            input_schema: json!({
                "type": "object",
                "required": ["query", "business_unit"],
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "SQL query; must reference @business_unit"
                    },
                    "business_unit": {
                        "type": "string",
                        "description": "Business unit value for the trial run"
                    },
                    "database_key": database_key_property()
                }
            }),
        },
        ToolSpec {
            name: "create_report",
            description: "Create a report via the sp_ecosystem_create_columns_config stored procedure",
            input_schema: json!({
                "type": "object",
                "required": [
                    "report_prefix",
                    "report_description_en",
                    "report_description_es",
                    "query"
                ],
                "properties": {
                    "report_prefix": { "type": "string", "description": "Unique report prefix" },
                    "report_description_en": { "type": "string" },
                    "report_description_es": { "type": "string" },
                    "query": {
                        "type": "string",
                        "description": "SQL query; must reference @business_unit"
                    },
                    "additional_params": {
                        "type": "object",
                        "additionalProperties": { "type": "string" },
                        "description": "Extra parameters merged into params_config"
                    },
                    "is_detail": { "type": "integer" },
                    "has_detail": { "type": ["integer", "null"] },
                    "action_column": { "type": "string" },
                    "detail_prefix": { "type": "string" },
                    "detail_mode": {
                        "type": "string",
                        "description": "Detail mode ('modal' or 'page')"
                    },
                    "open_another_tab": { "type": ["integer", "null"] },
                    "type_resource": { "type": "string", "description": "Default 'table'" },
                    "columns_to_render": { "type": "string" },
                    "default_for_all": { "type": "integer" },
                    "database_key": database_key_property()
                }
            }),
        },
        ToolSpec {
            name: "assign_report_to_role",
            description: "Assign a report to a role, resolving the role code from its description",
            input_schema: json!({
                "type": "object",
                "required": ["report_prefix", "business_unit", "role_description"],
                "properties": {
                    "report_prefix": { "type": "string" },
                    "business_unit": { "type": "string" },
                    "role_description": {
                        "type": "string",
                        "description": "Role description fragment to match"
                    },
                    "application_type": {
                        "type": "string",
                        "description": "Application type ('sales_force' or 'merchandising')"
                    },
                    "order": { "type": "integer" },
                    "custom_tag": { "type": "string" },
                    "sales_office": { "type": "string" },
                    "center_logistical": { "type": "string" }
                }
            }),
        },
        ToolSpec {
            name: "get_table_structures_across_databases",
            description: "Describe a set of tables in every configured database",
            input_schema: json!({
                "type": "object",
                "required": ["table_names"],
                "properties": { "table_names": table_names_property() }
            }),
        },
        ToolSpec {
            name: "get_multiple_table_structures",
            description: "Describe several tables in one database in a single call",
            input_schema: json!({
                "type": "object",
                "required": ["table_names"],
                "properties": {
                    "table_names": table_names_property(),
                    "database_key": database_key_property()
                }
            }),
        },
        ToolSpec {
            name: "bulk_search_tables_in_databases",
            description: "Search for tables across a chosen set of databases",
            input_schema: json!({
                "type": "object",
                "required": ["table_names"],
                "properties": {
                    "table_names": table_names_property(),
                    "database_keys": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Database profile keys to search; all of them when omitted"
                    }
                }
            }),
        },
        ToolSpec {
            name: "bulk_create_reports",
            description: "Create several reports in one call; invalid items are reported per item",
            input_schema: json!({
                "type": "object",
                "required": ["reports_data"],
                "properties": {
                    "reports_data": {
                        "type": "array",
                        "items": { "type": "object" },
                        "description": "Report definitions with the same fields as create_report"
                    }
                }
            }),
        },
        ToolSpec {
            name: "bulk_assign_reports_to_roles",
            description: "Assign several reports to roles in one call; existing assignments are skipped",
            input_schema: json!({
                "type": "object",
                "required": ["assignments_data"],
                "properties": {
                    "assignments_data": {
                        "type": "array",
                        "items": { "type": "object" },
                        "description": "Assignments with the same fields as assign_report_to_role; application_type is required per item"
                    }
                }
            }),
        },
        ToolSpec {
            name: "bulk_get_report_assignments",
            description: "Fetch role assignments for several reports at once",
            input_schema: json!({
                "type": "object",
                "required": ["report_prefixes"],
                "properties": {
                    "report_prefixes": {
                        "type": "array",
                        "items": { "type": "string" }
                    },
                    "business_unit": {
                        "type": "string",
                        "description": "Restrict to one business unit"
                    }
                }
            }),
        },
        ToolSpec {
            name: "bulk_update_report_assignments",
            description: "Update one report's assignments for several roles at once",
            input_schema: json!({
                "type": "object",
                "required": ["report_prefix", "business_unit", "role_codes"],
                "properties": Value::Object(update_bulk)
            }),
        },
        ToolSpec {
            name: "update_report_assignment",
            description: "Update a single report-to-role assignment",
            input_schema: json!({
                "type": "object",
                "required": ["report_prefix", "business_unit", "role_code"],
                "properties": Value::Object(update_single)
            }),
        },
        ToolSpec {
            name: "list_available_roles",
            description: "List roles for a business unit, excluding sys_admin",
            input_schema: json!({
                "type": "object",
                "required": ["business_unit"],
                "properties": {
                    "business_unit": { "type": "string" }
                }
            }),
        },
        ToolSpec {
            name: "get_report_assignments",
            description: "List role assignments for a report",
            input_schema: json!({
                "type": "object",
                "required": ["report_prefix"],
                "properties": {
                    "report_prefix": { "type": "string" },
                    "business_unit": {
                        "type": "string",
                        "description": "Restrict to one business unit"
                    }
                }
            }),
        },
        ToolSpec {
            name: "search_table_in_all_databases",
            description: "Look up one table in every configured database",
            input_schema: json!({
                "type": "object",
                "required": ["table_name"],
                "properties": {
                    "table_name": { "type": "string" }
                }
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_are_unique() {
        let all = tools();
        let mut names: Vec<&str> = all.iter().map(|t| t.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), all.len());
    }

    #[test]
    fn find_known_and_unknown() {
        assert!(find("create_report").is_some());
        assert!(find("drop_database").is_none());
    }

    #[test]
    fn every_schema_is_an_object_schema() {
        for tool in tools() {
            assert_eq!(
                tool.input_schema["type"].as_str(),
                Some("object"),
                "{} schema must be an object schema",
                tool.name
            );
        }
    }
}
