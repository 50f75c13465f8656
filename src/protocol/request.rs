use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_DATABASE_KEY;

/// JSON-RPC 2.0 ID — may be a number or string per spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(i64),
    Str(String),
}

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<RpcId>,
    pub method: String,
    pub params: Option<serde_json::Value>,
}

/// MCP `initialize` params.
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: Option<String>,
    #[serde(rename = "clientInfo")]
    pub client_info: Option<ClientInfo>,
}

/// Client information sent during `initialize`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// Parameters for `tools/call`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    pub arguments: Option<serde_json::Value>,
}

fn default_database_key() -> String {
    DEFAULT_DATABASE_KEY.to_string()
}

fn default_schema() -> String {
    "dbo".to_string()
}

fn default_type_resource() -> String {
    "table".to_string()
}

/// Parameters for the `get_table_structure` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct TableStructureParams {
    pub table_name: String,
    #[serde(default = "default_database_key")]
    pub database_key: String,
}

/// Parameters for the `list_tables` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct ListTablesParams {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_database_key")]
    pub database_key: String,
}

/// Parameters for the `test_query` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct TestQueryParams {
    pub query: String,
    pub business_unit: String,
    #[serde(default = "default_database_key")]
    pub database_key: String,
}

/// Parameters for `get_multiple_table_structures`.
#[derive(Debug, Clone, Deserialize)]
pub struct MultiTableParams {
    pub table_names: Vec<String>,
    #[serde(default = "default_database_key")]
    pub database_key: String,
}

/// Parameters for `get_table_structures_across_databases`.
#[derive(Debug, Clone, Deserialize)]
pub struct CrossDatabaseParams {
    pub table_names: Vec<String>,
}

/// Parameters for `bulk_search_tables_in_databases`.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkSearchParams {
    pub table_names: Vec<String>,
    /// Database keys to search. All configured databases when absent.
    #[serde(default)]
    pub database_keys: Option<Vec<String>>,
}

/// Parameters for `search_table_in_all_databases`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchTableParams {
    pub table_name: String,
}

/// One report definition, used by both `create_report` and the items of
/// `bulk_create_reports`. Field names and defaults match the stored
/// procedure's parameter list.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportSpec {
    pub report_prefix: String,
    pub report_description_en: String,
    pub report_description_es: String,
    /// SQL query; must reference `@business_unit`.
    pub query: String,
    /// Extra parameters merged into `params_config` alongside `business_unit`.
    #[serde(default)]
    pub additional_params: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub is_detail: i32,
    #[serde(default)]
    pub has_detail: Option<i32>,
    #[serde(default)]
    pub action_column: Option<String>,
    #[serde(default)]
    pub detail_prefix: Option<String>,
    #[serde(default)]
    pub detail_mode: Option<String>,
    #[serde(default)]
    pub open_another_tab: Option<i32>,
    #[serde(default = "default_type_resource")]
    pub type_resource: String,
    #[serde(default)]
    pub columns_to_render: Option<String>,
    #[serde(default)]
    pub default_for_all: i32,
    /// Database the query reads from. Auto-detected from the query text when
    /// absent. The stored procedure itself always runs on `default`.
    #[serde(default)]
    pub database_key: Option<String>,
}

/// Parameters for `bulk_create_reports`. Items stay raw JSON so one malformed
/// report is reported individually instead of failing the whole batch.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkCreateReportsParams {
    pub reports_data: Vec<serde_json::Value>,
}

/// One assignment, used by `assign_report_to_role` and the items of
/// `bulk_assign_reports_to_roles`.
#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentSpec {
    pub report_prefix: String,
    pub business_unit: String,
    /// Role description fragment; the server resolves the role code.
    pub role_description: String,
    #[serde(default)]
    pub application_type: Option<String>,
    #[serde(default)]
    pub order: Option<i32>,
    #[serde(default)]
    pub custom_tag: Option<String>,
    #[serde(default)]
    pub sales_office: Option<String>,
    #[serde(default)]
    pub center_logistical: Option<String>,
}

/// Parameters for `bulk_assign_reports_to_roles`.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkAssignParams {
    pub assignments_data: Vec<serde_json::Value>,
}

/// Parameters for `bulk_get_report_assignments`.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkAssignmentsQueryParams {
    pub report_prefixes: Vec<String>,
    #[serde(default)]
    pub business_unit: Option<String>,
}

/// The updatable columns of an assignment. Only present fields are written.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentUpdate {
    #[serde(default)]
    pub application_type: Option<String>,
    #[serde(default)]
    pub order: Option<i32>,
    #[serde(default)]
    pub custom_tag: Option<String>,
    #[serde(default)]
    pub sales_office: Option<String>,
    #[serde(default)]
    pub center_logistical: Option<String>,
}

impl AssignmentUpdate {
    pub fn is_empty(&self) -> bool {
        self.application_type.is_none()
            && self.order.is_none()
            && self.custom_tag.is_none()
            && self.sales_office.is_none()
            && self.center_logistical.is_none()
    }
}

/// Parameters for `update_report_assignment`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAssignmentParams {
    pub report_prefix: String,
    pub business_unit: String,
    pub role_code: String,
    #[serde(flatten)]
    pub changes: AssignmentUpdate,
}

/// Parameters for `bulk_update_report_assignments`.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkUpdateAssignmentsParams {
    pub report_prefix: String,
    pub business_unit: String,
    pub role_codes: Vec<String>,
    #[serde(flatten)]
    pub changes: AssignmentUpdate,
}

/// Parameters for `list_available_roles`.
#[derive(Debug, Clone, Deserialize)]
pub struct RolesParams {
    pub business_unit: String,
}

/// Parameters for `get_report_assignments`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportAssignmentsParams {
    pub report_prefix: String,
    #[serde(default)]
    pub business_unit: Option<String>,
}
