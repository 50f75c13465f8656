//! Report creation through `sp_ecosystem_create_columns_config`.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::config::{ServerConfig, DEFAULT_DATABASE_KEY, INTEGRATION_DATABASE_KEY};
use crate::db::DbClient;
use crate::protocol::{
    BulkCreateReportsParams, McpErrorCode, McpErrorResponse, ReportSpec, ToolResult,
};

use super::{to_json, with_timeout};

/// Pick the database a report query reads from. An explicit `database_key`
/// wins; otherwise the integration profile is selected when the query text
/// mentions its database name, falling back to `default`.
pub(crate) fn detect_database_key(query: &str, explicit: Option<&str>) -> String {
    if let Some(key) = explicit {
        return key.to_string();
    }
    if query.to_uppercase().contains(INTEGRATION_DATABASE_KEY) {
        return INTEGRATION_DATABASE_KEY.to_string();
    }
    DEFAULT_DATABASE_KEY.to_string()
}

/// The `params_config` JSON handed to the stored procedure: `business_unit`
/// is always declared, extended by any additional parameters.
pub(crate) fn params_config(
    additional: Option<&BTreeMap<String, String>>,
) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("business_unit".to_string(), "NVARCHAR(20)".to_string());
    if let Some(extra) = additional {
        for (name, sql_type) in extra {
            params.insert(name.clone(), sql_type.clone());
        }
    }
    params
}

/// Validate a report definition without touching the database. Returns the
/// resolved query database key.
fn validate_spec(spec: &ReportSpec, config: &ServerConfig) -> Result<String, McpErrorResponse> {
    if !spec.query.contains("@business_unit") {
        return Err(McpErrorResponse::canonical(McpErrorCode::InvalidQuery));
    }
    let key = detect_database_key(&spec.query, spec.database_key.as_deref());
    if config.profile(&key).is_none() {
        return Err(McpErrorResponse::new(
            McpErrorCode::DatabaseUnknown,
            format!("Database '{key}' is not configured"),
        ));
    }
    Ok(key)
}

#[derive(Debug, Serialize)]
struct CreateReportResponse {
    report_prefix: String,
    params_config: BTreeMap<String, String>,
    type_resource: String,
    /// Database the report query reads from.
    query_database: String,
    /// Database the stored procedure ran on. Always the default profile.
    procedure_database: String,
}

/// Handle a `create_report` tool call.
pub async fn create_report(params: ReportSpec, config: &ServerConfig) -> ToolResult {
    let query_key = match validate_spec(&params, config) {
        Ok(key) => key,
        Err(e) => return e.into(),
    };
    // The configuration tables live on the default profile regardless of
    // which database the report query reads from.
    let Some(profile) = config.profile(DEFAULT_DATABASE_KEY).cloned() else {
        return McpErrorResponse::new(
            McpErrorCode::DatabaseUnknown,
            format!("Database '{DEFAULT_DATABASE_KEY}' is not configured"),
        )
        .into();
    };
    let query_database = match config.profile(&query_key) {
        Some(p) => p.database.clone(),
        None => query_key.clone(),
    };

    with_timeout(config, async move {
        let params_config = params_config(params.additional_params.as_ref());
        let params_json = serde_json::to_string(&params_config).map_err(|e| {
            McpErrorResponse::new(McpErrorCode::InternalError, e.to_string())
        })?;

        let mut db = DbClient::connect(&profile).await?;
        db.exec_create_report(&params, &params_json).await?;
        info!(report_prefix = %params.report_prefix, "report created");

        to_json(&CreateReportResponse {
            report_prefix: params.report_prefix.clone(),
            params_config,
            type_resource: params.type_resource.clone(),
            query_database,
            procedure_database: db.database.clone(),
        })
    })
    .await
}

/// One rejected item of a bulk call. Indices are 1-based to match how agents
/// enumerate their input.
#[derive(Debug, Serialize)]
pub(crate) struct ItemFailure {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_prefix: Option<String>,
    pub error: String,
}

#[derive(Debug, Serialize)]
struct CreatedReport {
    index: usize,
    report_prefix: String,
    query_database: String,
    procedure_database: String,
}

#[derive(Debug, Serialize)]
struct BulkCreateResponse {
    created: usize,
    reports: Vec<CreatedReport>,
    failed: Vec<ItemFailure>,
}

/// Handle a `bulk_create_reports` tool call. Every item is validated up
/// front; a bad item never aborts the batch, and the database is only
/// touched when at least one item is valid.
pub async fn bulk_create_reports(
    params: BulkCreateReportsParams,
    config: &ServerConfig,
) -> ToolResult {
    if params.reports_data.is_empty() {
        return McpErrorResponse::new(McpErrorCode::InvalidArguments, "No reports provided").into();
    }

    let mut valid: Vec<(usize, ReportSpec, String)> = Vec::new();
    let mut failed: Vec<ItemFailure> = Vec::new();

    for (i, raw) in params.reports_data.iter().enumerate() {
        let index = i + 1;
        let spec: ReportSpec = match serde_json::from_value(raw.clone()) {
            Ok(spec) => spec,
            Err(e) => {
                failed.push(ItemFailure {
                    index,
                    report_prefix: raw
                        .get("report_prefix")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                    error: format!("invalid report definition: {e}"),
                });
                continue;
            }
        };
        match validate_spec(&spec, config) {
            Ok(key) => valid.push((index, spec, key)),
            Err(e) => failed.push(ItemFailure {
                index,
                report_prefix: Some(spec.report_prefix),
                error: e.error.message,
            }),
        }
    }

    if valid.is_empty() {
        return match to_json(&BulkCreateResponse {
            created: 0,
            reports: Vec::new(),
            failed,
        }) {
            Ok(json) => ToolResult::text(json),
            Err(e) => e.into(),
        };
    }

    let Some(profile) = config.profile(DEFAULT_DATABASE_KEY).cloned() else {
        return McpErrorResponse::new(
            McpErrorCode::DatabaseUnknown,
            format!("Database '{DEFAULT_DATABASE_KEY}' is not configured"),
        )
        .into();
    };
    let query_databases: BTreeMap<String, String> = config
        .databases
        .iter()
        .map(|(k, p)| (k.clone(), p.database.clone()))
        .collect();

    with_timeout(config, async move {
        let mut db = DbClient::connect(&profile).await?;
        let mut reports = Vec::new();

        for (index, spec, query_key) in valid {
            let params_config = params_config(spec.additional_params.as_ref());
            let params_json = serde_json::to_string(&params_config).map_err(|e| {
                McpErrorResponse::new(McpErrorCode::InternalError, e.to_string())
            })?;

            match db.exec_create_report(&spec, &params_json).await {
                Ok(()) => {
                    info!(report_prefix = %spec.report_prefix, "report created");
                    reports.push(CreatedReport {
                        index,
                        report_prefix: spec.report_prefix,
                        query_database: query_databases
                            .get(&query_key)
                            .cloned()
                            .unwrap_or(query_key),
                        procedure_database: db.database.clone(),
                    });
                }
                Err(e) => failed.push(ItemFailure {
                    index,
                    report_prefix: Some(spec.report_prefix),
                    error: e.to_string(),
                }),
            }
        }

        to_json(&BulkCreateResponse {
            created: reports.len(),
            reports,
            failed,
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_key_wins_over_detection() {
        let key = detect_database_key(
            "SELECT * FROM INTEGRACION_CW_20_DEV.dbo.t WHERE bu = @business_unit",
            Some("default"),
        );
        assert_eq!(key, "default");
    }

    #[test]
    fn integration_database_detected_case_insensitively() {
        let key = detect_database_key(
            "select * from integracion_cw_20_dev.dbo.t where bu = @business_unit",
            None,
        );
        assert_eq!(key, INTEGRATION_DATABASE_KEY);
    }

    #[test]
    fn plain_query_defaults() {
        let key = detect_database_key("SELECT * FROM t WHERE bu = @business_unit", None);
        assert_eq!(key, DEFAULT_DATABASE_KEY);
    }

    #[test]
    fn params_config_always_declares_business_unit() {
        let params = params_config(None);
        assert_eq!(params.get("business_unit").map(String::as_str), Some("NVARCHAR(20)"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn params_config_merges_additional() {
        let mut extra = BTreeMap::new();
        extra.insert("region".to_string(), "NVARCHAR(10)".to_string());
        let params = params_config(Some(&extra));
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("region").map(String::as_str), Some("NVARCHAR(10)"));
        assert!(params.contains_key("business_unit"));
    }
}
