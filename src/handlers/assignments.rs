//! Report-to-role assignment management.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{ServerConfig, DEFAULT_DATABASE_KEY};
use crate::db::{AssignmentRow, DbClient, RoleRow};
use crate::protocol::{
    AssignmentSpec, AssignmentUpdate, BulkAssignParams, BulkAssignmentsQueryParams,
    BulkUpdateAssignmentsParams, McpErrorCode, McpErrorResponse, ReportAssignmentsParams,
    ToolResult, UpdateAssignmentParams,
};

use super::{to_json, unknown_database, with_timeout};

const VALID_APPLICATION_TYPES: [&str; 2] = ["sales_force", "merchandising"];

fn default_profile(
    config: &ServerConfig,
) -> Result<crate::config::DatabaseProfile, McpErrorResponse> {
    config
        .profile(DEFAULT_DATABASE_KEY)
        .cloned()
        .ok_or_else(|| unknown_database(DEFAULT_DATABASE_KEY))
}

/// Resolve a role description fragment to exactly one role. When several
/// match, the first is used and the caller gets a warning naming it.
async fn resolve_role(
    db: &mut DbClient,
    business_unit: &str,
    description: &str,
) -> Result<(RoleRow, Option<String>), McpErrorResponse> {
    let matches = db.find_roles(business_unit, description).await?;
    let Some(role) = matches.first().cloned() else {
        return Err(McpErrorResponse::new(
            McpErrorCode::RoleMissing,
            format!(
                "No role matching '{description}' found for business unit '{business_unit}'"
            ),
        ));
    };
    let warning = if matches.len() > 1 {
        Some(format!(
            "{} roles matched '{description}'; using {} - {}",
            matches.len(),
            role.code,
            role.description
        ))
    } else {
        None
    };
    Ok((role, warning))
}

#[derive(Debug, Serialize)]
struct AssignResponse {
    report_prefix: String,
    business_unit: String,
    role_code: String,
    role_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    application_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sales_office: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    center_logistical: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

/// Handle an `assign_report_to_role` tool call.
pub async fn assign_report_to_role(params: AssignmentSpec, config: &ServerConfig) -> ToolResult {
    if let Some(t) = &params.application_type {
        if !VALID_APPLICATION_TYPES.contains(&t.as_str()) {
            return invalid_application_type(t).into();
        }
    }
    let profile = match default_profile(config) {
        Ok(p) => p,
        Err(e) => return e.into(),
    };

    with_timeout(config, async move {
        let mut db = DbClient::connect(&profile).await?;
        let (role, warning) =
            resolve_role(&mut db, &params.business_unit, &params.role_description).await?;
        if let Some(w) = &warning {
            warn!("{w}");
        }

        if db
            .assignment_exists(&params.business_unit, &params.report_prefix, &role.code)
            .await?
        {
            return Err(McpErrorResponse::new(
                McpErrorCode::AssignmentExists,
                format!(
                    "Report '{}' is already assigned to role '{}' in business unit '{}'",
                    params.report_prefix, role.code, params.business_unit
                ),
            ));
        }

        db.insert_assignment(&params, &role.code).await?;
        info!(
            report_prefix = %params.report_prefix,
            role = %role.code,
            "assignment created"
        );

        to_json(&AssignResponse {
            report_prefix: params.report_prefix,
            business_unit: params.business_unit,
            role_code: role.code,
            role_description: role.description,
            application_type: params.application_type,
            order: params.order,
            custom_tag: params.custom_tag,
            sales_office: params.sales_office,
            center_logistical: params.center_logistical,
            warning,
        })
    })
    .await
}

#[derive(Debug, Serialize)]
struct BulkAssignItemFailure {
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    report_prefix: Option<String>,
    error: String,
}

#[derive(Debug, Serialize)]
struct BulkAssignedItem {
    index: usize,
    report_prefix: String,
    role_code: String,
    role_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

#[derive(Debug, Serialize)]
struct SkippedAssignment {
    index: usize,
    report_prefix: String,
    role_code: String,
    reason: String,
}

#[derive(Debug, Serialize)]
struct BulkAssignResponse {
    inserted: usize,
    assignments: Vec<BulkAssignedItem>,
    skipped: Vec<SkippedAssignment>,
    failed: Vec<BulkAssignItemFailure>,
}

fn invalid_application_type(value: &str) -> McpErrorResponse {
    McpErrorResponse::new(
        McpErrorCode::InvalidArguments,
        format!(
            "application_type '{value}' is invalid; expected one of: {}",
            VALID_APPLICATION_TYPES.join(", ")
        ),
    )
}

/// Handle a `bulk_assign_reports_to_roles` tool call. Items are validated up
/// front; `application_type` is required per item here, unlike the single
/// assignment tool. Existing assignments are skipped, not errors.
pub async fn bulk_assign_reports_to_roles(
    params: BulkAssignParams,
    config: &ServerConfig,
) -> ToolResult {
    if params.assignments_data.is_empty() {
        return McpErrorResponse::new(McpErrorCode::InvalidArguments, "No assignments provided")
            .into();
    }

    let mut valid: Vec<(usize, AssignmentSpec)> = Vec::new();
    let mut failed: Vec<BulkAssignItemFailure> = Vec::new();

    for (i, raw) in params.assignments_data.iter().enumerate() {
        let index = i + 1;
        let spec: AssignmentSpec = match serde_json::from_value(raw.clone()) {
            Ok(spec) => spec,
            Err(e) => {
                failed.push(BulkAssignItemFailure {
                    index,
                    report_prefix: raw
                        .get("report_prefix")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                    error: format!("invalid assignment definition: {e}"),
                });
                continue;
            }
        };
        match &spec.application_type {
            None => {
                failed.push(BulkAssignItemFailure {
                    index,
                    report_prefix: Some(spec.report_prefix),
                    error: "application_type is required".to_string(),
                });
            }
            Some(t) if !VALID_APPLICATION_TYPES.contains(&t.as_str()) => {
                let error = invalid_application_type(t).error.message;
                failed.push(BulkAssignItemFailure {
                    index,
                    report_prefix: Some(spec.report_prefix),
                    error,
                });
            }
            Some(_) => valid.push((index, spec)),
        }
    }

    if valid.is_empty() {
        return match to_json(&BulkAssignResponse {
            inserted: 0,
            assignments: Vec::new(),
            skipped: Vec::new(),
            failed,
        }) {
            Ok(json) => ToolResult::text(json),
            Err(e) => e.into(),
        };
    }

    let profile = match default_profile(config) {
        Ok(p) => p,
        Err(e) => return e.into(),
    };

    with_timeout(config, async move {
        let mut db = DbClient::connect(&profile).await?;
        let mut assignments = Vec::new();
        let mut skipped = Vec::new();

        for (index, spec) in valid {
            let (role, warning) =
                match resolve_role(&mut db, &spec.business_unit, &spec.role_description).await {
                    Ok(resolved) => resolved,
                    Err(e) => {
                        failed.push(BulkAssignItemFailure {
                            index,
                            report_prefix: Some(spec.report_prefix),
                            error: e.error.message,
                        });
                        continue;
                    }
                };
            if let Some(w) = &warning {
                warn!("{w}");
            }

            let exists = db
                .assignment_exists(&spec.business_unit, &spec.report_prefix, &role.code)
                .await?;
            if exists {
                skipped.push(SkippedAssignment {
                    index,
                    report_prefix: spec.report_prefix,
                    role_code: role.code,
                    reason: "assignment already exists".to_string(),
                });
                continue;
            }

            match db.insert_assignment(&spec, &role.code).await {
                Ok(()) => {
                    info!(
                        report_prefix = %spec.report_prefix,
                        role = %role.code,
                        "assignment created"
                    );
                    assignments.push(BulkAssignedItem {
                        index,
                        report_prefix: spec.report_prefix,
                        role_code: role.code,
                        role_description: role.description,
                        warning,
                    });
                }
                Err(e) => failed.push(BulkAssignItemFailure {
                    index,
                    report_prefix: Some(spec.report_prefix),
                    error: e.to_string(),
                }),
            }
        }

        to_json(&BulkAssignResponse {
            inserted: assignments.len(),
            assignments,
            skipped,
            failed,
        })
    })
    .await
}

#[derive(Debug, Serialize)]
struct ReportAssignmentsResponse {
    report_prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    business_unit: Option<String>,
    assignments: Vec<AssignmentRow>,
}

/// Handle a `get_report_assignments` tool call.
pub async fn get_report_assignments(
    params: ReportAssignmentsParams,
    config: &ServerConfig,
) -> ToolResult {
    let profile = match default_profile(config) {
        Ok(p) => p,
        Err(e) => return e.into(),
    };

    with_timeout(config, async move {
        let mut db = DbClient::connect(&profile).await?;
        let assignments = db
            .assignments_for_report(&params.report_prefix, params.business_unit.as_deref())
            .await?;
        if assignments.is_empty() {
            return Err(McpErrorResponse::new(
                McpErrorCode::AssignmentMissing,
                format!("No assignments found for report '{}'", params.report_prefix),
            ));
        }
        to_json(&ReportAssignmentsResponse {
            report_prefix: params.report_prefix,
            business_unit: params.business_unit,
            assignments,
        })
    })
    .await
}

#[derive(Debug, Serialize)]
struct BulkAssignmentsResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    business_unit: Option<String>,
    total_assignments: usize,
    /// Assignments grouped by report prefix.
    reports: BTreeMap<String, Vec<AssignmentRow>>,
    /// Requested prefixes with no assignments at all.
    missing: Vec<String>,
}

/// Handle a `bulk_get_report_assignments` tool call.
pub async fn bulk_get_report_assignments(
    params: BulkAssignmentsQueryParams,
    config: &ServerConfig,
) -> ToolResult {
    if params.report_prefixes.is_empty() {
        return McpErrorResponse::new(McpErrorCode::InvalidArguments, "No report prefixes provided")
            .into();
    }
    let profile = match default_profile(config) {
        Ok(p) => p,
        Err(e) => return e.into(),
    };

    with_timeout(config, async move {
        let mut db = DbClient::connect(&profile).await?;
        let rows = db
            .assignments_for_reports(&params.report_prefixes, params.business_unit.as_deref())
            .await?;
        if rows.is_empty() {
            return Err(McpErrorResponse::new(
                McpErrorCode::AssignmentMissing,
                format!(
                    "No assignments found for reports: {}",
                    params.report_prefixes.join(", ")
                ),
            ));
        }

        let total_assignments = rows.len();
        let mut reports: BTreeMap<String, Vec<AssignmentRow>> = BTreeMap::new();
        for row in rows {
            reports.entry(row.report_prefix.clone()).or_default().push(row);
        }

        let mut missing: Vec<String> = params
            .report_prefixes
            .iter()
            .filter(|p| !reports.contains_key(*p))
            .cloned()
            .collect();
        missing.sort();
        missing.dedup();

        to_json(&BulkAssignmentsResponse {
            business_unit: params.business_unit,
            total_assignments,
            reports,
            missing,
        })
    })
    .await
}

/// One field changed by an update, with the value it held before.
#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct FieldChange {
    pub field: &'static str,
    pub from: Option<String>,
    pub to: String,
}

/// Diff the requested changes against the current row. Fields absent from
/// `changes` are not reported even when the row has values for them.
pub(crate) fn diff_changes(current: &AssignmentRow, changes: &AssignmentUpdate) -> Vec<FieldChange> {
    let mut diff = Vec::new();
    if let Some(v) = &changes.application_type {
        diff.push(FieldChange {
            field: "application_type",
            from: current.application_type.clone(),
            to: v.clone(),
        });
    }
    if let Some(v) = changes.order {
        diff.push(FieldChange {
            field: "order",
            from: current.order.map(|o| o.to_string()),
            to: v.to_string(),
        });
    }
    if let Some(v) = &changes.custom_tag {
        diff.push(FieldChange {
            field: "custom_tag",
            from: current.custom_tag.clone(),
            to: v.clone(),
        });
    }
    if let Some(v) = &changes.sales_office {
        diff.push(FieldChange {
            field: "sales_office",
            from: current.sales_office.clone(),
            to: v.clone(),
        });
    }
    if let Some(v) = &changes.center_logistical {
        diff.push(FieldChange {
            field: "center_logistical",
            from: current.center_logistical.clone(),
            to: v.clone(),
        });
    }
    diff
}

/// Names of the fields supplied in an update.
pub(crate) fn supplied_fields(changes: &AssignmentUpdate) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if changes.application_type.is_some() {
        fields.push("application_type");
    }
    if changes.order.is_some() {
        fields.push("order");
    }
    if changes.custom_tag.is_some() {
        fields.push("custom_tag");
    }
    if changes.sales_office.is_some() {
        fields.push("sales_office");
    }
    if changes.center_logistical.is_some() {
        fields.push("center_logistical");
    }
    fields
}

#[derive(Debug, Serialize)]
struct UpdateAssignmentResponse {
    report_prefix: String,
    business_unit: String,
    role_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    role_description: Option<String>,
    rows_affected: u64,
    changes: Vec<FieldChange>,
}

/// Handle an `update_report_assignment` tool call.
pub async fn update_report_assignment(
    params: UpdateAssignmentParams,
    config: &ServerConfig,
) -> ToolResult {
    if params.changes.is_empty() {
        return McpErrorResponse::new(McpErrorCode::InvalidArguments, "No fields to update").into();
    }
    if let Some(t) = &params.changes.application_type {
        if !VALID_APPLICATION_TYPES.contains(&t.as_str()) {
            return invalid_application_type(t).into();
        }
    }
    let profile = match default_profile(config) {
        Ok(p) => p,
        Err(e) => return e.into(),
    };

    with_timeout(config, async move {
        let mut db = DbClient::connect(&profile).await?;
        let current = db
            .assignment(&params.report_prefix, &params.business_unit, &params.role_code)
            .await?
            .ok_or_else(|| {
                McpErrorResponse::new(
                    McpErrorCode::AssignmentMissing,
                    format!(
                        "Report '{}' is not assigned to role '{}' in business unit '{}'",
                        params.report_prefix, params.role_code, params.business_unit
                    ),
                )
            })?;

        let role_codes = vec![params.role_code.clone()];
        let rows_affected = db
            .update_assignments(
                &params.report_prefix,
                &params.business_unit,
                &role_codes,
                &params.changes,
            )
            .await?;
        info!(
            report_prefix = %params.report_prefix,
            role = %params.role_code,
            rows_affected,
            "assignment updated"
        );

        to_json(&UpdateAssignmentResponse {
            changes: diff_changes(&current, &params.changes),
            report_prefix: params.report_prefix,
            business_unit: params.business_unit,
            role_code: params.role_code,
            role_description: current.role_description,
            rows_affected,
        })
    })
    .await
}

#[derive(Debug, Serialize)]
struct UpdatedRole {
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct BulkUpdateResponse {
    report_prefix: String,
    business_unit: String,
    rows_affected: u64,
    roles: Vec<UpdatedRole>,
    changed: Vec<&'static str>,
}

/// Handle a `bulk_update_report_assignments` tool call. Only roles that are
/// actually assigned to the report are updated.
pub async fn bulk_update_report_assignments(
    params: BulkUpdateAssignmentsParams,
    config: &ServerConfig,
) -> ToolResult {
    if params.role_codes.is_empty() {
        return McpErrorResponse::new(McpErrorCode::InvalidArguments, "No role codes provided")
            .into();
    }
    if params.changes.is_empty() {
        return McpErrorResponse::new(McpErrorCode::InvalidArguments, "No fields to update").into();
    }
    if let Some(t) = &params.changes.application_type {
        if !VALID_APPLICATION_TYPES.contains(&t.as_str()) {
            return invalid_application_type(t).into();
        }
    }
    let profile = match default_profile(config) {
        Ok(p) => p,
        Err(e) => return e.into(),
    };

    with_timeout(config, async move {
        let mut db = DbClient::connect(&profile).await?;
        let assigned = db
            .assigned_roles(&params.report_prefix, &params.business_unit, &params.role_codes)
            .await?;
        if assigned.is_empty() {
            return Err(McpErrorResponse::new(
                McpErrorCode::AssignmentMissing,
                format!(
                    "None of the roles are assigned to report '{}' in business unit '{}'",
                    params.report_prefix, params.business_unit
                ),
            ));
        }

        let codes: Vec<String> = assigned.iter().map(|(code, _)| code.clone()).collect();
        let rows_affected = db
            .update_assignments(
                &params.report_prefix,
                &params.business_unit,
                &codes,
                &params.changes,
            )
            .await?;
        info!(
            report_prefix = %params.report_prefix,
            roles = codes.len(),
            rows_affected,
            "assignments updated"
        );

        to_json(&BulkUpdateResponse {
            report_prefix: params.report_prefix,
            business_unit: params.business_unit,
            rows_affected,
            roles: assigned
                .into_iter()
                .map(|(code, description)| UpdatedRole { code, description })
                .collect(),
            changed: supplied_fields(&params.changes),
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> AssignmentRow {
        AssignmentRow {
            role: "supervisor".into(),
            report_prefix: "rpt_sales".into(),
            business_unit: "unit-01".into(),
            application_type: Some("sales_force".into()),
            order: Some(3),
            custom_tag: None,
            sales_office: None,
            center_logistical: None,
            role_description: Some("Supervisor".into()),
        }
    }

    #[test]
    fn diff_reports_only_supplied_fields() {
        let changes = AssignmentUpdate {
            order: Some(7),
            ..Default::default()
        };
        let diff = diff_changes(&sample_row(), &changes);
        assert_eq!(
            diff,
            vec![FieldChange {
                field: "order",
                from: Some("3".into()),
                to: "7".into(),
            }]
        );
    }

    #[test]
    fn diff_shows_previously_unset_fields() {
        let changes = AssignmentUpdate {
            custom_tag: Some("promo".into()),
            ..Default::default()
        };
        let diff = diff_changes(&sample_row(), &changes);
        assert_eq!(
            diff,
            vec![FieldChange {
                field: "custom_tag",
                from: None,
                to: "promo".into(),
            }]
        );
    }

    #[test]
    fn supplied_fields_lists_present_changes() {
        let changes = AssignmentUpdate {
            application_type: Some("merchandising".into()),
            sales_office: Some("north".into()),
            ..Default::default()
        };
        assert_eq!(supplied_fields(&changes), vec!["application_type", "sales_office"]);
        assert!(supplied_fields(&AssignmentUpdate::default()).is_empty());
    }

    #[test]
    fn application_type_validation() {
        let err = invalid_application_type("backoffice");
        assert_eq!(err.error.code, McpErrorCode::InvalidArguments);
        assert!(err.error.message.contains("sales_force"));
    }
}
