use std::collections::BTreeMap;

use serde::Serialize;
use tiberius::{AuthMethod, Client, ColumnData, Config as TdsConfig, Query, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::config::DatabaseProfile;
use crate::protocol::{AssignmentSpec, AssignmentUpdate, ReportSpec};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("connection failed: {0}")]
    Connect(#[source] tiberius::error::Error),

    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("query failed: {0}")]
    Query(#[source] tiberius::error::Error),

    #[error("unexpected row shape: {0}")]
    Decode(String),
}

/// One column of a table, as read from `INFORMATION_SCHEMA.COLUMNS`.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i32>,
    pub nullable: bool,
}

/// A role row from `default_roles`.
#[derive(Debug, Clone, Serialize)]
pub struct RoleRow {
    pub code: String,
    pub description: String,
    pub application_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

/// An assignment row from `assigned_reports`, with the joined role description.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentRow {
    pub role: String,
    pub report_prefix: String,
    pub business_unit: String,
    pub application_type: Option<String>,
    pub order: Option<i32>,
    pub custom_tag: Option<String>,
    pub sales_office: Option<String>,
    pub center_logistical: Option<String>,
    pub role_description: Option<String>,
}

/// The outcome of a trial query run: column names, a bounded sample of rows
/// rendered as strings, and the full row count.
#[derive(Debug, Clone, Serialize)]
pub struct QueryPreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

const ASSIGNMENT_SELECT: &str = "SELECT ar.[role], ar.report_prefix, ar.business_unit, \
     ar.application_type, ar.[order], ar.custom_tag, ar.sales_office, ar.center_logistical, \
     dr.[description] as role_description \
     FROM assigned_reports ar \
     LEFT JOIN default_roles dr ON ar.[role] = dr.[code] AND ar.business_unit = dr.business_unit";

/// A live connection to one database profile. Opened per tool call and
/// dropped when the call finishes.
pub struct DbClient {
    client: Client<Compat<TcpStream>>,
    pub database: String,
}

impl DbClient {
    pub async fn connect(profile: &DatabaseProfile) -> Result<Self, DbError> {
        let mut config = TdsConfig::new();
        config.host(&profile.host);
        config.port(profile.port);
        config.database(&profile.database);
        config.authentication(AuthMethod::sql_server(&profile.username, &profile.password));
        config.trust_cert();

        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(DbError::Connect)?;

        debug!(database = %profile.database, "connected");
        Ok(Self {
            client,
            database: profile.database.clone(),
        })
    }

    /// Columns of one table, in ordinal position order.
    pub async fn table_columns(&mut self, table_name: &str) -> Result<Vec<ColumnInfo>, DbError> {
        let mut q = Query::new(
            "SELECT COLUMN_NAME, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH, IS_NULLABLE \
             FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_NAME = @P1 \
             ORDER BY ORDINAL_POSITION",
        );
        q.bind(table_name);

        let rows = q
            .query(&mut self.client)
            .await
            .map_err(DbError::Query)?
            .into_first_result()
            .await
            .map_err(DbError::Query)?;

        rows.iter().map(column_info).collect()
    }

    /// Base tables of a schema, sorted by name.
    pub async fn tables_in_schema(&mut self, schema: &str) -> Result<Vec<String>, DbError> {
        let mut q = Query::new(
            "SELECT TABLE_NAME \
             FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = @P1 AND TABLE_TYPE = 'BASE TABLE' \
             ORDER BY TABLE_NAME",
        );
        q.bind(schema);

        let rows = q
            .query(&mut self.client)
            .await
            .map_err(DbError::Query)?
            .into_first_result()
            .await
            .map_err(DbError::Query)?;

        rows.iter().map(|row| get_str(row, "TABLE_NAME")).collect()
    }

    /// Columns of several tables at once, grouped by table name.
    pub async fn columns_for_tables(
        &mut self,
        table_names: &[String],
    ) -> Result<BTreeMap<String, Vec<ColumnInfo>>, DbError> {
        let sql = format!(
            "SELECT TABLE_NAME, COLUMN_NAME, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH, IS_NULLABLE \
             FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_NAME IN ({}) \
             ORDER BY TABLE_NAME, ORDINAL_POSITION",
            in_placeholders(1, table_names.len())
        );
        let mut q = Query::new(sql);
        for name in table_names {
            q.bind(name.as_str());
        }

        let rows = q
            .query(&mut self.client)
            .await
            .map_err(DbError::Query)?
            .into_first_result()
            .await
            .map_err(DbError::Query)?;

        let mut grouped: BTreeMap<String, Vec<ColumnInfo>> = BTreeMap::new();
        for row in &rows {
            let table = get_str(row, "TABLE_NAME")?;
            grouped.entry(table).or_default().push(column_info(row)?);
        }
        Ok(grouped)
    }

    /// Run a query with `business_unit` bound as `@P1` and render at most
    /// `limit` rows.
    pub async fn preview_query(
        &mut self,
        sql: &str,
        business_unit: &str,
        limit: usize,
    ) -> Result<QueryPreview, DbError> {
        let mut q = Query::new(sql.to_string());
        q.bind(business_unit);

        let mut stream = q.query(&mut self.client).await.map_err(DbError::Query)?;
        let columns: Vec<String> = stream
            .columns()
            .await
            .map_err(DbError::Query)?
            .map(|cols| cols.iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let rows = stream.into_first_result().await.map_err(DbError::Query)?;
        let total_rows = rows.len();
        let rendered = rows.into_iter().take(limit).map(render_row).collect();

        Ok(QueryPreview {
            columns,
            rows: rendered,
            total_rows,
        })
    }

    /// Run `sp_ecosystem_create_columns_config` for one report definition.
    /// `@type` is always `'report'` and `@table_number` always `1`.
    pub async fn exec_create_report(
        &mut self,
        spec: &ReportSpec,
        params_json: &str,
    ) -> Result<(), DbError> {
        let mut q = Query::new(
            "EXEC sp_ecosystem_create_columns_config \
             @P1, @P2, @P3, 'report', 1, @P4, @P5, @P6, @P7, @P8, @P9, @P10, @P11, @P12, @P13, @P14",
        );
        q.bind(spec.report_prefix.as_str());
        q.bind(spec.report_description_en.as_str());
        q.bind(spec.report_description_es.as_str());
        q.bind(spec.query.as_str());
        q.bind(params_json);
        q.bind(spec.is_detail);
        q.bind(spec.has_detail);
        q.bind(spec.action_column.as_deref());
        q.bind(spec.detail_prefix.as_deref());
        q.bind(spec.detail_mode.as_deref());
        q.bind(spec.open_another_tab);
        q.bind(spec.type_resource.as_str());
        q.bind(spec.columns_to_render.as_deref());
        q.bind(spec.default_for_all);

        q.execute(&mut self.client).await.map_err(DbError::Query)?;
        Ok(())
    }

    /// Roles matching a description fragment, excluding `sys_admin`.
    pub async fn find_roles(
        &mut self,
        business_unit: &str,
        description: &str,
    ) -> Result<Vec<RoleRow>, DbError> {
        let mut q = Query::new(
            "SELECT [code], [description], [application_type] \
             FROM default_roles \
             WHERE business_unit = @P1 AND [description] LIKE @P2 \
             AND application_type != 'sys_admin'",
        );
        q.bind(business_unit);
        q.bind(format!("%{description}%"));

        let rows = q
            .query(&mut self.client)
            .await
            .map_err(DbError::Query)?
            .into_first_result()
            .await
            .map_err(DbError::Query)?;

        rows.iter()
            .map(|row| {
                Ok(RoleRow {
                    code: get_str(row, "code")?,
                    description: get_str(row, "description")?,
                    application_type: get_str(row, "application_type")?,
                    order: None,
                })
            })
            .collect()
    }

    /// All roles for a business unit, excluding `sys_admin`, in display order.
    pub async fn list_roles(&mut self, business_unit: &str) -> Result<Vec<RoleRow>, DbError> {
        let mut q = Query::new(
            "SELECT [code], [description], [application_type], [order_] \
             FROM default_roles \
             WHERE business_unit = @P1 AND application_type != 'sys_admin' \
             ORDER BY [order_], [description]",
        );
        q.bind(business_unit);

        let rows = q
            .query(&mut self.client)
            .await
            .map_err(DbError::Query)?
            .into_first_result()
            .await
            .map_err(DbError::Query)?;

        rows.iter()
            .map(|row| {
                Ok(RoleRow {
                    code: get_str(row, "code")?,
                    description: get_str(row, "description")?,
                    application_type: get_str(row, "application_type")?,
                    order: get_opt_i32(row, "order_")?,
                })
            })
            .collect()
    }

    pub async fn assignment_exists(
        &mut self,
        business_unit: &str,
        report_prefix: &str,
        role_code: &str,
    ) -> Result<bool, DbError> {
        let mut q = Query::new(
            "SELECT COUNT(*) FROM assigned_reports \
             WHERE business_unit = @P1 AND report_prefix = @P2 AND [role] = @P3",
        );
        q.bind(business_unit);
        q.bind(report_prefix);
        q.bind(role_code);

        let rows = q
            .query(&mut self.client)
            .await
            .map_err(DbError::Query)?
            .into_first_result()
            .await
            .map_err(DbError::Query)?;

        let row = rows
            .first()
            .ok_or_else(|| DbError::Decode("COUNT query returned no rows".into()))?;
        let count: i32 = row
            .try_get(0)
            .map_err(|e| DbError::Decode(e.to_string()))?
            .ok_or_else(|| DbError::Decode("COUNT returned NULL".into()))?;
        Ok(count > 0)
    }

    pub async fn insert_assignment(
        &mut self,
        spec: &AssignmentSpec,
        role_code: &str,
    ) -> Result<(), DbError> {
        let mut q = Query::new(
            "INSERT INTO assigned_reports ( \
             [role], report_prefix, business_unit, application_type, [order], \
             custom_tag, sales_office, center_logistical \
             ) VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7, @P8)",
        );
        q.bind(role_code);
        q.bind(spec.report_prefix.as_str());
        q.bind(spec.business_unit.as_str());
        q.bind(spec.application_type.as_deref());
        q.bind(spec.order);
        q.bind(spec.custom_tag.as_deref());
        q.bind(spec.sales_office.as_deref());
        q.bind(spec.center_logistical.as_deref());

        q.execute(&mut self.client).await.map_err(DbError::Query)?;
        Ok(())
    }

    /// Assignments of one report, optionally restricted to a business unit.
    pub async fn assignments_for_report(
        &mut self,
        report_prefix: &str,
        business_unit: Option<&str>,
    ) -> Result<Vec<AssignmentRow>, DbError> {
        let rows = match business_unit {
            Some(bu) => {
                let sql = format!(
                    "{ASSIGNMENT_SELECT} \
                     WHERE ar.report_prefix = @P1 AND ar.business_unit = @P2 \
                     ORDER BY ar.[order], dr.[description]"
                );
                let mut q = Query::new(sql);
                q.bind(report_prefix);
                q.bind(bu);
                q.query(&mut self.client)
                    .await
                    .map_err(DbError::Query)?
                    .into_first_result()
                    .await
                    .map_err(DbError::Query)?
            }
            None => {
                let sql = format!(
                    "{ASSIGNMENT_SELECT} \
                     WHERE ar.report_prefix = @P1 \
                     ORDER BY ar.business_unit, ar.[order], dr.[description]"
                );
                let mut q = Query::new(sql);
                q.bind(report_prefix);
                q.query(&mut self.client)
                    .await
                    .map_err(DbError::Query)?
                    .into_first_result()
                    .await
                    .map_err(DbError::Query)?
            }
        };

        rows.iter().map(assignment_row).collect()
    }

    /// Assignments of several reports at once.
    pub async fn assignments_for_reports(
        &mut self,
        report_prefixes: &[String],
        business_unit: Option<&str>,
    ) -> Result<Vec<AssignmentRow>, DbError> {
        let placeholders = in_placeholders(1, report_prefixes.len());
        let rows = match business_unit {
            Some(bu) => {
                let sql = format!(
                    "{ASSIGNMENT_SELECT} \
                     WHERE ar.report_prefix IN ({placeholders}) AND ar.business_unit = @P{} \
                     ORDER BY ar.report_prefix, ar.[order], dr.[description]",
                    report_prefixes.len() + 1
                );
                let mut q = Query::new(sql);
                for prefix in report_prefixes {
                    q.bind(prefix.as_str());
                }
                q.bind(bu);
                q.query(&mut self.client)
                    .await
                    .map_err(DbError::Query)?
                    .into_first_result()
                    .await
                    .map_err(DbError::Query)?
            }
            None => {
                let sql = format!(
                    "{ASSIGNMENT_SELECT} \
                     WHERE ar.report_prefix IN ({placeholders}) \
                     ORDER BY ar.business_unit, ar.report_prefix, ar.[order], dr.[description]"
                );
                let mut q = Query::new(sql);
                for prefix in report_prefixes {
                    q.bind(prefix.as_str());
                }
                q.query(&mut self.client)
                    .await
                    .map_err(DbError::Query)?
                    .into_first_result()
                    .await
                    .map_err(DbError::Query)?
            }
        };

        rows.iter().map(assignment_row).collect()
    }

    /// One specific assignment, if present.
    pub async fn assignment(
        &mut self,
        report_prefix: &str,
        business_unit: &str,
        role_code: &str,
    ) -> Result<Option<AssignmentRow>, DbError> {
        let sql = format!(
            "{ASSIGNMENT_SELECT} \
             WHERE ar.report_prefix = @P1 AND ar.business_unit = @P2 AND ar.[role] = @P3"
        );
        let mut q = Query::new(sql);
        q.bind(report_prefix);
        q.bind(business_unit);
        q.bind(role_code);

        let rows = q
            .query(&mut self.client)
            .await
            .map_err(DbError::Query)?
            .into_first_result()
            .await
            .map_err(DbError::Query)?;

        rows.first().map(assignment_row).transpose()
    }

    /// Role code and joined description for each assigned role in the list.
    pub async fn assigned_roles(
        &mut self,
        report_prefix: &str,
        business_unit: &str,
        role_codes: &[String],
    ) -> Result<Vec<(String, Option<String>)>, DbError> {
        let sql = format!(
            "SELECT ar.[role], dr.[description] as role_description \
             FROM assigned_reports ar \
             LEFT JOIN default_roles dr ON ar.[role] = dr.[code] \
             AND ar.business_unit = dr.business_unit \
             WHERE ar.business_unit = @P1 AND ar.report_prefix = @P2 \
             AND ar.[role] IN ({}) \
             ORDER BY ar.[role]",
            in_placeholders(3, role_codes.len())
        );
        let mut q = Query::new(sql);
        q.bind(business_unit);
        q.bind(report_prefix);
        for code in role_codes {
            q.bind(code.as_str());
        }

        let rows = q
            .query(&mut self.client)
            .await
            .map_err(DbError::Query)?
            .into_first_result()
            .await
            .map_err(DbError::Query)?;

        rows.iter()
            .map(|row| Ok((get_str(row, "role")?, get_opt_str(row, "role_description")?)))
            .collect()
    }

    /// Apply a partial update to the assignments of one report for a set of
    /// roles. Returns the number of rows affected. The caller must have
    /// verified that `changes` is non-empty and `role_codes` is non-empty.
    pub async fn update_assignments(
        &mut self,
        report_prefix: &str,
        business_unit: &str,
        role_codes: &[String],
        changes: &AssignmentUpdate,
    ) -> Result<u64, DbError> {
        let sql = update_statement(changes, role_codes.len())
            .ok_or_else(|| DbError::Decode("no fields to update".into()))?;
        let mut q = Query::new(sql);

        // Bind order must mirror update_statement's placeholder numbering:
        // changed columns first, then business_unit, report_prefix, roles.
        if let Some(v) = &changes.application_type {
            q.bind(v.as_str());
        }
        if let Some(v) = changes.order {
            q.bind(v);
        }
        if let Some(v) = &changes.custom_tag {
            q.bind(v.as_str());
        }
        if let Some(v) = &changes.sales_office {
            q.bind(v.as_str());
        }
        if let Some(v) = &changes.center_logistical {
            q.bind(v.as_str());
        }
        q.bind(business_unit);
        q.bind(report_prefix);
        for code in role_codes {
            q.bind(code.as_str());
        }

        let result = q.execute(&mut self.client).await.map_err(DbError::Query)?;
        Ok(result.total())
    }
}

/// `@Pn,@Pn+1,...` for a dynamic IN list starting at placeholder `start`.
fn in_placeholders(start: usize, count: usize) -> String {
    (0..count)
        .map(|i| format!("@P{}", start + i))
        .collect::<Vec<_>>()
        .join(",")
}

/// The UPDATE statement for a partial assignment update, or None when there
/// is nothing to change.
fn update_statement(changes: &AssignmentUpdate, role_count: usize) -> Option<String> {
    let columns = changed_columns(changes);
    if columns.is_empty() || role_count == 0 {
        return None;
    }

    let sets: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{col} = @P{}", i + 1))
        .collect();
    let base = columns.len();

    Some(format!(
        "UPDATE assigned_reports SET {} \
         WHERE business_unit = @P{} AND report_prefix = @P{} AND [role] IN ({})",
        sets.join(", "),
        base + 1,
        base + 2,
        in_placeholders(base + 3, role_count)
    ))
}

fn changed_columns(changes: &AssignmentUpdate) -> Vec<&'static str> {
    let mut columns = Vec::new();
    if changes.application_type.is_some() {
        columns.push("application_type");
    }
    if changes.order.is_some() {
        columns.push("[order]");
    }
    if changes.custom_tag.is_some() {
        columns.push("custom_tag");
    }
    if changes.sales_office.is_some() {
        columns.push("sales_office");
    }
    if changes.center_logistical.is_some() {
        columns.push("center_logistical");
    }
    columns
}

fn column_info(row: &Row) -> Result<ColumnInfo, DbError> {
    Ok(ColumnInfo {
        name: get_str(row, "COLUMN_NAME")?,
        data_type: get_str(row, "DATA_TYPE")?,
        max_length: get_opt_i32(row, "CHARACTER_MAXIMUM_LENGTH")?,
        nullable: get_str(row, "IS_NULLABLE")? == "YES",
    })
}

fn assignment_row(row: &Row) -> Result<AssignmentRow, DbError> {
    Ok(AssignmentRow {
        role: get_str(row, "role")?,
        report_prefix: get_str(row, "report_prefix")?,
        business_unit: get_str(row, "business_unit")?,
        application_type: get_opt_str(row, "application_type")?,
        order: get_opt_i32(row, "order")?,
        custom_tag: get_opt_str(row, "custom_tag")?,
        sales_office: get_opt_str(row, "sales_office")?,
        center_logistical: get_opt_str(row, "center_logistical")?,
        role_description: get_opt_str(row, "role_description")?,
    })
}

fn get_str(row: &Row, column: &str) -> Result<String, DbError> {
    get_opt_str(row, column)?.ok_or_else(|| DbError::Decode(format!("{column} was NULL")))
}

fn get_opt_str(row: &Row, column: &str) -> Result<Option<String>, DbError> {
    row.try_get::<&str, _>(column)
        .map(|v| v.map(str::to_string))
        .map_err(|e| DbError::Decode(e.to_string()))
}

fn get_opt_i32(row: &Row, column: &str) -> Result<Option<i32>, DbError> {
    row.try_get::<i32, _>(column)
        .map_err(|e| DbError::Decode(e.to_string()))
}

/// Render every cell of a row as a display string for query previews.
fn render_row(row: Row) -> Vec<String> {
    row.into_iter().map(|cell| render_cell(&cell)).collect()
}

fn render_cell(cell: &ColumnData<'_>) -> String {
    match cell {
        ColumnData::Bit(None)
        | ColumnData::U8(None)
        | ColumnData::I16(None)
        | ColumnData::I32(None)
        | ColumnData::I64(None)
        | ColumnData::F32(None)
        | ColumnData::F64(None)
        | ColumnData::String(None)
        | ColumnData::Guid(None)
        | ColumnData::Numeric(None)
        | ColumnData::Binary(None) => "NULL".to_string(),
        ColumnData::Bit(Some(v)) => v.to_string(),
        ColumnData::U8(Some(v)) => v.to_string(),
        ColumnData::I16(Some(v)) => v.to_string(),
        ColumnData::I32(Some(v)) => v.to_string(),
        ColumnData::I64(Some(v)) => v.to_string(),
        ColumnData::F32(Some(v)) => v.to_string(),
        ColumnData::F64(Some(v)) => v.to_string(),
        ColumnData::String(Some(s)) => s.to_string(),
        ColumnData::Guid(Some(g)) => g.to_string(),
        ColumnData::Numeric(Some(n)) => format!("{}", f64::from(*n)),
        ColumnData::Binary(Some(b)) => format!("<{} bytes>", b.len()),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_placeholders_numbering() {
        assert_eq!(in_placeholders(1, 3), "@P1,@P2,@P3");
        assert_eq!(in_placeholders(4, 2), "@P4,@P5");
        assert_eq!(in_placeholders(1, 0), "");
    }

    #[test]
    fn update_statement_orders_placeholders() {
        let changes = AssignmentUpdate {
            order: Some(2),
            custom_tag: Some("tag".into()),
            ..Default::default()
        };
        let sql = update_statement(&changes, 2).unwrap();
        assert_eq!(
            sql,
            "UPDATE assigned_reports SET [order] = @P1, custom_tag = @P2 \
             WHERE business_unit = @P3 AND report_prefix = @P4 AND [role] IN (@P5,@P6)"
        );
    }

    #[test]
    fn update_statement_requires_changes_and_roles() {
        assert!(update_statement(&AssignmentUpdate::default(), 2).is_none());
        let changes = AssignmentUpdate {
            order: Some(1),
            ..Default::default()
        };
        assert!(update_statement(&changes, 0).is_none());
    }

    #[test]
    fn render_cell_common_types() {
        assert_eq!(render_cell(&ColumnData::I32(Some(42))), "42");
        assert_eq!(render_cell(&ColumnData::Bit(Some(true))), "true");
        assert_eq!(
            render_cell(&ColumnData::String(Some("unit-01".into()))),
            "unit-01"
        );
        assert_eq!(render_cell(&ColumnData::String(None)), "NULL");
        assert_eq!(render_cell(&ColumnData::I64(None)), "NULL");
    }
}
