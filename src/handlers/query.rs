//! Trial execution of report queries before they are registered.

use serde::Serialize;

use crate::config::ServerConfig;
use crate::db::{DbClient, QueryPreview};
use crate::protocol::{McpErrorCode, McpErrorResponse, TestQueryParams, ToolResult};

use super::{to_json, unknown_database, with_timeout};

/// How many sample rows a trial run returns.
pub(crate) const PREVIEW_ROWS: usize = 5;

/// Rewrite the `@business_unit` placeholder to a bound parameter. Returns
/// `None` when the query never references it, which is a caller error: every
/// report query must be business-unit scoped.
pub(crate) fn parameterize_business_unit(query: &str) -> Option<String> {
    if !query.contains("@business_unit") {
        return None;
    }
    Some(query.replace("@business_unit", "@P1"))
}

#[derive(Debug, Serialize)]
struct TestQueryResponse {
    database: String,
    business_unit: String,
    preview_rows: usize,
    #[serde(flatten)]
    preview: QueryPreview,
}

/// Handle a `test_query` tool call.
pub async fn test_query(params: TestQueryParams, config: &ServerConfig) -> ToolResult {
    let sql = match parameterize_business_unit(&params.query) {
        Some(sql) => sql,
        None => return McpErrorResponse::canonical(McpErrorCode::InvalidQuery).into(),
    };
    let profile = match config.profile(&params.database_key) {
        Some(p) => p.clone(),
        None => return unknown_database(&params.database_key).into(),
    };

    with_timeout(config, async move {
        let mut db = DbClient::connect(&profile).await?;
        let preview = db
            .preview_query(&sql, &params.business_unit, PREVIEW_ROWS)
            .await?;
        to_json(&TestQueryResponse {
            database: db.database.clone(),
            business_unit: params.business_unit,
            preview_rows: PREVIEW_ROWS,
            preview,
        })
    })
    .await
}
