//! Schema discovery tools over `INFORMATION_SCHEMA`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::ServerConfig;
use crate::db::{ColumnInfo, DbClient};
use crate::protocol::{
    BulkSearchParams, CrossDatabaseParams, ListTablesParams, McpErrorCode, McpErrorResponse,
    MultiTableParams, SearchTableParams, TableStructureParams, ToolResult,
};

use super::{to_json, unknown_database, with_timeout};

#[derive(Debug, Serialize)]
struct TableStructureResponse {
    database: String,
    table: String,
    columns: Vec<ColumnInfo>,
}

/// Handle a `get_table_structure` tool call.
pub async fn get_table_structure(
    params: TableStructureParams,
    config: &ServerConfig,
) -> ToolResult {
    let profile = match config.profile(&params.database_key) {
        Some(p) => p.clone(),
        None => return unknown_database(&params.database_key).into(),
    };

    with_timeout(config, async move {
        let mut db = DbClient::connect(&profile).await?;
        let columns = db.table_columns(&params.table_name).await?;
        if columns.is_empty() {
            return Err(McpErrorResponse::new(
                McpErrorCode::TableMissing,
                format!(
                    "Table '{}' not found in database '{}'",
                    params.table_name, db.database
                ),
            ));
        }
        to_json(&TableStructureResponse {
            database: db.database.clone(),
            table: params.table_name,
            columns,
        })
    })
    .await
}

#[derive(Debug, Serialize)]
struct ListTablesResponse {
    database: String,
    schema: String,
    tables: Vec<String>,
}

/// Handle a `list_tables` tool call.
pub async fn list_tables(params: ListTablesParams, config: &ServerConfig) -> ToolResult {
    let profile = match config.profile(&params.database_key) {
        Some(p) => p.clone(),
        None => return unknown_database(&params.database_key).into(),
    };

    with_timeout(config, async move {
        let mut db = DbClient::connect(&profile).await?;
        let tables = db.tables_in_schema(&params.schema).await?;
        to_json(&ListTablesResponse {
            database: db.database.clone(),
            schema: params.schema,
            tables,
        })
    })
    .await
}

#[derive(Debug, Serialize)]
struct MultiTableResponse {
    database: String,
    tables: BTreeMap<String, Vec<ColumnInfo>>,
    missing: Vec<String>,
}

/// Handle a `get_multiple_table_structures` tool call.
pub async fn get_multiple_table_structures(
    params: MultiTableParams,
    config: &ServerConfig,
) -> ToolResult {
    if params.table_names.is_empty() {
        return McpErrorResponse::new(McpErrorCode::InvalidArguments, "No table names provided")
            .into();
    }
    let profile = match config.profile(&params.database_key) {
        Some(p) => p.clone(),
        None => return unknown_database(&params.database_key).into(),
    };

    with_timeout(config, async move {
        let mut db = DbClient::connect(&profile).await?;
        let tables = db.columns_for_tables(&params.table_names).await?;
        let missing = missing_tables(&params.table_names, &tables);
        to_json(&MultiTableResponse {
            database: db.database.clone(),
            tables,
            missing,
        })
    })
    .await
}

/// Per-database slot in an "across databases" response. A failing database
/// records its error and does not abort the rest.
#[derive(Debug, Serialize)]
struct DatabaseTables {
    database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    tables: BTreeMap<String, Vec<ColumnInfo>>,
    missing: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CrossDatabaseResponse {
    tables_requested: Vec<String>,
    databases: BTreeMap<String, DatabaseTables>,
}

/// Handle a `get_table_structures_across_databases` tool call.
pub async fn get_table_structures_across_databases(
    params: CrossDatabaseParams,
    config: &ServerConfig,
) -> ToolResult {
    if params.table_names.is_empty() {
        return McpErrorResponse::new(McpErrorCode::InvalidArguments, "No table names provided")
            .into();
    }
    let profiles = config.databases.clone();

    with_timeout(config, async move {
        let mut databases = BTreeMap::new();
        for (key, profile) in &profiles {
            let slot = match lookup_tables(profile, &params.table_names).await {
                Ok((tables, missing)) => DatabaseTables {
                    database: profile.database.clone(),
                    error: None,
                    tables,
                    missing,
                },
                Err(e) => DatabaseTables {
                    database: profile.database.clone(),
                    error: Some(e.to_string()),
                    tables: BTreeMap::new(),
                    missing: Vec::new(),
                },
            };
            databases.insert(key.clone(), slot);
        }
        to_json(&CrossDatabaseResponse {
            tables_requested: params.table_names,
            databases,
        })
    })
    .await
}

#[derive(Debug, Serialize)]
struct TableLookup {
    database: String,
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    columns: Vec<ColumnInfo>,
}

#[derive(Debug, Serialize)]
struct SearchTableResponse {
    table: String,
    databases: BTreeMap<String, TableLookup>,
}

/// Handle a `search_table_in_all_databases` tool call.
pub async fn search_table_in_all_databases(
    params: SearchTableParams,
    config: &ServerConfig,
) -> ToolResult {
    let profiles = config.databases.clone();

    with_timeout(config, async move {
        let mut databases = BTreeMap::new();
        for (key, profile) in &profiles {
            let slot = match lookup_one_table(profile, &params.table_name).await {
                Ok(columns) => TableLookup {
                    database: profile.database.clone(),
                    found: !columns.is_empty(),
                    error: None,
                    columns,
                },
                Err(e) => TableLookup {
                    database: profile.database.clone(),
                    found: false,
                    error: Some(e.to_string()),
                    columns: Vec::new(),
                },
            };
            databases.insert(key.clone(), slot);
        }
        to_json(&SearchTableResponse {
            table: params.table_name,
            databases,
        })
    })
    .await
}

#[derive(Debug, Serialize)]
struct DatabaseSearchResult {
    database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    found_count: usize,
    total_columns: usize,
    tables: BTreeMap<String, Vec<ColumnInfo>>,
    missing: Vec<String>,
}

#[derive(Debug, Serialize)]
struct BulkSearchResponse {
    tables_requested: Vec<String>,
    database_keys: Vec<String>,
    total_found: usize,
    databases: BTreeMap<String, DatabaseSearchResult>,
    /// For each requested table, the database names it was found in.
    summary: BTreeMap<String, Vec<String>>,
}

/// Handle a `bulk_search_tables_in_databases` tool call.
pub async fn bulk_search_tables_in_databases(
    params: BulkSearchParams,
    config: &ServerConfig,
) -> ToolResult {
    if params.table_names.is_empty() {
        return McpErrorResponse::new(McpErrorCode::InvalidArguments, "No table names provided")
            .into();
    }

    let keys = params
        .database_keys
        .clone()
        .unwrap_or_else(|| config.database_keys());

    let invalid: Vec<&String> = keys.iter().filter(|k| config.profile(k).is_none()).collect();
    if !invalid.is_empty() {
        let invalid = invalid
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let available = config.database_keys().join(", ");
        return McpErrorResponse::new(
            McpErrorCode::DatabaseUnknown,
            format!("Unknown database keys: {invalid}. Available: {available}"),
        )
        .into();
    }

    let profiles = config.databases.clone();

    with_timeout(config, async move {
        let mut databases = BTreeMap::new();
        let mut summary: BTreeMap<String, Vec<String>> = params
            .table_names
            .iter()
            .map(|t| (t.clone(), Vec::new()))
            .collect();
        let mut total_found = 0usize;

        for key in &keys {
            // Keys were validated above.
            let Some(profile) = profiles.get(key) else {
                continue;
            };
            let slot = match lookup_tables(profile, &params.table_names).await {
                Ok((tables, missing)) => {
                    total_found += tables.len();
                    for found in tables.keys() {
                        if let Some(entry) = summary.get_mut(found) {
                            entry.push(profile.database.clone());
                        }
                    }
                    DatabaseSearchResult {
                        database: profile.database.clone(),
                        error: None,
                        found_count: tables.len(),
                        total_columns: tables.values().map(Vec::len).sum(),
                        tables,
                        missing,
                    }
                }
                Err(e) => DatabaseSearchResult {
                    database: profile.database.clone(),
                    error: Some(e.to_string()),
                    found_count: 0,
                    total_columns: 0,
                    tables: BTreeMap::new(),
                    missing: Vec::new(),
                },
            };
            databases.insert(key.clone(), slot);
        }

        to_json(&BulkSearchResponse {
            tables_requested: params.table_names,
            database_keys: keys,
            total_found,
            databases,
            summary,
        })
    })
    .await
}

async fn lookup_tables(
    profile: &crate::config::DatabaseProfile,
    table_names: &[String],
) -> Result<(BTreeMap<String, Vec<ColumnInfo>>, Vec<String>), crate::db::DbError> {
    let mut db = DbClient::connect(profile).await?;
    let tables = db.columns_for_tables(table_names).await?;
    let missing = missing_tables(table_names, &tables);
    Ok((tables, missing))
}

async fn lookup_one_table(
    profile: &crate::config::DatabaseProfile,
    table_name: &str,
) -> Result<Vec<ColumnInfo>, crate::db::DbError> {
    let mut db = DbClient::connect(profile).await?;
    db.table_columns(table_name).await
}

/// Requested tables absent from the result map, sorted and deduplicated.
fn missing_tables(requested: &[String], found: &BTreeMap<String, Vec<ColumnInfo>>) -> Vec<String> {
    let mut missing: Vec<String> = requested
        .iter()
        .filter(|name| !found.contains_key(*name))
        .cloned()
        .collect();
    missing.sort();
    missing.dedup();
    missing
}
