//! Role listing for a business unit.

use serde::Serialize;

use crate::config::{ServerConfig, DEFAULT_DATABASE_KEY};
use crate::db::{DbClient, RoleRow};
use crate::protocol::{McpErrorCode, McpErrorResponse, RolesParams, ToolResult};

use super::{to_json, unknown_database, with_timeout};

#[derive(Debug, Serialize)]
struct RolesResponse {
    business_unit: String,
    roles: Vec<RoleRow>,
}

/// Handle a `list_available_roles` tool call. `sys_admin` roles are never
/// listed.
pub async fn list_available_roles(params: RolesParams, config: &ServerConfig) -> ToolResult {
    let Some(profile) = config.profile(DEFAULT_DATABASE_KEY).cloned() else {
        return unknown_database(DEFAULT_DATABASE_KEY).into();
    };

    with_timeout(config, async move {
        let mut db = DbClient::connect(&profile).await?;
        let roles = db.list_roles(&params.business_unit).await?;
        if roles.is_empty() {
            return Err(McpErrorResponse::new(
                McpErrorCode::RoleMissing,
                format!("No roles found for business unit '{}'", params.business_unit),
            ));
        }
        to_json(&RolesResponse {
            business_unit: params.business_unit,
            roles,
        })
    })
    .await
}
