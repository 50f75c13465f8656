pub mod client;

pub use client::{AssignmentRow, ColumnInfo, DbClient, DbError, QueryPreview, RoleRow};

use crate::protocol::{McpErrorCode, McpErrorResponse};

/// Map driver failures onto the domain error taxonomy. The driver message is
/// kept so agents can see the actual SQL Server diagnostic.
impl From<DbError> for McpErrorResponse {
    fn from(err: DbError) -> Self {
        match &err {
            DbError::Connect(_) | DbError::Io(_) => {
                Self::new(McpErrorCode::ConnectionFailed, err.to_string())
            }
            DbError::Query(_) => Self::new(McpErrorCode::QueryFailed, err.to_string()),
            DbError::Decode(_) => Self::new(McpErrorCode::InternalError, err.to_string()),
        }
    }
}
