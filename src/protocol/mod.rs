pub mod request;
pub mod response;

pub use request::{
    AssignmentSpec, AssignmentUpdate, BulkAssignParams, BulkAssignmentsQueryParams,
    BulkCreateReportsParams, BulkSearchParams, BulkUpdateAssignmentsParams, CrossDatabaseParams,
    InitializeParams, JsonRpcRequest, ListTablesParams, MultiTableParams,
    ReportAssignmentsParams, ReportSpec, RolesParams, RpcId, SearchTableParams,
    TableStructureParams, TestQueryParams, ToolCallParams, UpdateAssignmentParams,
};
pub use response::{
    JsonRpcError, JsonRpcResponse, McpError, McpErrorCode, McpErrorResponse, ToolResult,
    ToolResultContent,
};
