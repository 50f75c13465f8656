//! MCP server for the ecosystem report generator.
//!
//! Exposes SQL Server report-configuration tools (schema discovery, trial
//! query runs, report creation, role assignment) over JSON-RPC 2.0, either
//! on stdio or a TCP listener, compatible with any MCP-aware AI agent.

pub mod catalog;
pub mod config;
pub mod db;
pub mod handlers;
pub mod introspect;
pub mod protocol;
pub mod schema;
pub mod server;
