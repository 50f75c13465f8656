//! Build-time tool catalog dump.
//!
//! Produces a JSON artifact describing every advertised tool so deployment
//! pipelines can inspect the catalog without a database. Introspection never
//! fails the caller: when the catalog cannot be produced, a fallback document
//! carrying the error is written instead.

use std::path::Path;

use serde_json::json;
use tracing::warn;

use crate::catalog;
use crate::schema::{self, SchemaValidationError};

#[derive(Debug, thiserror::Error)]
pub enum IntrospectError {
    #[error("schema for tool '{tool}' is invalid: {source}")]
    BadSchema {
        tool: &'static str,
        #[source]
        source: SchemaValidationError,
    },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The full catalog as pretty-printed JSON. Every input schema is compiled
/// first so a malformed schema surfaces here rather than at call time.
pub fn catalog_document() -> Result<String, IntrospectError> {
    let tools = catalog::tools();
    for tool in &tools {
        schema::compile_check(&tool.input_schema).map_err(|source| IntrospectError::BadSchema {
            tool: tool.name,
            source,
        })?;
    }
    Ok(serde_json::to_string_pretty(&json!({ "tools": tools }))?)
}

/// The document written when catalog production fails.
pub fn fallback_document(err: &IntrospectError) -> String {
    json!({ "error": err.to_string() }).to_string()
}

/// Write the catalog artifact to `path`. A catalog failure is downgraded to
/// the fallback document; only the filesystem write itself can fail.
pub fn write_artifact(path: &Path) -> std::io::Result<()> {
    let document = match catalog_document() {
        Ok(doc) => doc,
        Err(e) => {
            warn!("catalog introspection failed: {e}");
            fallback_document(&e)
        }
    };
    std::fs::write(path, document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_document_lists_every_tool() {
        let doc = catalog_document().unwrap();
        let value: serde_json::Value = serde_json::from_str(&doc).unwrap();
        let tools = value["tools"].as_array().unwrap();
        assert_eq!(tools.len(), catalog::tools().len());
        for tool in tools {
            assert!(tool["name"].is_string());
            assert!(tool["inputSchema"].is_object());
        }
    }

    #[test]
    fn fallback_document_carries_the_error() {
        let err = IntrospectError::Serialize(serde::ser::Error::custom("boom"));
        let doc = fallback_document(&err);
        let value: serde_json::Value = serde_json::from_str(&doc).unwrap();
        assert!(value["error"].as_str().unwrap().contains("boom"));
    }
}
