use jsonschema::validator_for;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum SchemaValidationError {
    #[error("Schema compile error: {0}")]
    SchemaCompile(String),
    #[error("{0}")]
    ValidationFailed(String),
}

/// Check that a JSON Schema (draft 2020-12) compiles.
pub fn compile_check(schema: &Value) -> Result<(), SchemaValidationError> {
    validator_for(schema)
        .map(|_| ())
        .map_err(|e| SchemaValidationError::SchemaCompile(e.to_string()))
}

/// Validate a JSON instance against a JSON Schema (draft 2020-12).
/// Returns Ok(()) if valid, the first validation error otherwise.
pub fn validate(schema: &Value, instance: &Value) -> Result<(), SchemaValidationError> {
    let validator = validator_for(schema)
        .map_err(|e| SchemaValidationError::SchemaCompile(e.to_string()))?;

    if let Some(err) = validator.iter_errors(instance).next() {
        return Err(SchemaValidationError::ValidationFailed(err.to_string()));
    }
    Ok(())
}
