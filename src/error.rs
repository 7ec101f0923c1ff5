//! Error types for the schema engine and registry

use thiserror::Error;

use crate::engine::ValidationError;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema engine and registry errors
///
/// Registry failures are raised immediately. Per-field validation failures are
/// collected as [`ValidationError`] values and only surface here through
/// [`SchemaError::Validation`] when the caller asked for `throw_on_error`.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema not found: {id}")]
    SchemaNotFound { id: String },

    #[error("Version not found: {id} version {version}")]
    VersionNotFound { id: String, version: String },

    #[error("Invalid schema {id}: {}", reasons.join("; "))]
    InvalidSchema { id: String, reasons: Vec<String> },

    #[error("Version already exists: {id} version {version}")]
    VersionConflict { id: String, version: String },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Validation failed with {} error(s)", errors.len())]
    Validation { errors: Vec<ValidationError> },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    /// Shorthand for a malformed schema with a single reason
    pub fn invalid(id: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::InvalidSchema {
            id: id.into(),
            reasons: vec![reason.into()],
        }
    }

    /// Stable snake_case tag for this failure
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::SchemaNotFound { .. } => "schema_not_found",
            SchemaError::VersionNotFound { .. } => "version_not_found",
            SchemaError::InvalidSchema { .. } => "invalid_schema",
            SchemaError::VersionConflict { .. } => "version_conflict",
            SchemaError::InvalidIdentifier(_) => "invalid_identifier",
            SchemaError::Validation { .. } => "validation_failed",
            SchemaError::Storage(_) => "storage_error",
            SchemaError::Io(_) => "io_error",
            SchemaError::Json(_) => "json_error",
        }
    }
}
