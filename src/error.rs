//! Error types for schema merging and generation

use thiserror::Error;

/// Result type for merge and generation operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Fatal merge/generation errors.
///
/// Per-entity schema problems (incompatible types, reserved-field reuse, ...)
/// are not errors at this level; they are collected as
/// [`Diagnostics`](crate::diagnostics::Diagnostics) so unrelated entities
/// still generate.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("No schema versions supplied")]
    NoVersions,

    #[error("Duplicate version identifier: {0}")]
    DuplicateVersion(String),

    #[error("Invalid version identifier: {0:?}")]
    InvalidVersion(String),

    #[error("Invalid schema format: {0}")]
    InvalidFormat(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Generation failed for {entity}: {reason}")]
    Generation { entity: String, reason: String },

    #[error("Output sink rejected {unit}: {reason}")]
    Sink { unit: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}
