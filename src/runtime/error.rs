//! Runtime conversion and version errors
//!
//! Raised by generated wrappers and builders (and by the dynamic
//! interpreter), never by the generator. Every variant names the field and
//! version it happened in.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result type for runtime conversions
pub type ConversionResult<T> = std::result::Result<T, ConversionError>;

/// Stable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    /// CONV-001: enum member not declared in the target version
    EnumValueNotSupported,
    /// CONV-002: numeric value outside the target type's range
    ValueOutOfRange,
    /// CONV-003: field does not exist in this version
    FieldNotAvailable,
    /// CONV-004: value has the wrong shape for the target
    TypeMismatch,
    /// CONV-005: setter of the other representation family
    UnsupportedOperation,
    /// VER-001: unknown version identifier
    VersionNotSupported,
    /// VER-002: message does not exist in the requested version
    MessageNotFound,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnumValueNotSupported => "CONV-001",
            Self::ValueOutOfRange => "CONV-002",
            Self::FieldNotAvailable => "CONV-003",
            Self::TypeMismatch => "CONV-004",
            Self::UnsupportedOperation => "CONV-005",
            Self::VersionNotSupported => "VER-001",
            Self::MessageNotFound => "VER-002",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("[CONV-001] {enumeration} value {value} is not supported in version {version} (field '{field}')")]
    EnumValueNotSupported {
        field: String,
        enumeration: String,
        value: i64,
        version: String,
    },

    #[error("[CONV-002] Value {value} for field '{field}' exceeds {target} range [{min}, {max}] in version {version}")]
    ValueOutOfRange {
        field: String,
        value: String,
        target: String,
        min: String,
        max: String,
        version: String,
    },

    #[error("[CONV-003] Field '{field}' is not available in version {version}")]
    FieldNotAvailable { field: String, version: String },

    #[error("[CONV-004] Type mismatch for field '{field}' in version {version}: {reason}")]
    TypeMismatch {
        field: String,
        version: String,
        reason: String,
    },

    #[error("[CONV-005] Operation '{operation}' on field '{field}' is not supported in version {version}")]
    UnsupportedOperation {
        field: String,
        operation: String,
        version: String,
    },

    #[error("[VER-001] Version '{requested}' is not supported (supported: {})", .supported.join(", "))]
    VersionNotSupported { requested: String, supported: Vec<String> },

    #[error("[VER-002] Message '{message}' not found in version {version}")]
    MessageNotFound { message: String, version: String },
}

impl ConversionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::EnumValueNotSupported { .. } => ErrorCode::EnumValueNotSupported,
            Self::ValueOutOfRange { .. } => ErrorCode::ValueOutOfRange,
            Self::FieldNotAvailable { .. } => ErrorCode::FieldNotAvailable,
            Self::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Self::UnsupportedOperation { .. } => ErrorCode::UnsupportedOperation,
            Self::VersionNotSupported { .. } => ErrorCode::VersionNotSupported,
            Self::MessageNotFound { .. } => ErrorCode::MessageNotFound,
        }
    }

    /// Field the error concerns, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::EnumValueNotSupported { field, .. }
            | Self::ValueOutOfRange { field, .. }
            | Self::FieldNotAvailable { field, .. }
            | Self::TypeMismatch { field, .. }
            | Self::UnsupportedOperation { field, .. } => Some(field),
            Self::VersionNotSupported { .. } | Self::MessageNotFound { .. } => None,
        }
    }

    /// Version the error concerns
    pub fn version(&self) -> &str {
        match self {
            Self::EnumValueNotSupported { version, .. }
            | Self::ValueOutOfRange { version, .. }
            | Self::FieldNotAvailable { version, .. }
            | Self::TypeMismatch { version, .. }
            | Self::UnsupportedOperation { version, .. }
            | Self::MessageNotFound { version, .. } => version,
            Self::VersionNotSupported { requested, .. } => requested,
        }
    }

    pub fn not_available(field: &str, version: &str) -> Self {
        Self::FieldNotAvailable {
            field: field.to_string(),
            version: version.to_string(),
        }
    }

    pub fn unsupported(field: &str, operation: &str, version: &str) -> Self {
        Self::UnsupportedOperation {
            field: field.to_string(),
            operation: operation.to_string(),
            version: version.to_string(),
        }
    }

    pub fn mismatch(field: &str, version: &str, reason: impl Into<String>) -> Self {
        Self::TypeMismatch {
            field: field.to_string(),
            version: version.to_string(),
            reason: reason.into(),
        }
    }

    pub fn enum_not_supported(field: &str, enumeration: &str, value: i64, version: &str) -> Self {
        Self::EnumValueNotSupported {
            field: field.to_string(),
            enumeration: enumeration.to_string(),
            value,
            version: version.to_string(),
        }
    }

    pub fn version_not_supported<S: AsRef<str>>(requested: &str, supported: &[S]) -> Self {
        Self::VersionNotSupported {
            requested: requested.to_string(),
            supported: supported.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    pub fn message_not_found(message: &str, version: &str) -> Self {
        Self::MessageNotFound {
            message: message.to_string(),
            version: version.to_string(),
        }
    }
}
