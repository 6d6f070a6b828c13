//! Fingerprints for merged schemas and generator settings
//!
//! Two merges of identical inputs must produce identical fingerprints;
//! external build caches key generated output on them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::config::GeneratorConfig;
use crate::error::Result;
use crate::merged::MergedSchema;

/// SHA256 fingerprint of canonical JSON content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute fingerprint from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Fingerprint of any serializable value via its JSON form
    pub fn of<T: Serialize>(value: &T) -> Result<Self> {
        let canonical = serde_json::to_vec(value)?;
        Ok(Self::from_bytes(&canonical))
    }

    /// Fingerprint of a merged schema
    pub fn of_schema(schema: &MergedSchema) -> Result<Self> {
        Self::of(schema)
    }

    /// Combined fingerprint of a merged schema and the settings that shape
    /// generated output
    pub fn of_generation(schema: &MergedSchema, config: &GeneratorConfig) -> Result<Self> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(schema)?);
        hasher.update(serde_json::to_vec(&config.output)?);
        hasher.update(serde_json::to_vec(&config.mappings)?);
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for logs and file headers
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
