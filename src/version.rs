//! Schema version identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SchemaError};

/// Identifier of one schema version (e.g. "v1", "v202").
///
/// Identifiers are opaque strings; ordering between versions comes from the
/// order in which they are supplied to the merger, never from the text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    /// Create a version identifier, rejecting blank or non-identifier text
    pub fn parse(id: &str) -> Result<Self> {
        let trimmed = id.trim();
        if trimmed.is_empty()
            || !trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
        {
            return Err(SchemaError::InvalidVersion(id.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier as a lowercase module segment ("v1.2" -> "v1_2",
    /// "2024-06" -> "v2024_06")
    pub fn module_segment(&self) -> String {
        let segment: String = self
            .0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        if segment.starts_with(|c: char| c.is_ascii_digit()) {
            format!("v{}", segment)
        } else {
            segment
        }
    }

    /// Identifier as a type-name suffix ("v1.2" -> "V1_2")
    pub fn type_suffix(&self) -> String {
        let segment = self.module_segment();
        let mut chars = segment.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VersionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for VersionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered set of versions taking part in a merge.
///
/// The last version is the default (latest) one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionSet(Vec<VersionId>);

impl VersionSet {
    /// Build a set, rejecting duplicates and empty input
    pub fn new(versions: Vec<VersionId>) -> Result<Self> {
        if versions.is_empty() {
            return Err(SchemaError::NoVersions);
        }
        for (i, version) in versions.iter().enumerate() {
            if versions[..i].contains(version) {
                return Err(SchemaError::DuplicateVersion(version.to_string()));
            }
        }
        Ok(Self(versions))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VersionId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, version: &str) -> bool {
        self.0.iter().any(|v| v.as_str() == version)
    }

    /// Position of a version in merge order
    pub fn position(&self, version: &VersionId) -> Option<usize> {
        self.0.iter().position(|v| v == version)
    }

    /// The default (latest) version
    pub fn latest(&self) -> Option<&VersionId> {
        self.0.last()
    }

    pub fn as_slice(&self) -> &[VersionId] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a VersionSet {
    type Item = &'a VersionId;
    type IntoIter = std::slice::Iter<'a, VersionId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
