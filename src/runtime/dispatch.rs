//! Version lookup
//!
//! String-keyed registry behind every version-dispatch factory. Insertion
//! order is version order; the last entry is the default version.

use super::error::{ConversionError, ConversionResult};

/// Ordered map from version identifier to a per-version factory
#[derive(Debug, Clone)]
pub struct VersionRegistry<F> {
    entries: Vec<(String, F)>,
}

impl<F> Default for VersionRegistry<F> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<F> VersionRegistry<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a version; re-registering replaces the factory in place
    pub fn register(mut self, version: impl Into<String>, factory: F) -> Self {
        let version = version.into();
        match self.entries.iter_mut().find(|(v, _)| *v == version) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((version, factory)),
        }
        self
    }

    /// Factory for a version, or version-not-supported naming the known set
    pub fn get(&self, version: &str) -> ConversionResult<&F> {
        self.entries
            .iter()
            .find(|(v, _)| v == version)
            .map(|(_, f)| f)
            .ok_or_else(|| ConversionError::version_not_supported(version, &self.supported()))
    }

    pub fn supported(&self) -> Vec<&str> {
        self.entries.iter().map(|(v, _)| v.as_str()).collect()
    }

    pub fn is_supported(&self, version: &str) -> bool {
        self.entries.iter().any(|(v, _)| v == version)
    }

    /// Default (latest) version and its factory
    pub fn latest(&self) -> Option<(&str, &F)> {
        self.entries.last().map(|(v, f)| (v.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lookup helper for generated `match`-based factories
pub fn find_version<'a>(requested: &str, supported: &'a [&'a str]) -> ConversionResult<&'a str> {
    supported
        .iter()
        .copied()
        .find(|v| *v == requested)
        .ok_or_else(|| ConversionError::version_not_supported(requested, supported))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::error::ErrorCode;

    #[test]
    fn test_registry_lookup() {
        let registry = VersionRegistry::new().register("v1", 1).register("v2", 2);

        assert_eq!(*registry.get("v2").unwrap(), 2);
        assert_eq!(registry.latest(), Some(("v2", &2)));
        assert_eq!(registry.supported(), vec!["v1", "v2"]);
    }

    #[test]
    fn test_unknown_version_names_supported_set() {
        let registry = VersionRegistry::new().register("v1", ()).register("v2", ());
        let err = registry.get("v3").unwrap_err();

        assert_eq!(err.code(), ErrorCode::VersionNotSupported);
        match err {
            ConversionError::VersionNotSupported { requested, supported } => {
                assert_eq!(requested, "v3");
                assert_eq!(supported, vec!["v1".to_string(), "v2".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_string_identifiers() {
        let registry = VersionRegistry::new().register("legacy", 0).register("2024-06", 1);
        assert!(registry.is_supported("2024-06"));
        assert_eq!(find_version("legacy", &["legacy", "2024-06"]).unwrap(), "legacy");
        assert!(find_version("v1", &["legacy"]).is_err());
    }
}
