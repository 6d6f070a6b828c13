//! Cross-version compatibility reporting
//!
//! Summarises how far a merged schema is from being version-agnostic: one
//! entry per conflicting field plus the schema-level diagnostics of the
//! merge that produced it.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::diagnostics::{DiagnosticItem, Diagnostics, Severity};
use crate::error::Result;
use crate::merge::MergeOutcome;
use crate::merged::{ConflictType, Handling, MergedSchema};
use crate::version::VersionId;

/// A field's type in one version (`None` when absent there)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionType {
    pub version: VersionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repr: Option<String>,
}

/// A field whose representation differs between versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    /// Logical path (`Order.total`)
    pub path: String,
    pub conflict: ConflictType,
    pub handling: Handling,
    pub severity: Severity,
    pub types: Vec<VersionType>,
    pub note: String,
}

/// Entry counts per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub info: usize,
    pub warning: usize,
    pub error: usize,
}

impl SeverityCounts {
    fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Info => self.info += 1,
            Severity::Warning => self.warning += 1,
            Severity::Error => self.error += 1,
        }
    }
}

/// Result of a compatibility check across all versions of a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub versions: Vec<VersionId>,
    pub entries: Vec<ConflictEntry>,
    pub diagnostics: Vec<DiagnosticItem>,
    pub counts: SeverityCounts,
    /// No error-severity entry or diagnostic
    pub is_compatible: bool,
}

impl CompatibilityReport {
    /// Build a report from a merged schema and its diagnostics
    pub fn build(schema: &MergedSchema, diagnostics: &Diagnostics) -> Self {
        let mut entries = Vec::new();
        for (path, field) in schema.all_fields() {
            if field.conflict == ConflictType::None {
                continue;
            }
            let types = field
                .slots
                .iter()
                .map(|s| VersionType {
                    version: s.version.clone(),
                    repr: s.repr.as_ref().map(|r| r.to_string()),
                })
                .collect();
            let mut note = field.conflict.description().to_string();
            if field.name_mapped {
                note.push_str("; aligned by explicit mapping");
            }
            entries.push(ConflictEntry {
                path: format!("{}.{}", path, field.name),
                conflict: field.conflict,
                handling: field.conflict.handling(),
                severity: field.conflict.severity(),
                types,
                note,
            });
        }

        let mut counts = SeverityCounts::default();
        for entry in &entries {
            counts.add(entry.severity);
        }
        // Incompatible fields already have an entry; count the remaining diagnostics
        let conflict_paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        for item in diagnostics.all() {
            if !conflict_paths.contains(&item.entity.as_str()) {
                counts.add(item.severity());
            }
        }

        Self {
            versions: schema.versions.iter().cloned().collect(),
            is_compatible: counts.error == 0,
            entries,
            diagnostics: diagnostics.all().to_vec(),
            counts,
        }
    }

    pub fn from_outcome(outcome: &MergeOutcome) -> Self {
        Self::build(&outcome.schema, &outcome.diagnostics)
    }

    /// Entries at or above a severity
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &ConflictEntry> {
        self.entries.iter().filter(move |e| e.severity >= severity)
    }

    pub fn entry(&self, path: &str) -> Option<&ConflictEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable rendering, one block per entry
    pub fn to_text(&self) -> String {
        let versions: Vec<&str> = self.versions.iter().map(|v| v.as_str()).collect();
        let mut out = String::new();
        let _ = writeln!(out, "Compatibility report for {}", versions.join(", "));
        let _ = writeln!(
            out,
            "{} conflicts ({} info, {} warning, {} error): {}",
            self.entries.len(),
            self.counts.info,
            self.counts.warning,
            self.counts.error,
            if self.is_compatible { "compatible" } else { "INCOMPATIBLE" }
        );

        for entry in &self.entries {
            let _ = writeln!(out);
            let _ = writeln!(out, "{} [{}] {}", entry.path, entry.severity, entry.conflict);
            for t in &entry.types {
                let _ = writeln!(out, "  {}: {}", t.version, t.repr.as_deref().unwrap_or("-"));
            }
            let _ = writeln!(out, "  {}", entry.note);
        }

        if !self.diagnostics.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Diagnostics:");
            for item in &self.diagnostics {
                let _ = writeln!(out, "{}", item);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::SchemaMerger;
    use crate::schema::{FieldKind, FieldSlot, MessageDef, ScalarType, VersionSchema};

    fn scalar(name: &str, number: u32, s: ScalarType) -> FieldSlot {
        FieldSlot::new(name, number, FieldKind::Scalar(s))
    }

    #[test]
    fn test_report_lists_conflicts() {
        let v1 = VersionSchema::new("v1", "shop").message(
            MessageDef::new("Order")
                .field(scalar("total", 1, ScalarType::Int32))
                .field(scalar("id", 2, ScalarType::String)),
        );
        let v2 = VersionSchema::new("v2", "shop").message(
            MessageDef::new("Order")
                .field(scalar("total", 1, ScalarType::Int64))
                .field(scalar("id", 2, ScalarType::String)),
        );
        let outcome = SchemaMerger::new().merge(&[v1, v2]).unwrap();
        let report = CompatibilityReport::from_outcome(&outcome);

        assert_eq!(report.entries.len(), 1);
        let entry = report.entry("Order.total").unwrap();
        assert_eq!(entry.conflict, ConflictType::Widening);
        assert_eq!(entry.handling, Handling::Converted);
        assert_eq!(entry.types[0].repr.as_deref(), Some("int32"));
        assert!(report.is_compatible);
        assert_eq!(report.counts.info, 1);
    }

    #[test]
    fn test_incompatible_field_fails_report() {
        let v1 = VersionSchema::new("v1", "shop")
            .message(MessageDef::new("Order").field(scalar("flag", 1, ScalarType::Bool)));
        let v2 = VersionSchema::new("v2", "shop")
            .message(MessageDef::new("Order").field(scalar("flag", 1, ScalarType::String)));
        let outcome = SchemaMerger::new().merge(&[v1, v2]).unwrap();
        let report = CompatibilityReport::from_outcome(&outcome);

        assert!(!report.is_compatible);
        assert_eq!(report.counts.error, 1);
        assert!(report.to_text().contains("Order.flag [error] INCOMPATIBLE"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["entries"][0]["conflict"], "INCOMPATIBLE");
    }
}
