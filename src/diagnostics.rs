//! Diagnostics
//!
//! Collects schema-level warnings and errors found while merging versions.
//! Structural errors block generation for the affected top-level entity only;
//! everything else is informational and ends up in the compatibility report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // === Structural ===
    /// Field types cannot be unified across versions
    IncompatibleTypes,
    /// Two fields claim the same wire number in one version
    FieldNumberConflict,
    /// A field moves between coexisting oneof groups
    OneofConflict,
    /// Cycle of required message fields (no finite instance exists)
    CircularDependency,
    /// A later version reuses a number or name reserved earlier
    ReservedFieldReuse,

    // === Conversions ===
    /// Conflict resolved by an automatic conversion
    ConvertedConflict,
    /// Conflict that needs caller attention (text/bytes)
    ManualConflict,
    /// Conflict with no safe write path (narrowing)
    LossyConflict,
    /// Accessor renamed to avoid a clash with another field of the same name
    RenamedAccessor,

    // === Mapping ===
    /// A field mapping matched nothing in the schemas
    UnmatchedMapping,
    /// Equivalent enums from different paths were collapsed
    EnumCollapsed,
    /// Enum of a filtered-out message kept because a merged field uses it
    OrphanedEnum,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IncompatibleTypes => "SCHEMA-001",
            Self::FieldNumberConflict => "SCHEMA-002",
            Self::OneofConflict => "SCHEMA-003",
            Self::CircularDependency => "SCHEMA-004",
            Self::ReservedFieldReuse => "SCHEMA-005",
            Self::ConvertedConflict => "MERGE-I01",
            Self::ManualConflict => "MERGE-W01",
            Self::LossyConflict => "MERGE-W02",
            Self::RenamedAccessor => "MERGE-W03",
            Self::UnmatchedMapping => "MAP-W01",
            Self::EnumCollapsed => "ENUM-I01",
            Self::OrphanedEnum => "ENUM-I02",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::IncompatibleTypes
            | Self::FieldNumberConflict
            | Self::OneofConflict
            | Self::CircularDependency
            | Self::ReservedFieldReuse => Severity::Error,

            Self::ManualConflict
            | Self::LossyConflict
            | Self::RenamedAccessor
            | Self::UnmatchedMapping => Severity::Warning,

            Self::ConvertedConflict | Self::EnumCollapsed | Self::OrphanedEnum => Severity::Info,
        }
    }

    /// Whether this code stops generation of the enclosing top-level entity.
    ///
    /// Incompatible field types are error-severity in reports but still
    /// generate (a default-returning getter without a setter).
    pub fn blocks_generation(&self) -> bool {
        matches!(
            self,
            Self::FieldNumberConflict
                | Self::OneofConflict
                | Self::CircularDependency
                | Self::ReservedFieldReuse
        )
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Logical path of the offending entity (`Order.total`)
    pub entity: String,
    /// Diagnostic code
    pub code: DiagnosticCode,
    /// Human-readable message
    pub message: String,
    /// Additional context (per-version types, related fields)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(entity: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Top-level entity (first path segment) this item belongs to
    pub fn root_entity(&self) -> &str {
        self.entity.split('.').next().unwrap_or(&self.entity)
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            self.code.severity(),
            self.message,
            self.entity
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Everything a merge found worth reporting, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: DiagnosticItem) {
        self.items.push(item);
    }

    /// Record an item that needs no context lines
    pub fn report(&mut self, entity: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) {
        self.push(DiagnosticItem::new(entity, code, message));
    }

    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }

    /// Number of items at exactly `severity`
    pub fn count(&self, severity: Severity) -> usize {
        self.items.iter().filter(|i| i.severity() == severity).count()
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// Items attached to an entity or anything nested below it
    pub fn for_entity<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a DiagnosticItem> + 'a {
        self.items.iter().filter(move |i| {
            i.entity == path
                || i.entity
                    .strip_prefix(path)
                    .map(|rest| rest.starts_with('.'))
                    .unwrap_or(false)
        })
    }

    /// Top-level entities whose generation is blocked
    pub fn blocked_entities(&self) -> BTreeSet<String> {
        self.items
            .iter()
            .filter(|i| i.code.blocks_generation())
            .map(|i| i.root_entity().to_string())
            .collect()
    }

    pub fn all(&self) -> &[DiagnosticItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One item per line, then a per-severity tally and the blocked entities
impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            writeln!(f, "{}", item)?;
        }
        write!(
            f,
            "{} error(s), {} warning(s), {} info",
            self.count(Severity::Error),
            self.count(Severity::Warning),
            self.count(Severity::Info)
        )?;
        let blocked = self.blocked_entities();
        if !blocked.is_empty() {
            let names: Vec<&str> = blocked.iter().map(String::as_str).collect();
            write!(f, "; not generated: {}", names.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_severity() {
        assert_eq!(DiagnosticCode::ReservedFieldReuse.severity(), Severity::Error);
        assert_eq!(DiagnosticCode::LossyConflict.severity(), Severity::Warning);
        assert_eq!(DiagnosticCode::ConvertedConflict.severity(), Severity::Info);
    }

    #[test]
    fn test_diagnostics_collection() {
        let mut diags = Diagnostics::new();
        diags.report("Order.total", DiagnosticCode::IncompatibleTypes, "string vs int32");
        diags.report("Order.note", DiagnosticCode::ManualConflict, "string vs bytes");

        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.warning_count(), 1);
        assert!(diags.has_errors());
    }

    #[test]
    fn test_incompatible_types_do_not_block() {
        let mut diags = Diagnostics::new();
        diags.report("Order.total", DiagnosticCode::IncompatibleTypes, "string vs int32");
        diags.report("Invoice.Line.qty", DiagnosticCode::ReservedFieldReuse, "number 4 reserved in v1");

        let blocked = diags.blocked_entities();
        assert_eq!(blocked.len(), 1);
        assert!(blocked.contains("Invoice"));
    }

    #[test]
    fn test_for_entity_matches_nested_paths() {
        let mut diags = Diagnostics::new();
        diags.report("Order.Item.price", DiagnosticCode::ConvertedConflict, "int32 -> int64");
        diags.report("OrderLine.qty", DiagnosticCode::ConvertedConflict, "int32 -> int64");

        assert_eq!(diags.for_entity("Order").count(), 1);
    }

    #[test]
    fn test_display_names_blocked_entities() {
        let mut diags = Diagnostics::new();
        diags.report("Order.Line", DiagnosticCode::CircularDependency, "Order.Line -> Order.Line");
        diags.report("Order.total", DiagnosticCode::ConvertedConflict, "int32 -> int64");

        let text = diags.to_string();
        assert!(text.starts_with("[SCHEMA-004] error:"));
        assert!(text.ends_with("1 error(s), 0 warning(s), 1 info; not generated: Order"));
    }
}
