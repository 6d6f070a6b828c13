//! Merged schema model
//!
//! The version-independent tree produced by the merger. Every value here is
//! built once and never mutated afterwards; generation units share it
//! read-only.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::diagnostics::Severity;
use crate::schema::{FieldSlot, ScalarType};
use crate::version::{VersionId, VersionSet};

// =============================================================================
// Conflict Classification
// =============================================================================

/// How a field's representation differs across versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    /// Identical representation in every present version
    None,
    /// Integer in some versions, enum in others
    IntEnum,
    /// Later versions use a wider numeric type
    Widening,
    /// Later versions use a narrower numeric type (read-only)
    Narrowing,
    /// `float` vs `double`
    FloatDouble,
    /// Signed vs unsigned integers (or differing integer encodings)
    SignedUnsigned,
    /// `string` vs `bytes`
    StringBytes,
    /// Scalar in some versions, message in others
    PrimitiveMessage,
    /// No safe unification
    Incompatible,
}

/// How generated code deals with a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Handling {
    /// Nothing to do
    Native,
    /// Automatic conversion in getters and setters
    Converted,
    /// Dual accessors; the caller picks the representation
    Manual,
    /// Readable, but writes are not generated
    Warning,
    /// Getter returns a default, no setter
    Incompatible,
}

impl ConflictType {
    pub const ALL: [ConflictType; 9] = [
        Self::None,
        Self::IntEnum,
        Self::Widening,
        Self::Narrowing,
        Self::FloatDouble,
        Self::SignedUnsigned,
        Self::StringBytes,
        Self::PrimitiveMessage,
        Self::Incompatible,
    ];

    pub fn handling(self) -> Handling {
        match self {
            Self::None => Handling::Native,
            Self::IntEnum
            | Self::Widening
            | Self::FloatDouble
            | Self::SignedUnsigned
            | Self::PrimitiveMessage => Handling::Converted,
            Self::StringBytes => Handling::Manual,
            Self::Narrowing => Handling::Warning,
            Self::Incompatible => Handling::Incompatible,
        }
    }

    pub fn severity(self) -> Severity {
        match self.handling() {
            Handling::Native | Handling::Converted => Severity::Info,
            Handling::Manual | Handling::Warning => Severity::Warning,
            Handling::Incompatible => Severity::Error,
        }
    }

    /// Ordering used when combining pairwise classifications; higher is worse
    pub fn rank(self) -> u8 {
        match self {
            Self::None => 0,
            Self::FloatDouble => 1,
            Self::Widening => 2,
            Self::IntEnum => 3,
            Self::SignedUnsigned => 4,
            Self::StringBytes => 5,
            Self::Narrowing => 6,
            Self::PrimitiveMessage => 7,
            Self::Incompatible => 8,
        }
    }

    pub fn worst(self, other: ConflictType) -> ConflictType {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::IntEnum => "INT_ENUM",
            Self::Widening => "WIDENING",
            Self::Narrowing => "NARROWING",
            Self::FloatDouble => "FLOAT_DOUBLE",
            Self::SignedUnsigned => "SIGNED_UNSIGNED",
            Self::StringBytes => "STRING_BYTES",
            Self::PrimitiveMessage => "PRIMITIVE_MESSAGE",
            Self::Incompatible => "INCOMPATIBLE",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::None => "identical in all versions",
            Self::IntEnum => "integer and enum; number and enum accessors",
            Self::Widening => "widened to the larger numeric type; setters range-check",
            Self::Narrowing => "read through the wider type; no setter",
            Self::FloatDouble => "unified as double; setters range-check",
            Self::SignedUnsigned => "unified as i64; unsigned values reinterpreted",
            Self::StringBytes => "text and bytes accessors; UTF-8 conversion",
            Self::PrimitiveMessage => "scalar and message accessors per version family",
            Self::Incompatible => "no unification; default getter, no setter",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Field Types
// =============================================================================

/// A field's representation in one version, with references resolved to
/// merged logical paths
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Repr {
    Scalar(ScalarType),
    /// Merged enum path
    Enum(String),
    /// Merged message path (or external well-known reference)
    Message(String),
}

impl Repr {
    pub fn scalar(&self) -> Option<ScalarType> {
        match self {
            Self::Scalar(s) => Some(*s),
            _ => None,
        }
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{}", s),
            Self::Enum(p) => write!(f, "enum {}", p),
            Self::Message(p) => write!(f, "message {}", p),
        }
    }
}

/// Shape of the field: single value, list, or map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    Single,
    Repeated,
    Map(ScalarType),
}

impl Cardinality {
    pub fn of(slot: &FieldSlot) -> Self {
        match slot.map_key {
            Some(key) => Self::Map(key),
            None if slot.is_repeated() => Self::Repeated,
            None => Self::Single,
        }
    }
}

/// The accessor type the unified API exposes for a field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnifiedType {
    /// One representation (possibly after numeric unification)
    Single(Repr),
    /// Integer accessor plus enum accessor
    IntEnum { int: ScalarType, enumeration: String },
    /// Text accessor plus bytes accessor
    TextBytes,
    /// Scalar accessor plus message accessor
    ScalarOrMessage { scalar: ScalarType, message: String },
}

impl UnifiedType {
    pub fn primary_repr(&self) -> Repr {
        match self {
            Self::Single(r) => r.clone(),
            Self::IntEnum { int, .. } => Repr::Scalar(*int),
            Self::TextBytes => Repr::Scalar(ScalarType::String),
            Self::ScalarOrMessage { scalar, .. } => Repr::Scalar(*scalar),
        }
    }
}

impl fmt::Display for UnifiedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(r) => write!(f, "{}", r),
            Self::IntEnum { int, enumeration } => write!(f, "{} | enum {}", int, enumeration),
            Self::TextBytes => write!(f, "string | bytes"),
            Self::ScalarOrMessage { scalar, message } => write!(f, "{} | message {}", scalar, message),
        }
    }
}

// =============================================================================
// Merged Entities
// =============================================================================

/// One version's view of a merged field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSlot {
    pub version: VersionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<FieldSlot>,
    /// Resolved representation (present iff `slot` is)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repr: Option<Repr>,
}

/// A logical field unified across versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedField {
    /// Unified accessor name
    pub name: String,
    /// Wire number in the latest version declaring the field
    pub number: u32,
    /// One entry per merged version, in version order
    pub slots: Vec<VersionSlot>,
    pub unified: UnifiedType,
    pub cardinality: Cardinality,
    pub conflict: ConflictType,
    /// Aligned by an explicit name mapping
    #[serde(default)]
    pub name_mapped: bool,
    /// Unified oneof group name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oneof: Option<String>,
    /// Any version tracks presence
    #[serde(default)]
    pub presence: bool,
}

impl MergedField {
    pub fn slot(&self, version: &VersionId) -> Option<&FieldSlot> {
        self.slots
            .iter()
            .find(|s| &s.version == version)
            .and_then(|s| s.slot.as_ref())
    }

    pub fn repr(&self, version: &VersionId) -> Option<&Repr> {
        self.slots
            .iter()
            .find(|s| &s.version == version)
            .and_then(|s| s.repr.as_ref())
    }

    pub fn present_versions(&self) -> impl Iterator<Item = &VersionId> {
        self.slots.iter().filter(|s| s.slot.is_some()).map(|s| &s.version)
    }

    pub fn is_present_in(&self, version: &VersionId) -> bool {
        self.slot(version).is_some()
    }

    /// Present in every merged version
    pub fn is_universal(&self) -> bool {
        self.slots.iter().all(|s| s.slot.is_some())
    }

    pub fn number_in(&self, version: &VersionId) -> Option<u32> {
        self.slot(version).map(|s| s.number)
    }

    pub fn is_list(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }

    pub fn is_map(&self) -> bool {
        matches!(self.cardinality, Cardinality::Map(_))
    }
}

/// A member of a merged enum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedEnumValue {
    pub name: String,
    pub number: i32,
    /// Versions declaring this member
    pub versions: Vec<VersionId>,
    /// Other names the same number carries in some versions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

/// An enum unified across versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedEnum {
    pub name: String,
    /// Logical path of the surviving definition
    pub path: String,
    pub values: Vec<MergedEnumValue>,
    /// Versions declaring this enum (under any collapsed path)
    pub versions: Vec<VersionId>,
    /// Other logical paths collapsed into this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collapsed_from: Vec<String>,
}

impl MergedEnum {
    pub fn value_by_number(&self, number: i32) -> Option<&MergedEnumValue> {
        self.values.iter().find(|v| v.number == number)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&MergedEnumValue> {
        self.values
            .iter()
            .find(|v| v.name == name || v.aliases.iter().any(|a| a == name))
    }

    /// Whether `number` is a member in `version`
    pub fn supports(&self, number: i32, version: &VersionId) -> bool {
        self.value_by_number(number)
            .map(|v| v.versions.contains(version))
            .unwrap_or(false)
    }

    pub fn min_number(&self) -> i32 {
        self.values.iter().map(|v| v.number).min().unwrap_or(0)
    }

    pub fn max_number(&self) -> i32 {
        self.values.iter().map(|v| v.number).max().unwrap_or(0)
    }
}

/// A oneof group unified across versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedOneof {
    pub name: String,
    /// Unified field names in the group
    pub fields: Vec<String>,
    pub versions: Vec<VersionId>,
}

/// A message unified across versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedMessage {
    pub name: String,
    /// Logical path (`Order.Item`)
    pub path: String,
    pub fields: Vec<MergedField>,
    pub messages: Vec<MergedMessage>,
    pub enums: Vec<MergedEnum>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub oneofs: Vec<MergedOneof>,
    /// Versions declaring this message
    pub versions: Vec<VersionId>,
}

impl MergedMessage {
    pub fn field(&self, name: &str) -> Option<&MergedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn nested(&self, name: &str) -> Option<&MergedMessage> {
        self.messages.iter().find(|m| m.name == name)
    }

    pub fn exists_in(&self, version: &VersionId) -> bool {
        self.versions.contains(version)
    }

    /// Depth-first walk over this message and all nested messages
    pub fn walk(&self) -> Vec<&MergedMessage> {
        let mut out = vec![self];
        for nested in &self.messages {
            out.extend(nested.walk());
        }
        out
    }
}

/// The complete merged schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedSchema {
    pub versions: VersionSet,
    pub messages: Vec<MergedMessage>,
    pub enums: Vec<MergedEnum>,
}

impl MergedSchema {
    /// The default (latest) version
    pub fn latest(&self) -> Option<&VersionId> {
        self.versions.latest()
    }

    pub fn find_message(&self, path: &str) -> Option<&MergedMessage> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.messages.iter().find(|m| m.name == first)?;
        for segment in segments {
            current = current.nested(segment)?;
        }
        Some(current)
    }

    /// Find an enum by its surviving path or any path collapsed into it
    pub fn find_enum(&self, path: &str) -> Option<&MergedEnum> {
        self.all_enums()
            .into_iter()
            .find(|e| e.path == path || e.collapsed_from.iter().any(|p| p == path))
    }

    /// All messages, depth-first
    pub fn all_messages(&self) -> Vec<&MergedMessage> {
        self.messages.iter().flat_map(|m| m.walk()).collect()
    }

    /// All enums, top-level first, then nested in message order
    pub fn all_enums(&self) -> Vec<&MergedEnum> {
        let mut out: Vec<&MergedEnum> = self.enums.iter().collect();
        for message in self.all_messages() {
            out.extend(message.enums.iter());
        }
        out
    }

    /// All fields with their owning message path
    pub fn all_fields(&self) -> Vec<(&str, &MergedField)> {
        self.all_messages()
            .into_iter()
            .flat_map(|m| m.fields.iter().map(move |f| (m.path.as_str(), f)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handling_and_severity() {
        assert_eq!(ConflictType::None.severity(), Severity::Info);
        assert_eq!(ConflictType::IntEnum.handling(), Handling::Converted);
        assert_eq!(ConflictType::StringBytes.severity(), Severity::Warning);
        assert_eq!(ConflictType::Narrowing.handling(), Handling::Warning);
        assert_eq!(ConflictType::Incompatible.severity(), Severity::Error);
    }

    #[test]
    fn test_worst_wins() {
        assert_eq!(ConflictType::Widening.worst(ConflictType::None), ConflictType::Widening);
        assert_eq!(
            ConflictType::SignedUnsigned.worst(ConflictType::Incompatible),
            ConflictType::Incompatible
        );
        let ranks: std::collections::BTreeSet<u8> = ConflictType::ALL.iter().map(|c| c.rank()).collect();
        assert_eq!(ranks.len(), ConflictType::ALL.len());
    }

    #[test]
    fn test_conflict_serializes_screaming_case() {
        let json = serde_json::to_string(&ConflictType::PrimitiveMessage).unwrap();
        assert_eq!(json, "\"PRIMITIVE_MESSAGE\"");
    }
}
