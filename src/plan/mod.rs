//! Accessor Plans
//!
//! Language-agnostic description of the code every merged field needs.
//!
//! Architecture:
//! - `dispatch`: ordered handler table turning a MergedField into a FieldPlan
//! - FieldPlan: one or more accessors (two for dual-representation conflicts)
//! - AccessorPlan: unified type + one VersionBinding per version
//! - VersionBinding: how this version reads (ReadOp) and writes (WriteOp)
//!
//! The Rust emitter renders plans to source text; the runtime interpreter
//! executes the same plans against dynamic payloads. Neither looks at the
//! conflict type again: every decision is already in the plan.

pub mod dispatch;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::merged::{Cardinality, ConflictType, MergedEnum, MergedSchema, Repr};
use crate::schema::ScalarType;
use crate::version::{VersionId, VersionSet};

pub use dispatch::{plan_field, plan_message, plan_schema, HandlerKind};

// =============================================================================
// Operations
// =============================================================================

/// How one version produces the unified value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadOp {
    /// Field absent in this version: empty value
    Missing,
    /// Representation already matches
    Copy,
    /// Numeric conversion into the unified type (unsigned values
    /// reinterpreted as unsigned first)
    Widen { from: ScalarType, to: ScalarType },
    /// Enum-typed version read as its numeric code
    EnumNumber { to: ScalarType },
    /// Integer-typed version read as the unified enum
    NumberAsEnum { from: ScalarType },
    /// Bytes-typed version read as text (invalid UTF-8 replaced)
    Utf8Decode,
    /// Text-typed version read as bytes
    Utf8Encode,
    /// Version holds the other representation of a dual accessor: empty
    OtherFamily,
    /// Representation cannot be unified: the unified type's default
    Default,
}

/// How one version stores a unified value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOp {
    /// Store as-is
    Copy,
    /// Range-checked numeric conversion into the version type
    Narrow { from: ScalarType, to: ScalarType },
    /// Unified integer stored into an enum-typed version; must be a member
    NumberToEnum { from: ScalarType },
    /// Unified enum stored into an integer-typed version
    EnumToNumber { to: ScalarType },
    /// Unified enum stored into an enum-typed version; must be a member
    EnumMember,
    /// Text stored into a bytes-typed version
    Utf8Encode,
    /// Bytes stored into a text-typed version; must be valid UTF-8
    Utf8Decode,
    /// Field absent in this version
    NotAvailable,
    /// Setter belongs to the other family of a dual accessor
    Unsupported,
}

impl WriteOp {
    /// Whether this op can succeed for some input
    pub fn is_storing(&self) -> bool {
        !matches!(self, Self::NotAvailable | Self::Unsupported)
    }
}

// =============================================================================
// Plans
// =============================================================================

/// Which view of a field an accessor provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessorRole {
    /// Primary accessor (numeric, text, scalar family, or plain value)
    Value,
    /// Enum view of an integer/enum field
    Enum,
    /// Bytes view of a text/bytes field
    Bytes,
    /// Message view of a scalar/message field
    Message,
}

impl AccessorRole {
    /// Suffix appended to the field name for this accessor
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Value => "",
            Self::Enum => "_enum",
            Self::Bytes => "_bytes",
            Self::Message => "_message",
        }
    }
}

impl fmt::Display for AccessorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value => write!(f, "value"),
            Self::Enum => write!(f, "enum"),
            Self::Bytes => write!(f, "bytes"),
            Self::Message => write!(f, "message"),
        }
    }
}

/// Facts about a field in one version needed to access the payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRef {
    pub name: String,
    pub number: u32,
    pub repr: Repr,
    pub presence: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oneof: Option<String>,
}

/// One version's read and write strategy for an accessor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionBinding {
    pub version: VersionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<SlotRef>,
    pub read: ReadOp,
    /// None when the accessor has no setter at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<WriteOp>,
}

/// One accessor of a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessorPlan {
    pub role: AccessorRole,
    /// Accessor name (field name plus role suffix)
    pub name: String,
    /// Type the accessor exposes
    pub value_type: Repr,
    pub bindings: Vec<VersionBinding>,
}

impl AccessorPlan {
    pub fn binding(&self, version: &VersionId) -> Option<&VersionBinding> {
        self.bindings.iter().find(|b| &b.version == version)
    }

    /// Whether a setter is generated for this accessor
    pub fn has_setter(&self) -> bool {
        self.bindings.iter().any(|b| b.write.is_some())
    }
}

/// Everything generated for one merged field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPlan {
    pub name: String,
    pub number: u32,
    pub conflict: ConflictType,
    pub handler: HandlerKind,
    pub cardinality: Cardinality,
    /// Getter reports absence (`Option`) for single values
    pub presence: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oneof: Option<String>,
    pub accessors: Vec<AccessorPlan>,
}

impl FieldPlan {
    pub fn accessor(&self, role: AccessorRole) -> Option<&AccessorPlan> {
        self.accessors.iter().find(|a| a.role == role)
    }

    pub fn primary(&self) -> Option<&AccessorPlan> {
        self.accessor(AccessorRole::Value)
    }
}

/// Everything generated for one merged message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePlan {
    pub name: String,
    pub path: String,
    pub versions: Vec<VersionId>,
    pub fields: Vec<FieldPlan>,
    pub nested: Vec<MessagePlan>,
}

impl MessagePlan {
    pub fn field(&self, name: &str) -> Option<&FieldPlan> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn exists_in(&self, version: &VersionId) -> bool {
        self.versions.contains(version)
    }

    /// This plan and all nested plans, depth-first
    pub fn walk(&self) -> Vec<&MessagePlan> {
        let mut out = vec![self];
        for nested in &self.nested {
            out.extend(nested.walk());
        }
        out
    }
}

/// Plans for a whole merged schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaPlan {
    pub versions: VersionSet,
    pub messages: Vec<MessagePlan>,
    /// Every merged enum, flattened
    pub enums: Vec<MergedEnum>,
}

impl SchemaPlan {
    pub fn message(&self, path: &str) -> Option<&MessagePlan> {
        self.messages.iter().flat_map(|m| m.walk()).find(|m| m.path == path)
    }

    pub fn enumeration(&self, path: &str) -> Option<&MergedEnum> {
        self.enums
            .iter()
            .find(|e| e.path == path || e.collapsed_from.iter().any(|p| p == path))
    }

    /// Build plans for every message of a merged schema
    pub fn build(schema: &MergedSchema) -> Self {
        plan_schema(schema)
    }
}
