//! Per-version schema model
//!
//! One [`VersionSchema`] tree per schema version, as produced by an external
//! descriptor parser. The CLI reads these trees from JSON; the merger only
//! ever borrows them.
//!
//! Type references are fully-qualified (`.acme.v1.Order.Item`). Within one
//! version they are made version-independent by stripping the package prefix
//! (`Order.Item`), which is what lets the merger line up the same logical
//! message across versions that live in different packages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Result, SchemaError};
use crate::version::VersionId;

// =============================================================================
// Scalar Types
// =============================================================================

/// Wire-level scalar type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

/// Numeric family used by conflict classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericClass {
    SignedInt,
    UnsignedInt,
    Floating,
}

impl ScalarType {
    /// Name as written in a `.proto` file
    pub fn proto_name(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Float => "float",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Sint32 => "sint32",
            Self::Sint64 => "sint64",
            Self::Fixed32 => "fixed32",
            Self::Fixed64 => "fixed64",
            Self::Sfixed32 => "sfixed32",
            Self::Sfixed64 => "sfixed64",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }

    pub fn from_proto_name(name: &str) -> Option<Self> {
        let scalar = match name {
            "double" => Self::Double,
            "float" => Self::Float,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "sint32" => Self::Sint32,
            "sint64" => Self::Sint64,
            "fixed32" => Self::Fixed32,
            "fixed64" => Self::Fixed64,
            "sfixed32" => Self::Sfixed32,
            "sfixed64" => Self::Sfixed64,
            "bool" => Self::Bool,
            "string" => Self::String,
            "bytes" => Self::Bytes,
            _ => return None,
        };
        Some(scalar)
    }

    /// Rust type `prost` generates for this scalar
    pub fn rust_type(self) -> &'static str {
        match self {
            Self::Double => "f64",
            Self::Float => "f32",
            Self::Int32 | Self::Sint32 | Self::Sfixed32 => "i32",
            Self::Int64 | Self::Sint64 | Self::Sfixed64 => "i64",
            Self::Uint32 | Self::Fixed32 => "u32",
            Self::Uint64 | Self::Fixed64 => "u64",
            Self::Bool => "bool",
            Self::String => "String",
            Self::Bytes => "Vec<u8>",
        }
    }

    pub fn numeric_class(self) -> Option<NumericClass> {
        match self {
            Self::Int32 | Self::Int64 | Self::Sint32 | Self::Sint64 | Self::Sfixed32 | Self::Sfixed64 => {
                Some(NumericClass::SignedInt)
            }
            Self::Uint32 | Self::Uint64 | Self::Fixed32 | Self::Fixed64 => Some(NumericClass::UnsignedInt),
            Self::Float | Self::Double => Some(NumericClass::Floating),
            Self::Bool | Self::String | Self::Bytes => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        self.numeric_class().is_some()
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self.numeric_class(),
            Some(NumericClass::SignedInt) | Some(NumericClass::UnsignedInt)
        )
    }

    pub fn is_floating(self) -> bool {
        self.numeric_class() == Some(NumericClass::Floating)
    }

    pub fn is_text_or_bytes(self) -> bool {
        matches!(self, Self::String | Self::Bytes)
    }

    /// Width in bits of the numeric representation (0 for non-numeric)
    pub fn bit_width(self) -> u8 {
        match self {
            Self::Float
            | Self::Int32
            | Self::Uint32
            | Self::Sint32
            | Self::Fixed32
            | Self::Sfixed32 => 32,
            Self::Double
            | Self::Int64
            | Self::Uint64
            | Self::Sint64
            | Self::Fixed64
            | Self::Sfixed64 => 64,
            Self::Bool | Self::String | Self::Bytes => 0,
        }
    }

    /// Inclusive value range of an integer type
    pub fn integer_range(self) -> Option<(i128, i128)> {
        match (self.numeric_class()?, self.bit_width()) {
            (NumericClass::SignedInt, 32) => Some((i32::MIN as i128, i32::MAX as i128)),
            (NumericClass::SignedInt, _) => Some((i64::MIN as i128, i64::MAX as i128)),
            (NumericClass::UnsignedInt, 32) => Some((0, u32::MAX as i128)),
            (NumericClass::UnsignedInt, _) => Some((0, u64::MAX as i128)),
            (NumericClass::Floating, _) => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.proto_name())
    }
}

// =============================================================================
// Field Kinds
// =============================================================================

/// What a field holds: a scalar, an enum reference or a message reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Scalar(ScalarType),
    /// Fully-qualified enum reference
    Enum(String),
    /// Fully-qualified message reference
    Message(String),
}

impl FieldKind {
    pub fn scalar(&self) -> Option<ScalarType> {
        match self {
            Self::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    pub fn type_ref(&self) -> Option<&str> {
        match self {
            Self::Enum(r) | Self::Message(r) => Some(r),
            Self::Scalar(_) => None,
        }
    }

    pub fn is_message(&self) -> bool {
        matches!(self, Self::Message(_))
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, Self::Enum(_))
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{}", s),
            Self::Enum(r) => write!(f, "enum {}", r),
            Self::Message(r) => write!(f, "message {}", r),
        }
    }
}

/// Field label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    #[default]
    Optional,
    Required,
    Repeated,
}

/// Protobuf syntax of a version's files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Syntax {
    Proto2,
    #[default]
    Proto3,
}

/// Google well-known types that get special treatment in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WellKnownType {
    Timestamp,
    Duration,
    Any,
    Struct,
    Empty,
    FieldMask,
    DoubleValue,
    FloatValue,
    Int64Value,
    UInt64Value,
    Int32Value,
    UInt32Value,
    BoolValue,
    StringValue,
    BytesValue,
}

impl WellKnownType {
    /// Recognize a `.google.protobuf.*` reference
    pub fn from_type_ref(type_ref: &str) -> Option<Self> {
        let name = type_ref.strip_prefix(".google.protobuf.")?;
        let wkt = match name {
            "Timestamp" => Self::Timestamp,
            "Duration" => Self::Duration,
            "Any" => Self::Any,
            "Struct" => Self::Struct,
            "Empty" => Self::Empty,
            "FieldMask" => Self::FieldMask,
            "DoubleValue" => Self::DoubleValue,
            "FloatValue" => Self::FloatValue,
            "Int64Value" => Self::Int64Value,
            "UInt64Value" => Self::UInt64Value,
            "Int32Value" => Self::Int32Value,
            "UInt32Value" => Self::UInt32Value,
            "BoolValue" => Self::BoolValue,
            "StringValue" => Self::StringValue,
            "BytesValue" => Self::BytesValue,
            _ => return None,
        };
        Some(wkt)
    }

    /// Scalar wrapped by a `*Value` wrapper type
    pub fn wrapped_scalar(self) -> Option<ScalarType> {
        match self {
            Self::DoubleValue => Some(ScalarType::Double),
            Self::FloatValue => Some(ScalarType::Float),
            Self::Int64Value => Some(ScalarType::Int64),
            Self::UInt64Value => Some(ScalarType::Uint64),
            Self::Int32Value => Some(ScalarType::Int32),
            Self::UInt32Value => Some(ScalarType::Uint32),
            Self::BoolValue => Some(ScalarType::Bool),
            Self::StringValue => Some(ScalarType::String),
            Self::BytesValue => Some(ScalarType::Bytes),
            _ => None,
        }
    }

    /// Path of the `prost-types` type
    pub fn prost_type(self) -> &'static str {
        match self {
            Self::Timestamp => "::prost_types::Timestamp",
            Self::Duration => "::prost_types::Duration",
            Self::Any => "::prost_types::Any",
            Self::Struct => "::prost_types::Struct",
            Self::Empty => "()",
            Self::FieldMask => "::prost_types::FieldMask",
            Self::DoubleValue => "f64",
            Self::FloatValue => "f32",
            Self::Int64Value => "i64",
            Self::UInt64Value => "u64",
            Self::Int32Value => "i32",
            Self::UInt32Value => "u32",
            Self::BoolValue => "bool",
            Self::StringValue => "String",
            Self::BytesValue => "Vec<u8>",
        }
    }
}

// =============================================================================
// Definitions
// =============================================================================

/// One field as declared in one version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldSlot {
    pub name: String,
    pub number: u32,
    pub kind: FieldKind,
    #[serde(default)]
    pub label: Label,
    /// Key type when this field is a map (the value is `kind`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_key: Option<ScalarType>,
    /// Name of the enclosing oneof, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oneof: Option<String>,
    /// proto3 `optional` keyword
    #[serde(default)]
    pub proto3_optional: bool,
    /// Whether the field tracks presence (filled in by [`VersionSchema::normalized`])
    #[serde(default)]
    pub presence: bool,
}

impl FieldSlot {
    pub fn new(name: impl Into<String>, number: u32, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            number,
            kind,
            label: Label::Optional,
            map_key: None,
            oneof: None,
            proto3_optional: false,
            presence: false,
        }
    }

    pub fn repeated(mut self) -> Self {
        self.label = Label::Repeated;
        self
    }

    pub fn required(mut self) -> Self {
        self.label = Label::Required;
        self
    }

    pub fn map_of(mut self, key: ScalarType) -> Self {
        self.label = Label::Repeated;
        self.map_key = Some(key);
        self
    }

    pub fn in_oneof(mut self, oneof: impl Into<String>) -> Self {
        self.oneof = Some(oneof.into());
        self
    }

    pub fn with_presence(mut self) -> Self {
        self.presence = true;
        self
    }

    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated && self.map_key.is_none()
    }

    pub fn is_map(&self) -> bool {
        self.map_key.is_some()
    }

    pub fn is_required(&self) -> bool {
        self.label == Label::Required
    }

    /// Well-known type tag of a message-typed field
    pub fn well_known(&self) -> Option<WellKnownType> {
        match &self.kind {
            FieldKind::Message(r) => WellKnownType::from_type_ref(r),
            _ => None,
        }
    }

    fn derive_presence(&self, syntax: Syntax) -> bool {
        if self.label == Label::Repeated {
            return false;
        }
        if self.oneof.is_some() || self.kind.is_message() {
            return true;
        }
        match syntax {
            Syntax::Proto2 => self.label == Label::Optional,
            Syntax::Proto3 => self.proto3_optional,
        }
    }
}

/// One enum value as declared in one version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnumValueDef {
    pub name: String,
    pub number: i32,
}

/// One enum as declared in one version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<EnumValueDef>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, values: &[(&str, i32)]) -> Self {
        Self {
            name: name.into(),
            values: values
                .iter()
                .map(|(n, v)| EnumValueDef { name: n.to_string(), number: *v })
                .collect(),
        }
    }

    /// Sorted (name, number) pairs, the structural identity of an enum
    pub fn signature(&self) -> Vec<(String, i32)> {
        let mut sig: Vec<(String, i32)> = self
            .values
            .iter()
            .map(|v| (v.name.clone(), v.number))
            .collect();
        sig.sort();
        sig
    }

    pub fn contains_number(&self, number: i32) -> bool {
        self.values.iter().any(|v| v.number == number)
    }
}

/// One message as declared in one version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSlot>,
    #[serde(default)]
    pub messages: Vec<MessageDef>,
    #[serde(default)]
    pub enums: Vec<EnumDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reserved_numbers: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reserved_names: Vec<String>,
}

impl MessageDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            messages: Vec::new(),
            enums: Vec::new(),
            reserved_numbers: Vec::new(),
            reserved_names: Vec::new(),
        }
    }

    pub fn field(mut self, slot: FieldSlot) -> Self {
        self.fields.push(slot);
        self
    }

    pub fn nested(mut self, message: MessageDef) -> Self {
        self.messages.push(message);
        self
    }

    pub fn nested_enum(mut self, def: EnumDef) -> Self {
        self.enums.push(def);
        self
    }

    pub fn reserve(mut self, number: u32) -> Self {
        self.reserved_numbers.push(number);
        self
    }

    pub fn field_by_number(&self, number: u32) -> Option<&FieldSlot> {
        self.fields.iter().find(|f| f.number == number)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldSlot> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_reserved(&self, number: u32, name: &str) -> bool {
        self.reserved_numbers.contains(&number) || self.reserved_names.iter().any(|n| n == name)
    }
}

/// One complete schema version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSchema {
    pub version: VersionId,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub syntax: Syntax,
    #[serde(default)]
    pub messages: Vec<MessageDef>,
    #[serde(default)]
    pub enums: Vec<EnumDef>,
}

impl VersionSchema {
    pub fn new(version: impl Into<VersionId>, package: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            package: package.into(),
            syntax: Syntax::Proto3,
            messages: Vec::new(),
            enums: Vec::new(),
        }
    }

    pub fn with_syntax(mut self, syntax: Syntax) -> Self {
        self.syntax = syntax;
        self
    }

    pub fn message(mut self, message: MessageDef) -> Self {
        self.messages.push(message);
        self
    }

    pub fn enumeration(mut self, def: EnumDef) -> Self {
        self.enums.push(def);
        self
    }

    /// Copy of this schema with presence flags derived from syntax and labels
    pub fn normalized(&self) -> Self {
        fn walk(message: &MessageDef, syntax: Syntax) -> MessageDef {
            MessageDef {
                fields: message
                    .fields
                    .iter()
                    .map(|f| FieldSlot { presence: f.presence || f.derive_presence(syntax), ..f.clone() })
                    .collect(),
                messages: message.messages.iter().map(|m| walk(m, syntax)).collect(),
                ..message.clone()
            }
        }
        Self {
            messages: self.messages.iter().map(|m| walk(m, self.syntax)).collect(),
            ..self.clone()
        }
    }

    /// Version-independent path of a type reference.
    ///
    /// `.acme.v1.Order.Item` in package `acme.v1` becomes `Order.Item`;
    /// references outside the package are returned unchanged.
    pub fn logical_path(&self, type_ref: &str) -> String {
        let prefix = if self.package.is_empty() {
            ".".to_string()
        } else {
            format!(".{}.", self.package)
        };
        if WellKnownType::from_type_ref(type_ref).is_some() {
            return type_ref.to_string();
        }
        type_ref
            .strip_prefix(&prefix)
            .map(str::to_string)
            .unwrap_or_else(|| type_ref.to_string())
    }

    /// Find a message by logical path (`Order.Item`)
    pub fn find_message(&self, path: &str) -> Option<&MessageDef> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.messages.iter().find(|m| m.name == first)?;
        for segment in segments {
            current = current.messages.iter().find(|m| m.name == segment)?;
        }
        Some(current)
    }

    /// Find an enum by logical path (`Order.Status` or `Status`)
    pub fn find_enum(&self, path: &str) -> Option<&EnumDef> {
        match path.rsplit_once('.') {
            None => self.enums.iter().find(|e| e.name == path),
            Some((parent, name)) => self
                .find_message(parent)?
                .enums
                .iter()
                .find(|e| e.name == name),
        }
    }

    /// Every enum in this version with its logical path, top-level first
    pub fn all_enums(&self) -> Vec<(String, &EnumDef)> {
        fn walk<'a>(prefix: &str, message: &'a MessageDef, out: &mut Vec<(String, &'a EnumDef)>) {
            let path = join_path(prefix, &message.name);
            for def in &message.enums {
                out.push((join_path(&path, &def.name), def));
            }
            for nested in &message.messages {
                walk(&path, nested, out);
            }
        }

        let mut out: Vec<(String, &EnumDef)> =
            self.enums.iter().map(|e| (e.name.clone(), e)).collect();
        for message in &self.messages {
            walk("", message, &mut out);
        }
        out
    }

    /// Parse a version schema from its JSON form
    pub fn from_json(json: &str) -> Result<Self> {
        let schema: Self = serde_json::from_str(json)
            .map_err(|e| SchemaError::InvalidFormat(format!("version schema: {}", e)))?;
        VersionId::parse(schema.version.as_str())?;
        Ok(schema)
    }

    /// Load a version schema from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|e| match e {
            SchemaError::InvalidFormat(msg) => SchemaError::InvalidFormat(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }
}

/// Join a logical parent path and a simple name
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

/// Last segment of a logical path
pub fn simple_name(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VersionSchema {
        VersionSchema::new("v1", "acme.v1")
            .message(
                MessageDef::new("Order")
                    .field(FieldSlot::new("id", 1, FieldKind::Scalar(ScalarType::String)))
                    .nested(MessageDef::new("Item"))
                    .nested_enum(EnumDef::new("Status", &[("OPEN", 0), ("CLOSED", 1)])),
            )
            .enumeration(EnumDef::new("Unit", &[("UNIT_UNKNOWN", 0)]))
    }

    #[test]
    fn test_logical_path_strips_package() {
        let schema = sample();
        assert_eq!(schema.logical_path(".acme.v1.Order.Item"), "Order.Item");
        assert_eq!(
            schema.logical_path(".google.protobuf.Timestamp"),
            ".google.protobuf.Timestamp"
        );
    }

    #[test]
    fn test_find_nested_definitions() {
        let schema = sample();
        assert!(schema.find_message("Order.Item").is_some());
        assert!(schema.find_enum("Order.Status").is_some());
        assert!(schema.find_enum("Unit").is_some());
        assert!(schema.find_enum("Order.Missing").is_none());
    }

    #[test]
    fn test_all_enums_lists_nested_paths() {
        let schema = sample();
        let paths: Vec<String> = schema.all_enums().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["Unit".to_string(), "Order.Status".to_string()]);
    }

    #[test]
    fn test_presence_by_syntax() {
        let v2 = VersionSchema::new("v1", "p")
            .with_syntax(Syntax::Proto2)
            .message(MessageDef::new("M").field(FieldSlot::new("a", 1, FieldKind::Scalar(ScalarType::Int32))));
        let v3 = VersionSchema { syntax: Syntax::Proto3, ..v2.clone() };
        assert!(v2.normalized().messages[0].fields[0].presence);
        assert!(!v3.normalized().messages[0].fields[0].presence);
    }

    #[test]
    fn test_integer_ranges() {
        assert_eq!(ScalarType::Uint32.integer_range(), Some((0, 4_294_967_295)));
        assert_eq!(ScalarType::Sfixed32.integer_range(), Some((i32::MIN as i128, i32::MAX as i128)));
        assert_eq!(ScalarType::Double.integer_range(), None);
    }

    #[test]
    fn test_deserialize_field_kind() {
        let slot: FieldSlot =
            serde_json::from_str(r#"{"name":"total","number":2,"kind":{"scalar":"int32"}}"#).unwrap();
        assert_eq!(slot.kind, FieldKind::Scalar(ScalarType::Int32));
        assert_eq!(slot.label, Label::Optional);
    }
}
