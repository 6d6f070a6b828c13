//! Static description of one version's schema
//!
//! The generated factory emits one [`SchemaInfo`] per version so callers can
//! list what a payload version carries without the `.proto` sources.

use serde::Serialize;

/// One field of a message as declared in one version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldInfo {
    pub name: &'static str,
    pub number: u32,
    /// Protobuf type: scalar name, or the logical path of an enum or message
    pub type_name: &'static str,
    /// `optional`, `required`, `repeated` or `map`
    pub label: &'static str,
}

/// One message as declared in one version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MessageInfo {
    /// Logical path (`Order.Item`)
    pub path: &'static str,
    pub fields: &'static [FieldInfo],
}

impl MessageInfo {
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_number(&self, number: u32) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.number == number)
    }
}

/// One enum with the members a version declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnumInfo {
    pub path: &'static str,
    pub values: &'static [(&'static str, i32)],
}

impl EnumInfo {
    pub fn number(&self, name: &str) -> Option<i32> {
        self.values.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }
}

/// Messages and enums of one version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchemaInfo {
    pub version: &'static str,
    pub messages: &'static [MessageInfo],
    pub enums: &'static [EnumInfo],
}

impl SchemaInfo {
    pub fn message(&self, path: &str) -> Option<&MessageInfo> {
        self.messages.iter().find(|m| m.path == path)
    }

    pub fn enumeration(&self, path: &str) -> Option<&EnumInfo> {
        self.enums.iter().find(|e| e.path == path)
    }

    /// Field of a message by name, e.g. `("Order", "total")`
    pub fn field(&self, message: &str, field: &str) -> Option<&FieldInfo> {
        self.message(message).and_then(|m| m.field(field))
    }
}
