//! Breaking-change policy
//!
//! Turns change records into [`BreakingChange`] entries with a severity.
//! Errors break existing readers or writers on the wire; warnings still
//! decode but change what generated accessors see.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ChangeKind, EnumDiff, FieldChange, FieldChangeKind, MessageDiff, ValueChangeKind};
use crate::diagnostics::Severity;
use crate::merged::{Cardinality, ConflictType};
use crate::schema::{join_path, FieldSlot, Label, MessageDef, ScalarType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakingKind {
    MessageRemoved,
    FieldRemoved,
    FieldTypeIncompatible,
    CardinalityChanged,
    RequiredFieldAdded,
    LabelChangedToRequired,
    FieldMovedIntoOneof,
    FieldMovedOutOfOneof,
    EnumRemoved,
    EnumValueRemoved,
    EnumValueNumberChanged,
}

impl BreakingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MessageRemoved => "MESSAGE_REMOVED",
            Self::FieldRemoved => "FIELD_REMOVED",
            Self::FieldTypeIncompatible => "FIELD_TYPE_INCOMPATIBLE",
            Self::CardinalityChanged => "CARDINALITY_CHANGED",
            Self::RequiredFieldAdded => "REQUIRED_FIELD_ADDED",
            Self::LabelChangedToRequired => "LABEL_CHANGED_TO_REQUIRED",
            Self::FieldMovedIntoOneof => "FIELD_MOVED_INTO_ONEOF",
            Self::FieldMovedOutOfOneof => "FIELD_MOVED_OUT_OF_ONEOF",
            Self::EnumRemoved => "ENUM_REMOVED",
            Self::EnumValueRemoved => "ENUM_VALUE_REMOVED",
            Self::EnumValueNumberChanged => "ENUM_VALUE_NUMBER_CHANGED",
        }
    }
}

impl fmt::Display for BreakingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A change that may break consumers of the old version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakingChange {
    pub kind: BreakingKind,
    pub severity: Severity,
    /// Logical path of the element (`Order.total`, `Status.OPEN`)
    pub path: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
}

impl BreakingChange {
    fn new(kind: BreakingKind, severity: Severity, path: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            path: path.into(),
            description: description.into(),
            old_value: None,
            new_value: None,
        }
    }

    fn values(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }
}

/// Severity of a field type change
pub fn type_change_severity(conflict: ConflictType, old: Option<ScalarType>, new: Option<ScalarType>) -> Severity {
    match conflict {
        ConflictType::None
        | ConflictType::Widening
        | ConflictType::IntEnum
        | ConflictType::StringBytes => Severity::Warning,
        ConflictType::FloatDouble if old == Some(ScalarType::Float) && new == Some(ScalarType::Double) => {
            Severity::Warning
        }
        _ => Severity::Error,
    }
}

fn describe(slot: &FieldSlot) -> String {
    let shape = match Cardinality::of(slot) {
        Cardinality::Single => String::new(),
        Cardinality::Repeated => "repeated ".to_string(),
        Cardinality::Map(key) => format!("map<{}> ", key),
    };
    format!("{}{} = {}", shape, slot.name, slot.number)
}

fn scalar_of(slot: Option<&FieldSlot>) -> Option<ScalarType> {
    slot.and_then(|s| s.kind.scalar())
}

/// Breaking changes of every message and enum diff
pub fn detect(messages: &[MessageDiff], enums: &[EnumDiff], new_messages: &[(String, &MessageDef)]) -> Vec<BreakingChange> {
    let mut out = Vec::new();
    for message in messages {
        if message.change == ChangeKind::Removed {
            out.push(
                BreakingChange::new(BreakingKind::MessageRemoved, Severity::Error, &message.path, "Message removed")
                    .values(Some(message.path.clone()), None),
            );
            continue;
        }
        let new_def = new_messages.iter().find(|(p, _)| *p == message.path).map(|(_, d)| *d);
        for field in &message.fields {
            detect_field(&message.path, field, new_def, &mut out);
        }
    }
    for diff in enums {
        detect_enum(diff, &mut out);
    }
    out
}

fn detect_field(message: &str, field: &FieldChange, new_def: Option<&MessageDef>, out: &mut Vec<BreakingChange>) {
    let path = join_path(message, &field.name);

    if let (Some(old), None) = (&field.old, &field.new) {
        let reserved = new_def.map(|d| d.is_reserved(old.number, &old.name)).unwrap_or(false);
        let (severity, description) = if reserved {
            (Severity::Warning, "Field removed; number reserved")
        } else {
            (Severity::Error, "Field removed")
        };
        out.push(
            BreakingChange::new(BreakingKind::FieldRemoved, severity, path, description)
                .values(Some(describe(old)), None),
        );
        return;
    }
    if let (None, Some(new)) = (&field.old, &field.new) {
        if new.label == Label::Required {
            out.push(
                BreakingChange::new(BreakingKind::RequiredFieldAdded, Severity::Error, path, "Required field added")
                    .values(None, Some(describe(new))),
            );
        }
        return;
    }
    let (Some(old), Some(new)) = (&field.old, &field.new) else {
        return;
    };

    if field.has(FieldChangeKind::CardinalityChanged) {
        out.push(
            BreakingChange::new(BreakingKind::CardinalityChanged, Severity::Error, &path, "Cardinality changed")
                .values(Some(describe(old)), Some(describe(new))),
        );
    } else if let Some(conflict) = field.conflict {
        let severity = type_change_severity(conflict, scalar_of(Some(old)), scalar_of(Some(new)));
        let description = match severity {
            Severity::Error => format!("Incompatible type change ({})", conflict),
            _ => format!("Type changed ({}: {})", conflict, conflict.description()),
        };
        let detail = field.details.iter().find(|d| d.starts_with("type:")).cloned();
        out.push(
            BreakingChange::new(BreakingKind::FieldTypeIncompatible, severity, &path, description)
                .values(detail, None),
        );
    }

    if field.has(FieldChangeKind::LabelChanged) && new.label == Label::Required && old.label != Label::Required {
        out.push(
            BreakingChange::new(BreakingKind::LabelChangedToRequired, Severity::Error, &path, "Field became required")
                .values(Some(describe(old)), Some(format!("required {}", describe(new)))),
        );
    }

    if field.has(FieldChangeKind::OneofChanged) {
        let kind = if new.oneof.is_some() {
            BreakingKind::FieldMovedIntoOneof
        } else {
            BreakingKind::FieldMovedOutOfOneof
        };
        let group = |slot: &FieldSlot| match &slot.oneof {
            Some(name) => format!("oneof {}", name),
            None => "standalone field".to_string(),
        };
        let description = match kind {
            BreakingKind::FieldMovedIntoOneof => "Field moved into oneof",
            _ => "Field moved out of oneof",
        };
        out.push(
            BreakingChange::new(kind, Severity::Warning, &path, description).values(Some(group(old)), Some(group(new))),
        );
    }
}

fn detect_enum(diff: &EnumDiff, out: &mut Vec<BreakingChange>) {
    if diff.change == ChangeKind::Removed {
        out.push(
            BreakingChange::new(BreakingKind::EnumRemoved, Severity::Error, &diff.path, "Enum removed")
                .values(Some(diff.path.clone()), None),
        );
        return;
    }
    for value in &diff.values {
        let path = join_path(&diff.path, &value.name);
        match value.kind {
            ValueChangeKind::Removed => out.push(
                BreakingChange::new(BreakingKind::EnumValueRemoved, Severity::Error, path, "Enum value removed")
                    .values(value.old_number.map(|n| format!("{} = {}", value.name, n)), None),
            ),
            ValueChangeKind::NumberChanged => out.push(
                BreakingChange::new(BreakingKind::EnumValueNumberChanged, Severity::Error, path, "Enum value number changed")
                    .values(value.old_number.map(|n| n.to_string()), value.new_number.map(|n| n.to_string())),
            ),
            ValueChangeKind::Added | ValueChangeKind::Renamed => {}
        }
    }
}
