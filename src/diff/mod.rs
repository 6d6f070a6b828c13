//! Schema Diff
//!
//! Compares two versions of a schema and reports what changed between them,
//! which of those changes break existing readers or writers, and which
//! removed/added field pairs look like a renumbered field.
//!
//! Architecture:
//! - this module: pairing of messages, fields and enums into change records
//! - `breaking`: severity policy over the change records
//! - `renumber`: heuristics for fields that moved to another wire number
//! - `format`: text, JSON and Markdown renderings
//!
//! Fields pair by explicit [`FieldMapping`] first, then by wire number.
//! References compare by logical path, so a package rename alone is not a
//! change.

pub mod breaking;
pub mod format;
pub mod renumber;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::config::FieldMapping;
use crate::diagnostics::Severity;
use crate::merge::classify::classify_scalars;
use crate::merged::{Cardinality, ConflictType, Repr};
use crate::schema::{join_path, simple_name, EnumDef, FieldKind, FieldSlot, Label, MessageDef, VersionSchema};
use crate::version::VersionId;

pub use self::breaking::{BreakingChange, BreakingKind};
pub use self::renumber::{Confidence, SuspectedRenumber};

// =============================================================================
// Change Records
// =============================================================================

/// What happened to a message or enum as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
    /// Same definition under another logical path (enums only)
    Moved,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
            Self::Moved => "moved",
        }
    }
}

/// One aspect in which a field differs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldChangeKind {
    Added,
    Removed,
    /// Paired through a field mapping under another number
    Renumbered,
    Renamed,
    TypeChanged,
    CardinalityChanged,
    LabelChanged,
    OneofChanged,
}

/// A field that differs between the two versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Old number when the field existed before, else the new one
    pub number: u32,
    /// New name when the field still exists, else the old one
    pub name: String,
    pub kinds: Vec<FieldChangeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<FieldSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<FieldSlot>,
    /// Classification of a type change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictType>,
    /// One line per difference (`type: int32 -> int64`)
    pub details: Vec<String>,
}

impl FieldChange {
    pub fn has(&self, kind: FieldChangeKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Kind listed first; the one formatters lead with
    pub fn primary(&self) -> Option<FieldChangeKind> {
        self.kinds.first().copied()
    }
}

/// Changes of one message, flattened by logical path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDiff {
    pub path: String,
    pub change: ChangeKind,
    pub fields: Vec<FieldChange>,
}

/// What happened to one enum member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueChangeKind {
    Added,
    Removed,
    NumberChanged,
    /// Same number under another name
    Renamed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValueChange {
    pub name: String,
    pub kind: ValueChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_number: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_number: Option<i32>,
    /// Old name of a renamed member
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDiff {
    pub path: String,
    pub change: ChangeKind,
    /// New path of a moved enum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_to: Option<String>,
    pub values: Vec<EnumValueChange>,
}

/// Entry counts of a diff
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub messages_added: usize,
    pub messages_removed: usize,
    pub messages_modified: usize,
    pub enums_added: usize,
    pub enums_removed: usize,
    pub enums_modified: usize,
    pub errors: usize,
    pub warnings: usize,
    pub suspected_renumbers: usize,
}

/// Result of comparing two schema versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDiff {
    pub old_version: VersionId,
    pub new_version: VersionId,
    pub messages: Vec<MessageDiff>,
    pub enums: Vec<EnumDiff>,
    pub breaking: Vec<BreakingChange>,
    pub renumbers: Vec<SuspectedRenumber>,
    pub summary: DiffSummary,
}

impl SchemaDiff {
    /// Any error-severity breaking change
    pub fn is_breaking(&self) -> bool {
        self.summary.errors > 0
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.enums.is_empty()
    }

    pub fn message(&self, path: &str) -> Option<&MessageDiff> {
        self.messages.iter().find(|m| m.path == path)
    }

    pub fn enumeration(&self, path: &str) -> Option<&EnumDiff> {
        self.enums.iter().find(|e| e.path == path)
    }

    /// Field change by message path and (new or old) field name
    pub fn field(&self, message: &str, field: &str) -> Option<&FieldChange> {
        self.message(message)?.fields.iter().find(|f| {
            f.name == field || f.old.as_ref().map(|o| o.name == field).unwrap_or(false)
        })
    }

    /// Breaking changes at or above a severity
    pub fn breaking_at_least(&self, severity: Severity) -> impl Iterator<Item = &BreakingChange> {
        self.breaking.iter().filter(move |b| b.severity >= severity)
    }
}

// =============================================================================
// Comparison
// =============================================================================

/// Compares two versions of a schema
#[derive(Debug, Clone, Default)]
pub struct SchemaDiffer {
    mappings: Vec<FieldMapping>,
}

impl SchemaDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat fields aligned by these mappings as the same field
    pub fn with_mappings(mut self, mappings: &[FieldMapping]) -> Self {
        self.mappings.extend(mappings.iter().cloned());
        self
    }

    pub fn compare(&self, old: &VersionSchema, new: &VersionSchema) -> SchemaDiff {
        let side = Sides { old, new };

        let old_messages = flatten(&old.messages);
        let new_messages = flatten(&new.messages);
        let mut messages = Vec::new();
        for (path, old_def) in &old_messages {
            match new_messages.iter().find(|(p, _)| p == path) {
                Some((_, new_def)) => {
                    let fields = self.compare_fields(&side, path, old_def, new_def);
                    if !fields.is_empty() {
                        messages.push(MessageDiff { path: path.clone(), change: ChangeKind::Modified, fields });
                    }
                }
                None => messages.push(MessageDiff { path: path.clone(), change: ChangeKind::Removed, fields: Vec::new() }),
            }
        }
        for (path, _) in &new_messages {
            if !old_messages.iter().any(|(p, _)| p == path) {
                messages.push(MessageDiff { path: path.clone(), change: ChangeKind::Added, fields: Vec::new() });
            }
        }

        let enums = compare_enums(old, new);
        let breaking = breaking::detect(&messages, &enums, &new_messages);
        let renumbers = renumber::detect(&messages, &old.version, &new.version);

        let mut summary = DiffSummary::default();
        for message in &messages {
            match message.change {
                ChangeKind::Added => summary.messages_added += 1,
                ChangeKind::Removed => summary.messages_removed += 1,
                _ => summary.messages_modified += 1,
            }
        }
        for diff in &enums {
            match diff.change {
                ChangeKind::Added => summary.enums_added += 1,
                ChangeKind::Removed => summary.enums_removed += 1,
                _ => summary.enums_modified += 1,
            }
        }
        summary.errors = breaking.iter().filter(|b| b.severity == Severity::Error).count();
        summary.warnings = breaking.iter().filter(|b| b.severity == Severity::Warning).count();
        summary.suspected_renumbers = renumbers.len();

        info!(
            old = %old.version,
            new = %new.version,
            messages = messages.len(),
            enums = enums.len(),
            errors = summary.errors,
            warnings = summary.warnings,
            "Compared schema versions"
        );

        SchemaDiff {
            old_version: old.version.clone(),
            new_version: new.version.clone(),
            messages,
            enums,
            breaking,
            renumbers,
            summary,
        }
    }

    fn compare_fields(&self, side: &Sides<'_>, path: &str, old: &MessageDef, new: &MessageDef) -> Vec<FieldChange> {
        let mut pairs: Vec<(Option<&FieldSlot>, Option<&FieldSlot>, bool)> = Vec::new();
        let mut used_old: BTreeSet<u32> = BTreeSet::new();
        let mut used_new: BTreeSet<u32> = BTreeSet::new();

        for mapping in self.mappings.iter().filter(|m| m.applies_to(path)) {
            let old_slot = match mapping.number_for(&side.old.version) {
                Some(n) => old.field_by_number(n),
                None => old.field_by_name(&mapping.field),
            };
            let new_slot = match mapping.number_for(&side.new.version) {
                Some(n) => new.field_by_number(n),
                None => new.field_by_name(&mapping.field),
            };
            if let (Some(o), Some(n)) = (old_slot, new_slot) {
                if used_old.insert(o.number) && used_new.insert(n.number) {
                    debug!(message = %path, field = %mapping.field, old = o.number, new = n.number, "Paired by mapping");
                    pairs.push((Some(o), Some(n), true));
                }
            }
        }

        for o in old.fields.iter().filter(|f| !used_old.contains(&f.number)) {
            match new.field_by_number(o.number).filter(|n| !used_new.contains(&n.number)) {
                Some(n) => {
                    used_new.insert(n.number);
                    pairs.push((Some(o), Some(n), false));
                }
                None => pairs.push((Some(o), None, false)),
            }
        }
        for n in new.fields.iter().filter(|f| !used_new.contains(&f.number)) {
            pairs.push((None, Some(n), false));
        }

        pairs
            .into_iter()
            .filter_map(|(o, n, mapped)| compare_field(side, o, n, mapped))
            .collect()
    }
}

struct Sides<'a> {
    old: &'a VersionSchema,
    new: &'a VersionSchema,
}

/// Every message with its logical path, parents before nested messages
fn flatten(messages: &[MessageDef]) -> Vec<(String, &MessageDef)> {
    fn walk<'a>(prefix: &str, message: &'a MessageDef, out: &mut Vec<(String, &'a MessageDef)>) {
        let path = join_path(prefix, &message.name);
        for nested in &message.messages {
            walk(&path, nested, out);
        }
        out.push((path, message));
    }
    let mut out = Vec::new();
    for message in messages {
        walk("", message, &mut out);
    }
    out.sort_by_key(|(path, _)| path.matches('.').count());
    out
}

fn repr_of(schema: &VersionSchema, slot: &FieldSlot) -> Repr {
    match &slot.kind {
        FieldKind::Scalar(s) => Repr::Scalar(*s),
        FieldKind::Enum(r) => Repr::Enum(schema.logical_path(r)),
        FieldKind::Message(r) => Repr::Message(schema.logical_path(r)),
    }
}

fn label_name(slot: &FieldSlot) -> String {
    match Cardinality::of(slot) {
        Cardinality::Map(key) => format!("map<{}, _>", key),
        Cardinality::Repeated => "repeated".to_string(),
        Cardinality::Single => match slot.label {
            Label::Required => "required".to_string(),
            _ => "optional".to_string(),
        },
    }
}

/// Equal member sets under the same simple name count as one enum
fn equivalent_enums(side: &Sides<'_>, old_path: &str, new_path: &str) -> bool {
    match (side.old.find_enum(old_path), side.new.find_enum(new_path)) {
        (Some(a), Some(b)) => simple_name(old_path) == simple_name(new_path) && a.signature() == b.signature(),
        _ => false,
    }
}

/// Conflict between two element types; `None` when they are the same type
fn type_conflict(side: &Sides<'_>, old: &Repr, new: &Repr) -> Option<ConflictType> {
    if old == new {
        return None;
    }
    let conflict = match (old, new) {
        (Repr::Scalar(a), Repr::Scalar(b)) => classify_scalars(*a, *b),
        (Repr::Scalar(s), Repr::Enum(_)) | (Repr::Enum(_), Repr::Scalar(s)) if s.is_integer() => ConflictType::IntEnum,
        (Repr::Scalar(_), Repr::Message(_)) | (Repr::Message(_), Repr::Scalar(_)) => ConflictType::PrimitiveMessage,
        (Repr::Enum(a), Repr::Enum(b)) if equivalent_enums(side, a, b) => return None,
        _ => ConflictType::Incompatible,
    };
    Some(conflict)
}

fn compare_field(side: &Sides<'_>, old: Option<&FieldSlot>, new: Option<&FieldSlot>, mapped: bool) -> Option<FieldChange> {
    let (o, n) = match (old, new) {
        (Some(o), Some(n)) => (o, n),
        (Some(o), None) => {
            return Some(FieldChange {
                number: o.number,
                name: o.name.clone(),
                kinds: vec![FieldChangeKind::Removed],
                old: Some(o.clone()),
                new: None,
                conflict: None,
                details: vec![format!("removed {} #{}", repr_of(side.old, o), o.number)],
            })
        }
        (None, Some(n)) => {
            return Some(FieldChange {
                number: n.number,
                name: n.name.clone(),
                kinds: vec![FieldChangeKind::Added],
                old: None,
                new: Some(n.clone()),
                conflict: None,
                details: vec![format!("added {} #{}", repr_of(side.new, n), n.number)],
            })
        }
        (None, None) => return None,
    };

    let mut kinds = Vec::new();
    let mut details = Vec::new();
    if mapped && o.number != n.number {
        kinds.push(FieldChangeKind::Renumbered);
        details.push(format!("number: #{} -> #{}", o.number, n.number));
    }
    if o.name != n.name {
        kinds.push(FieldChangeKind::Renamed);
        details.push(format!("name: {} -> {}", o.name, n.name));
    }
    let (old_repr, new_repr) = (repr_of(side.old, o), repr_of(side.new, n));
    let conflict = type_conflict(side, &old_repr, &new_repr);
    if let Some(conflict) = conflict {
        kinds.push(FieldChangeKind::TypeChanged);
        details.push(format!("type: {} -> {} ({})", old_repr, new_repr, conflict));
    } else if old_repr != new_repr {
        details.push(format!("type: {} -> {} (equivalent)", old_repr, new_repr));
    }
    if Cardinality::of(o) != Cardinality::of(n) {
        kinds.push(FieldChangeKind::CardinalityChanged);
        details.push(format!("cardinality: {} -> {}", label_name(o), label_name(n)));
    } else if o.label != n.label {
        kinds.push(FieldChangeKind::LabelChanged);
        details.push(format!("label: {} -> {}", label_name(o), label_name(n)));
    }
    if o.oneof != n.oneof {
        kinds.push(FieldChangeKind::OneofChanged);
        details.push(format!(
            "oneof: {} -> {}",
            o.oneof.as_deref().unwrap_or("-"),
            n.oneof.as_deref().unwrap_or("-")
        ));
    }

    if kinds.is_empty() {
        return None;
    }
    Some(FieldChange {
        number: o.number,
        name: n.name.clone(),
        kinds,
        old: Some(o.clone()),
        new: Some(n.clone()),
        conflict,
        details,
    })
}

fn compare_enums(old: &VersionSchema, new: &VersionSchema) -> Vec<EnumDiff> {
    let old_enums = old.all_enums();
    let new_enums = new.all_enums();
    let mut out = Vec::new();
    let mut moved_targets: BTreeSet<&str> = BTreeSet::new();

    for (path, old_def) in &old_enums {
        if let Some((_, new_def)) = new_enums.iter().find(|(p, _)| p == path) {
            let values = compare_values(old_def, new_def);
            if !values.is_empty() {
                out.push(EnumDiff { path: path.clone(), change: ChangeKind::Modified, moved_to: None, values });
            }
            continue;
        }
        let target = new_enums.iter().find(|(p, def)| {
            simple_name(p) == old_def.name
                && def.signature() == old_def.signature()
                && !old_enums.iter().any(|(op, _)| op == p)
                && !moved_targets.contains(p.as_str())
        });
        match target {
            Some((new_path, _)) => {
                moved_targets.insert(new_path.as_str());
                out.push(EnumDiff {
                    path: path.clone(),
                    change: ChangeKind::Moved,
                    moved_to: Some(new_path.clone()),
                    values: Vec::new(),
                });
            }
            None => out.push(EnumDiff { path: path.clone(), change: ChangeKind::Removed, moved_to: None, values: Vec::new() }),
        }
    }
    for (path, _) in &new_enums {
        if !old_enums.iter().any(|(p, _)| p == path) && !moved_targets.contains(path.as_str()) {
            out.push(EnumDiff { path: path.clone(), change: ChangeKind::Added, moved_to: None, values: Vec::new() });
        }
    }
    out
}

fn compare_values(old: &EnumDef, new: &EnumDef) -> Vec<EnumValueChange> {
    let mut out = Vec::new();
    for value in &old.values {
        match new.values.iter().find(|v| v.name == value.name) {
            Some(v) if v.number != value.number => out.push(EnumValueChange {
                name: value.name.clone(),
                kind: ValueChangeKind::NumberChanged,
                old_number: Some(value.number),
                new_number: Some(v.number),
                old_name: None,
            }),
            Some(_) => {}
            None => match new.values.iter().find(|v| v.number == value.number && old.values.iter().all(|o| o.name != v.name)) {
                Some(v) => out.push(EnumValueChange {
                    name: v.name.clone(),
                    kind: ValueChangeKind::Renamed,
                    old_number: Some(value.number),
                    new_number: Some(v.number),
                    old_name: Some(value.name.clone()),
                }),
                None => out.push(EnumValueChange {
                    name: value.name.clone(),
                    kind: ValueChangeKind::Removed,
                    old_number: Some(value.number),
                    new_number: None,
                    old_name: None,
                }),
            },
        }
    }
    for value in &new.values {
        let known = old.values.iter().any(|o| o.name == value.name)
            || out.iter().any(|c| c.kind == ValueChangeKind::Renamed && c.name == value.name);
        if !known {
            out.push(EnumValueChange {
                name: value.name.clone(),
                kind: ValueChangeKind::Added,
                old_number: None,
                new_number: Some(value.number),
                old_name: None,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ScalarType;

    fn scalar(name: &str, number: u32, s: ScalarType) -> FieldSlot {
        FieldSlot::new(name, number, FieldKind::Scalar(s))
    }

    fn order(fields: Vec<FieldSlot>) -> MessageDef {
        fields.into_iter().fold(MessageDef::new("Order"), MessageDef::field)
    }

    fn versions(old: MessageDef, new: MessageDef) -> (VersionSchema, VersionSchema) {
        (
            VersionSchema::new("v1", "shop.v1").message(old),
            VersionSchema::new("v2", "shop.v2").message(new),
        )
    }

    #[test]
    fn test_identical_versions_have_no_changes() {
        let (v1, v2) = versions(
            order(vec![scalar("id", 1, ScalarType::String)]),
            order(vec![scalar("id", 1, ScalarType::String)]),
        );
        let diff = SchemaDiffer::new().compare(&v1, &v2);

        assert!(diff.is_empty());
        assert!(!diff.is_breaking());
    }

    #[test]
    fn test_messages_added_and_removed() {
        let v1 = VersionSchema::new("v1", "shop.v1").message(MessageDef::new("Legacy")).message(MessageDef::new("Order"));
        let v2 = VersionSchema::new("v2", "shop.v2")
            .message(MessageDef::new("Order").nested(MessageDef::new("Item")));
        let diff = SchemaDiffer::new().compare(&v1, &v2);

        assert_eq!(diff.message("Legacy").unwrap().change, ChangeKind::Removed);
        assert_eq!(diff.message("Order.Item").unwrap().change, ChangeKind::Added);
        assert!(diff.message("Order").is_none());
        assert_eq!(diff.summary.messages_added, 1);
        assert_eq!(diff.summary.messages_removed, 1);
    }

    #[test]
    fn test_field_added_removed_and_renamed() {
        let (v1, v2) = versions(
            order(vec![scalar("id", 1, ScalarType::String), scalar("note", 2, ScalarType::String)]),
            order(vec![scalar("code", 1, ScalarType::String), scalar("total", 3, ScalarType::Int64)]),
        );
        let diff = SchemaDiffer::new().compare(&v1, &v2);

        assert_eq!(diff.field("Order", "code").unwrap().kinds, vec![FieldChangeKind::Renamed]);
        assert_eq!(diff.field("Order", "id").unwrap().name, "code");
        assert_eq!(diff.field("Order", "note").unwrap().kinds, vec![FieldChangeKind::Removed]);
        assert_eq!(diff.field("Order", "total").unwrap().kinds, vec![FieldChangeKind::Added]);
    }

    #[test]
    fn test_type_change_is_classified() {
        let (v1, v2) = versions(
            order(vec![scalar("total", 1, ScalarType::Int32), scalar("ratio", 2, ScalarType::Double)]),
            order(vec![scalar("total", 1, ScalarType::Int64), scalar("ratio", 2, ScalarType::Float)]),
        );
        let diff = SchemaDiffer::new().compare(&v1, &v2);

        let total = diff.field("Order", "total").unwrap();
        assert_eq!(total.kinds, vec![FieldChangeKind::TypeChanged]);
        assert_eq!(total.conflict, Some(ConflictType::Widening));
        assert_eq!(total.details[0], "type: int32 -> int64 (WIDENING)");
        assert_eq!(diff.field("Order", "ratio").unwrap().conflict, Some(ConflictType::FloatDouble));
    }

    #[test]
    fn test_cardinality_label_and_oneof_changes() {
        let (v1, v2) = versions(
            order(vec![
                scalar("tags", 1, ScalarType::String),
                scalar("id", 2, ScalarType::String),
                scalar("card", 3, ScalarType::String),
            ]),
            order(vec![
                scalar("tags", 1, ScalarType::String).repeated(),
                scalar("id", 2, ScalarType::String).required(),
                scalar("card", 3, ScalarType::String).in_oneof("method"),
            ]),
        );
        let diff = SchemaDiffer::new().compare(&v1, &v2);

        assert!(diff.field("Order", "tags").unwrap().has(FieldChangeKind::CardinalityChanged));
        assert!(diff.field("Order", "id").unwrap().has(FieldChangeKind::LabelChanged));
        let card = diff.field("Order", "card").unwrap();
        assert!(card.has(FieldChangeKind::OneofChanged));
        assert_eq!(card.details, vec!["oneof: - -> method".to_string()]);
    }

    #[test]
    fn test_mapping_pairs_renumbered_field() {
        let (v1, v2) = versions(
            order(vec![scalar("amount", 10, ScalarType::Int64)]),
            order(vec![scalar("amount", 8, ScalarType::Int64), scalar("reference", 10, ScalarType::String)]),
        );
        let mapping = FieldMapping::by_numbers("Order", "amount", &[("v1", 10), ("v2", 8)]);
        let diff = SchemaDiffer::new().with_mappings(&[mapping]).compare(&v1, &v2);

        let amount = diff.field("Order", "amount").unwrap();
        assert_eq!(amount.kinds, vec![FieldChangeKind::Renumbered]);
        assert_eq!(amount.number, 10);
        assert_eq!(amount.new.as_ref().unwrap().number, 8);
        assert_eq!(diff.field("Order", "reference").unwrap().kinds, vec![FieldChangeKind::Added]);
        assert!(diff.renumbers.is_empty());
    }

    #[test]
    fn test_moved_enum_is_not_a_type_change() {
        let tax = EnumDef::new("TaxType", &[("VAT", 100)]);
        let v1 = VersionSchema::new("v1", "shop.v1").message(
            MessageDef::new("Order")
                .nested_enum(tax.clone())
                .field(FieldSlot::new("tax", 1, FieldKind::Enum(".shop.v1.Order.TaxType".into()))),
        );
        let v2 = VersionSchema::new("v2", "shop.v2")
            .enumeration(tax)
            .message(MessageDef::new("Order").field(FieldSlot::new("tax", 1, FieldKind::Enum(".shop.v2.TaxType".into()))));
        let diff = SchemaDiffer::new().compare(&v1, &v2);

        assert!(diff.message("Order").is_none());
        let moved = diff.enumeration("Order.TaxType").unwrap();
        assert_eq!(moved.change, ChangeKind::Moved);
        assert_eq!(moved.moved_to.as_deref(), Some("TaxType"));
        assert!(diff.enumeration("TaxType").is_none());
        assert!(!diff.is_breaking());
    }

    #[test]
    fn test_enum_value_changes() {
        let v1 = VersionSchema::new("v1", "s").enumeration(EnumDef::new(
            "Status",
            &[("OPEN", 0), ("CLOSED", 1), ("HELD", 2), ("LOST", 3)],
        ));
        let v2 = VersionSchema::new("v2", "s").enumeration(EnumDef::new(
            "Status",
            &[("OPEN", 0), ("CLOSED", 5), ("PAUSED", 2), ("ARCHIVED", 4)],
        ));
        let diff = SchemaDiffer::new().compare(&v1, &v2);
        let status = diff.enumeration("Status").unwrap();
        let kind_of = |name: &str| status.values.iter().find(|v| v.name == name).map(|v| v.kind);

        assert_eq!(status.change, ChangeKind::Modified);
        assert_eq!(kind_of("CLOSED"), Some(ValueChangeKind::NumberChanged));
        assert_eq!(kind_of("PAUSED"), Some(ValueChangeKind::Renamed));
        assert_eq!(kind_of("LOST"), Some(ValueChangeKind::Removed));
        assert_eq!(kind_of("ARCHIVED"), Some(ValueChangeKind::Added));
        assert_eq!(status.values.len(), 4);
    }
}
