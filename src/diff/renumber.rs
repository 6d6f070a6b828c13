//! Renumbered-field detection
//!
//! Without a mapping, a field moved to another wire number shows up as a
//! removal plus an addition, or as a rename when another field took over its
//! old number. These heuristics pair them back up by name.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChangeKind, FieldChange, FieldChangeKind, MessageDiff};
use crate::config::FieldMapping;
use crate::merged::Cardinality;
use crate::schema::{FieldKind, FieldSlot, ScalarType};
use crate::version::VersionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Compatible types that the merger would convert
    Medium,
    /// Same name and same Rust representation
    High,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// A field that looks like it moved to another wire number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspectedRenumber {
    pub message: String,
    pub field: String,
    pub old_number: u32,
    pub new_number: u32,
    pub confidence: Confidence,
    pub old_version: VersionId,
    pub new_version: VersionId,
}

impl SuspectedRenumber {
    /// Mapping that aligns the two slots when merging
    pub fn mapping(&self) -> FieldMapping {
        FieldMapping::by_numbers(
            self.message.as_str(),
            self.field.as_str(),
            &[(self.old_version.as_str(), self.old_number), (self.new_version.as_str(), self.new_number)],
        )
    }

    /// The mapping as a `[[mappings]]` table for the config file
    pub fn toml_hint(&self) -> String {
        format!(
            "[[mappings]]\nmessage = \"{}\"\nfield = \"{}\"\nnumbers = {{ {} = {}, {} = {} }}\n",
            self.message, self.field, self.old_version, self.old_number, self.new_version, self.new_number
        )
    }
}

/// Whether two slots can be the same field under another number
fn confidence(old: &FieldSlot, new: &FieldSlot) -> Option<Confidence> {
    if Cardinality::of(old) != Cardinality::of(new) {
        return None;
    }
    match (&old.kind, &new.kind) {
        (FieldKind::Scalar(a), FieldKind::Scalar(b)) => {
            if a.rust_type() == b.rust_type() {
                Some(Confidence::High)
            } else if (a.is_numeric() && b.is_numeric() && a.is_floating() == b.is_floating())
                || (a.is_text_or_bytes() && b.is_text_or_bytes())
            {
                Some(Confidence::Medium)
            } else {
                None
            }
        }
        (FieldKind::Scalar(s), FieldKind::Enum(_)) | (FieldKind::Enum(_), FieldKind::Scalar(s)) if s.is_integer() => {
            Some(Confidence::Medium)
        }
        (FieldKind::Enum(a), FieldKind::Enum(b)) | (FieldKind::Message(a), FieldKind::Message(b)) => {
            // References carry the package, so only the trailing name is comparable
            let tail = |r: &str| r.rsplit('.').next().unwrap_or("").to_string();
            if tail(a) == tail(b) {
                Some(Confidence::High)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Suspected renumbers across every modified message
pub fn detect(messages: &[MessageDiff], old_version: &VersionId, new_version: &VersionId) -> Vec<SuspectedRenumber> {
    let mut out = Vec::new();
    for message in messages.iter().filter(|m| m.change == ChangeKind::Modified) {
        for (old, new) in candidates(&message.fields) {
            let Some(confidence) = confidence(old, new) else {
                continue;
            };
            if old.number == new.number {
                continue;
            }
            debug!(message = %message.path, field = %new.name, old = old.number, new = new.number, "Suspected renumber");
            out.push(SuspectedRenumber {
                message: message.path.clone(),
                field: new.name.clone(),
                old_number: old.number,
                new_number: new.number,
                confidence,
                old_version: old_version.clone(),
                new_version: new_version.clone(),
            });
        }
    }
    out
}

/// `(old slot, new slot)` pairs sharing a name across different numbers
fn candidates<'a>(fields: &'a [FieldChange]) -> Vec<(&'a FieldSlot, &'a FieldSlot)> {
    let removed: Vec<&FieldSlot> = fields
        .iter()
        .filter(|f| f.has(FieldChangeKind::Removed))
        .filter_map(|f| f.old.as_ref())
        .collect();
    let added: Vec<&FieldSlot> = fields
        .iter()
        .filter(|f| f.has(FieldChangeKind::Added))
        .filter_map(|f| f.new.as_ref())
        .collect();
    let renamed: Vec<(&FieldSlot, &FieldSlot)> = fields
        .iter()
        .filter(|f| f.has(FieldChangeKind::Renamed) && !f.has(FieldChangeKind::Renumbered))
        .filter_map(|f| Some((f.old.as_ref()?, f.new.as_ref()?)))
        .collect();

    let mut pairs: Vec<(&FieldSlot, &FieldSlot)> = Vec::new();
    let mut claim = |old: &'a FieldSlot, new: &'a FieldSlot| {
        if !pairs.iter().any(|(o, n)| o.number == old.number || n.number == new.number) {
            pairs.push((old, new));
        }
    };

    // A field removed under one number and added under another
    for old in &removed {
        if let Some(new) = added.iter().find(|n| n.name == old.name) {
            claim(*old, *new);
        }
    }
    // A removed field whose name now sits on another field's old number
    for old in &removed {
        if let Some((_, new)) = renamed.iter().find(|(_, n)| n.name == old.name) {
            claim(*old, *new);
        }
    }
    // An added field carrying the name another field gave up with its number
    for new in &added {
        if let Some((old, _)) = renamed.iter().find(|(o, _)| o.name == new.name) {
            claim(*old, *new);
        }
    }
    pairs
}
