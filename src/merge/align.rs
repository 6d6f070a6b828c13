//! Field alignment
//!
//! Decides which per-version field slots are the same logical field.
//!
//! 1. Mappings with explicit per-version numbers claim those slots first.
//! 2. Name-only mappings claim same-named slots when at least two versions
//!    declare the name; a name found in one version is left alone.
//! 3. Everything unclaimed is grouped by wire number.
//!
//! A slot displaced by a mapping stays its own version-exclusive field.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use std::collections::HashSet;
use tracing::debug;

use crate::config::FieldMapping;
use crate::diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics};
use crate::schema::{join_path, FieldSlot, MessageDef};
use crate::version::VersionId;

/// Slots of one logical field, one entry per version
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedField {
    pub name: String,
    pub slots: Vec<(VersionId, Option<FieldSlot>)>,
    pub name_mapped: bool,
    first_seen: (usize, usize),
}

impl AlignedField {
    fn empty(name: &str, versions: &[(&VersionId, Option<&MessageDef>)], name_mapped: bool) -> Self {
        Self {
            name: name.to_string(),
            slots: versions.iter().map(|(v, _)| ((*v).clone(), None)).collect(),
            name_mapped,
            first_seen: (usize::MAX, usize::MAX),
        }
    }

    fn put(&mut self, version_index: usize, field_index: usize, slot: &FieldSlot) {
        self.slots[version_index].1 = Some(slot.clone());
        self.first_seen = self.first_seen.min((version_index, field_index));
    }

    fn present_count(&self) -> usize {
        self.slots.iter().filter(|(_, s)| s.is_some()).count()
    }

    fn latest_slot(&self) -> Option<&FieldSlot> {
        self.slots.iter().rev().find_map(|(_, s)| s.as_ref())
    }

    /// Number in the latest version declaring the field
    pub fn number(&self) -> u32 {
        self.latest_slot().map(|s| s.number).unwrap_or(0)
    }
}

/// Align the fields of one message across versions.
///
/// `defs` has one entry per merged version (None where the message is absent).
pub fn align_fields(
    path: &str,
    defs: &[(&VersionId, Option<&MessageDef>)],
    mappings: &[&FieldMapping],
    diagnostics: &mut Diagnostics,
) -> Vec<AlignedField> {
    let mut claimed: HashSet<(usize, u32)> = HashSet::new();
    let mut fields: Vec<AlignedField> = Vec::new();

    check_duplicate_numbers(path, defs, diagnostics);

    // Explicit numbers first, then names
    for mapping in mappings.iter().filter(|m| m.is_numbered()) {
        let mut field = AlignedField::empty(&mapping.field, defs, true);
        for (vi, (version, def)) in defs.iter().enumerate() {
            let Some(def) = def else { continue };
            let found = match mapping.number_for(version) {
                Some(number) => def.fields.iter().position(|f| f.number == number),
                None => def.fields.iter().position(|f| f.name == mapping.field),
            };
            if let Some(fi) = found {
                let slot = &def.fields[fi];
                if claimed.insert((vi, slot.number)) {
                    field.put(vi, fi, slot);
                }
            }
        }
        if field.present_count() == 0 {
            report_unmatched(path, mapping, defs, diagnostics);
            continue;
        }
        debug!(message = %path, field = %mapping.field, "Aligned field by explicit numbers");
        fields.push(field);
    }

    for mapping in mappings.iter().filter(|m| !m.is_numbered()) {
        let mut field = AlignedField::empty(&mapping.field, defs, true);
        for (vi, (_, def)) in defs.iter().enumerate() {
            let Some(def) = def else { continue };
            if let Some(fi) = def.fields.iter().position(|f| f.name == mapping.field) {
                if !claimed.contains(&(vi, def.fields[fi].number)) {
                    field.put(vi, fi, &def.fields[fi]);
                }
            }
        }
        match field.present_count() {
            0 => report_unmatched(path, mapping, defs, diagnostics),
            1 => debug!(message = %path, field = %mapping.field, "Name mapping matches one version; left to number alignment"),
            _ => {
                for (vi, (_, slot)) in field.slots.iter().enumerate() {
                    if let Some(slot) = slot {
                        claimed.insert((vi, slot.number));
                    }
                }
                debug!(message = %path, field = %mapping.field, "Aligned field by name");
                fields.push(field);
            }
        }
    }

    // Default: group by wire number
    let mut by_number: Vec<(u32, usize)> = Vec::new();
    for (vi, (_, def)) in defs.iter().enumerate() {
        let Some(def) = def else { continue };
        for (fi, slot) in def.fields.iter().enumerate() {
            if claimed.contains(&(vi, slot.number)) {
                continue;
            }
            let index = match by_number.iter().find(|(n, _)| *n == slot.number) {
                Some((_, index)) => *index,
                None => {
                    fields.push(AlignedField::empty(&slot.name, defs, false));
                    by_number.push((slot.number, fields.len() - 1));
                    fields.len() - 1
                }
            };
            if fields[index].slots[vi].1.is_none() {
                fields[index].put(vi, fi, slot);
            }
        }
    }

    for field in fields.iter_mut().filter(|f| !f.name_mapped) {
        if let Some(latest) = field.latest_slot() {
            field.name = latest.name.clone();
        }
    }

    fields.sort_by_key(|f| f.first_seen);
    disambiguate_names(path, &mut fields, diagnostics);
    fields
}

fn check_duplicate_numbers(
    path: &str,
    defs: &[(&VersionId, Option<&MessageDef>)],
    diagnostics: &mut Diagnostics,
) {
    for (version, def) in defs {
        let Some(def) = def else { continue };
        for (i, slot) in def.fields.iter().enumerate() {
            if let Some(other) = def.fields[..i].iter().find(|f| f.number == slot.number) {
                diagnostics.push(
                    DiagnosticItem::new(
                        join_path(path, &slot.name),
                        DiagnosticCode::FieldNumberConflict,
                        format!(
                            "Field number {} used by both '{}' and '{}' in {}",
                            slot.number, other.name, slot.name, version
                        ),
                    )
                    .with_context(format!("version: {}", version)),
                );
            }
        }
    }
}

/// Rename accessors that would clash; the field present in the latest
/// version keeps the plain name
fn disambiguate_names(path: &str, fields: &mut [AlignedField], diagnostics: &mut Diagnostics) {
    let last = fields.first().map(|f| f.slots.len().saturating_sub(1)).unwrap_or(0);
    let mut names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
    names.sort();
    names.dedup();

    for name in names {
        let clashing: Vec<usize> = (0..fields.len()).filter(|&i| fields[i].name == name).collect();
        if clashing.len() < 2 {
            continue;
        }
        let keeper = clashing
            .iter()
            .copied()
            .find(|&i| fields[i].slots.get(last).map(|(_, s)| s.is_some()).unwrap_or(false))
            .unwrap_or(clashing[clashing.len() - 1]);
        for index in clashing.into_iter().filter(|&i| i != keeper) {
            let renamed = format!("{}_{}", name, fields[index].number());
            diagnostics.report(
                join_path(path, &renamed),
                DiagnosticCode::RenamedAccessor,
                format!("Field '{}' #{} renamed to '{}' to avoid an accessor clash", name, fields[index].number(), renamed),
            );
            fields[index].name = renamed;
        }
    }
}

fn report_unmatched(
    path: &str,
    mapping: &FieldMapping,
    defs: &[(&VersionId, Option<&MessageDef>)],
    diagnostics: &mut Diagnostics,
) {
    let matcher = SkimMatcherV2::default();
    let suggestion = defs
        .iter()
        .filter_map(|(_, d)| *d)
        .flat_map(|d| d.fields.iter())
        .filter_map(|f| matcher.fuzzy_match(&f.name, &mapping.field).map(|score| (score, &f.name)))
        .max_by_key(|(score, _)| *score)
        .map(|(_, name)| name.clone());

    let mut item = DiagnosticItem::new(
        join_path(path, &mapping.field),
        DiagnosticCode::UnmatchedMapping,
        format!("Field mapping '{}.{}' matches no field", mapping.message, mapping.field),
    );
    if let Some(name) = suggestion {
        item = item.with_context(format!("did you mean '{}'?", name));
    }
    diagnostics.push(item);
}
