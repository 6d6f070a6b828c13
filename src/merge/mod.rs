//! Schema Merging
//!
//! Combines N per-version schema trees into one [`MergedSchema`].
//!
//! Architecture:
//! - `enums`: path grouping and structural collapse of enums
//! - `align`: which per-version slots form one logical field
//! - `classify`: conflict type and unified accessor type per field
//! - `validate`: reserved reuse, oneof conflicts, required cycles
//!
//! The merge is a pure function of its inputs: every nested message is
//! built by a recursive call that returns a finished value, and nothing is
//! mutated once returned. Problems are collected as [`Diagnostics`] rather
//! than aborting the merge.

pub mod align;
pub mod classify;
pub mod enums;
pub mod validate;

use std::collections::BTreeSet;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use tracing::{debug, info, warn};

use crate::config::{FieldMapping, GeneratorConfig, MessageFilter};
use crate::diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics};
use crate::error::Result;
use crate::merged::{
    Cardinality, ConflictType, Handling, MergedEnum, MergedField, MergedMessage, MergedSchema, Repr, VersionSlot,
};
use crate::schema::{join_path, FieldKind, MessageDef, VersionSchema};
use crate::version::VersionSet;

use self::align::AlignedField;
use self::classify::{classify, Observed};
use self::enums::EnumMerge;

/// Merged schema plus everything noticed while building it
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub schema: MergedSchema,
    pub diagnostics: Diagnostics,
}

/// Merges per-version schemas into one version-agnostic tree
#[derive(Debug, Clone, Default)]
pub struct SchemaMerger {
    mappings: Vec<FieldMapping>,
    filter: MessageFilter,
}

impl SchemaMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merger honouring the mappings and filters of a configuration
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        Ok(Self {
            mappings: config.mappings.clone(),
            filter: config.filter.compile()?,
        })
    }

    pub fn with_mapping(mut self, mapping: FieldMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    /// Merge versions given oldest first; the last one is the default
    pub fn merge(&self, versions: &[VersionSchema]) -> Result<MergeOutcome> {
        let version_set = VersionSet::new(versions.iter().map(|v| v.version.clone()).collect())?;
        let normalized: Vec<VersionSchema> = versions.iter().map(VersionSchema::normalized).collect();
        let mut diagnostics = Diagnostics::new();

        let enum_merge = enums::merge_enums(&normalized, &mut diagnostics);

        let mut names: Vec<&str> = Vec::new();
        for schema in &normalized {
            for message in &schema.messages {
                if !names.contains(&message.name.as_str()) {
                    names.push(&message.name);
                }
            }
        }

        let mut messages = Vec::new();
        for name in names {
            if !self.filter.accepts(name) {
                debug!(message = %name, "Skipped by filter");
                continue;
            }
            let defs: Vec<(&VersionSchema, Option<&MessageDef>)> = normalized
                .iter()
                .map(|s| (s, s.messages.iter().find(|m| m.name == name)))
                .collect();
            messages.push(self.merge_message("", name, &defs, &enum_merge, &mut diagnostics));
        }

        let mut enums = enum_merge.children_of("");
        enums.extend(orphaned_enums(&messages, &enum_merge, &mut diagnostics));
        let schema = MergedSchema {
            versions: version_set,
            messages,
            enums,
        };

        self.check_mapping_targets(&schema, &mut diagnostics);
        validate::check_required_cycles(&schema, &mut diagnostics);

        info!(
            versions = schema.versions.len(),
            messages = schema.messages.len(),
            enums = schema.all_enums().len(),
            errors = diagnostics.error_count(),
            warnings = diagnostics.warning_count(),
            "Merged schema versions"
        );

        Ok(MergeOutcome { schema, diagnostics })
    }

    fn merge_message(
        &self,
        parent: &str,
        name: &str,
        defs: &[(&VersionSchema, Option<&MessageDef>)],
        enum_merge: &EnumMerge,
        diagnostics: &mut Diagnostics,
    ) -> MergedMessage {
        let path = join_path(parent, name);
        let slot_defs: Vec<_> = defs.iter().map(|(s, d)| (&s.version, *d)).collect();
        let mappings: Vec<&FieldMapping> = self.mappings.iter().filter(|m| m.applies_to(&path)).collect();

        let aligned = align::align_fields(&path, &slot_defs, &mappings, diagnostics);
        validate::check_reserved(&path, &slot_defs, diagnostics);
        let (membership, oneofs) = validate::unify_oneofs(&path, &aligned, diagnostics);

        let fields = aligned
            .iter()
            .zip(membership)
            .map(|(field, oneof)| build_field(&path, field, oneof, defs, enum_merge, diagnostics))
            .collect();

        let mut nested_names: Vec<&str> = Vec::new();
        for def in defs.iter().filter_map(|(_, d)| *d) {
            for nested in &def.messages {
                if !nested_names.contains(&nested.name.as_str()) {
                    nested_names.push(&nested.name);
                }
            }
        }
        let messages = nested_names
            .into_iter()
            .map(|nested| {
                let child_defs: Vec<(&VersionSchema, Option<&MessageDef>)> = defs
                    .iter()
                    .map(|(s, d)| (*s, d.and_then(|d| d.messages.iter().find(|m| m.name == nested))))
                    .collect();
                self.merge_message(&path, nested, &child_defs, enum_merge, diagnostics)
            })
            .collect();

        MergedMessage {
            name: name.to_string(),
            enums: enum_merge.children_of(&path),
            versions: defs
                .iter()
                .filter(|(_, d)| d.is_some())
                .map(|(s, _)| s.version.clone())
                .collect(),
            path,
            fields,
            messages,
            oneofs,
        }
    }

    /// Warn about mappings naming a message that does not exist
    fn check_mapping_targets(&self, schema: &MergedSchema, diagnostics: &mut Diagnostics) {
        let paths: Vec<&str> = schema.all_messages().iter().map(|m| m.path.as_str()).collect();
        let matcher = SkimMatcherV2::default();
        for mapping in &self.mappings {
            if paths.iter().any(|p| mapping.applies_to(p)) {
                continue;
            }
            let mut item = DiagnosticItem::new(
                mapping.message.clone(),
                DiagnosticCode::UnmatchedMapping,
                format!("Field mapping targets unknown message '{}'", mapping.message),
            );
            let suggestion = paths
                .iter()
                .filter_map(|p| matcher.fuzzy_match(p, &mapping.message).map(|score| (score, *p)))
                .max_by_key(|(score, _)| *score);
            if let Some((_, path)) = suggestion {
                item = item.with_context(format!("did you mean '{}'?", path));
            }
            warn!(message = %mapping.message, field = %mapping.field, "Field mapping matches no message");
            diagnostics.push(item);
        }
    }
}

fn build_field(
    path: &str,
    aligned: &AlignedField,
    oneof: Option<String>,
    defs: &[(&VersionSchema, Option<&MessageDef>)],
    enum_merge: &EnumMerge,
    diagnostics: &mut Diagnostics,
) -> MergedField {
    let slots: Vec<VersionSlot> = aligned
        .slots
        .iter()
        .zip(defs)
        .map(|((version, slot), (schema, _))| VersionSlot {
            version: version.clone(),
            repr: slot.as_ref().map(|s| resolve_repr(schema, &s.kind, enum_merge)),
            slot: slot.clone(),
        })
        .collect();

    let observed: Vec<Observed<'_>> = slots
        .iter()
        .filter_map(|s| {
            Some(Observed {
                repr: s.repr.as_ref()?,
                cardinality: Cardinality::of(s.slot.as_ref()?),
            })
        })
        .collect();
    let classification = classify(&observed, &|p| enum_merge.range(p));

    let field = MergedField {
        name: aligned.name.clone(),
        number: aligned.number(),
        presence: slots.iter().any(|s| s.slot.as_ref().map(|f| f.presence).unwrap_or(false)),
        slots,
        unified: classification.unified,
        cardinality: classification.cardinality,
        conflict: classification.conflict,
        name_mapped: aligned.name_mapped,
        oneof,
    };

    if field.conflict != ConflictType::None {
        report_conflict(path, &field, diagnostics);
    }
    field
}

/// Enums declared inside messages that were not merged (filtered out) but
/// still referenced by a merged field. They keep their logical path and are
/// listed with the top-level enums.
fn orphaned_enums(messages: &[MergedMessage], enum_merge: &EnumMerge, diagnostics: &mut Diagnostics) -> Vec<MergedEnum> {
    let merged_paths: BTreeSet<&str> = messages
        .iter()
        .flat_map(|m| m.walk())
        .map(|m| m.path.as_str())
        .collect();
    let referenced: BTreeSet<&str> = messages
        .iter()
        .flat_map(|m| m.walk())
        .flat_map(|m| m.fields.iter())
        .flat_map(|f| f.slots.iter())
        .filter_map(|s| match &s.repr {
            Some(Repr::Enum(path)) => Some(path.as_str()),
            _ => None,
        })
        .collect();

    let mut out = Vec::new();
    for merged in &enum_merge.enums {
        let Some((parent, _)) = merged.path.rsplit_once('.') else {
            continue;
        };
        if merged_paths.contains(parent) || !referenced.contains(merged.path.as_str()) {
            continue;
        }
        debug!(enum_path = %merged.path, parent = %parent, "Keeping enum of unmerged message");
        diagnostics.push(DiagnosticItem::new(
            merged.path.clone(),
            DiagnosticCode::OrphanedEnum,
            format!("Enum '{}' kept at top level; its message '{}' is not merged", merged.path, parent),
        ));
        out.push(merged.clone());
    }
    out
}

/// Version-independent representation of a field kind
fn resolve_repr(schema: &VersionSchema, kind: &FieldKind, enum_merge: &EnumMerge) -> Repr {
    match kind {
        FieldKind::Scalar(s) => Repr::Scalar(*s),
        FieldKind::Enum(r) => Repr::Enum(enum_merge.resolve(&schema.logical_path(r)).to_string()),
        FieldKind::Message(r) => Repr::Message(schema.logical_path(r)),
    }
}

fn report_conflict(path: &str, field: &MergedField, diagnostics: &mut Diagnostics) {
    let code = match field.conflict.handling() {
        Handling::Native => return,
        Handling::Converted => DiagnosticCode::ConvertedConflict,
        Handling::Manual => DiagnosticCode::ManualConflict,
        Handling::Warning => DiagnosticCode::LossyConflict,
        Handling::Incompatible => DiagnosticCode::IncompatibleTypes,
    };

    warn!(
        message = %path,
        field = %field.name,
        conflict = %field.conflict,
        unified = %field.unified,
        "Type conflict detected"
    );

    let mut item = DiagnosticItem::new(
        join_path(path, &field.name),
        code,
        format!("{}: {}", field.conflict, field.conflict.description()),
    );
    for slot in &field.slots {
        if let (Some(repr), Some(s)) = (&slot.repr, &slot.slot) {
            let shape = match Cardinality::of(s) {
                Cardinality::Single => repr.to_string(),
                Cardinality::Repeated => format!("repeated {}", repr),
                Cardinality::Map(key) => format!("map<{}, {}>", key, repr),
            };
            item = item.with_context(format!("{}: {} #{}", slot.version, shape, s.number));
        }
    }
    diagnostics.push(item);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumDef, FieldSlot, ScalarType};

    fn scalar(name: &str, number: u32, s: ScalarType) -> FieldSlot {
        FieldSlot::new(name, number, FieldKind::Scalar(s))
    }

    #[test]
    fn test_merge_single_version_has_no_conflicts() {
        let v1 = VersionSchema::new("v1", "a.v1").message(
            MessageDef::new("Order")
                .field(scalar("id", 1, ScalarType::String))
                .nested(MessageDef::new("Item").field(scalar("qty", 1, ScalarType::Int32))),
        );
        let outcome = SchemaMerger::new().merge(&[v1]).unwrap();

        assert!(outcome.diagnostics.is_empty());
        let order = outcome.schema.find_message("Order").unwrap();
        assert_eq!(order.fields[0].conflict, ConflictType::None);
        assert!(outcome.schema.find_message("Order.Item").is_some());
    }

    #[test]
    fn test_enum_reference_resolves_through_collapse() {
        let tax = EnumDef::new("TaxType", &[("VAT", 0), ("SALES", 1)]);
        let v1 = VersionSchema::new("v1", "s.v1").message(
            MessageDef::new("Order")
                .nested_enum(tax.clone())
                .field(FieldSlot::new("tax", 1, FieldKind::Enum(".s.v1.Order.TaxType".into()))),
        );
        let v2 = VersionSchema::new("v2", "s.v2")
            .enumeration(tax)
            .message(MessageDef::new("Order").field(FieldSlot::new("tax", 1, FieldKind::Enum(".s.v2.TaxType".into()))));

        let outcome = SchemaMerger::new().merge(&[v1, v2]).unwrap();
        let field = outcome.schema.find_message("Order").unwrap().field("tax").unwrap();

        assert_eq!(field.conflict, ConflictType::None);
        assert_eq!(outcome.schema.enums.len(), 1);
        assert!(outcome.schema.find_message("Order").unwrap().enums.is_empty());
    }

    #[test]
    fn test_filter_skips_messages() {
        let v1 = VersionSchema::new("v1", "a.v1")
            .message(MessageDef::new("Order"))
            .message(MessageDef::new("AuditInternal"));
        let mut config = GeneratorConfig::default();
        config.filter.exclude.push("Internal$".to_string());

        let outcome = SchemaMerger::from_config(&config).unwrap().merge(&[v1]).unwrap();

        assert_eq!(outcome.schema.messages.len(), 1);
    }

    #[test]
    fn test_enum_of_filtered_message_kept_at_top_level() {
        let v1 = VersionSchema::new("v1", "a.v1")
            .message(
                MessageDef::new("Order")
                    .field(FieldSlot::new("level", 1, FieldKind::Enum(".a.v1.AuditInternal.Level".into()))),
            )
            .message(
                MessageDef::new("AuditInternal").nested_enum(EnumDef::new("Level", &[("LOW", 0), ("HIGH", 1)])),
            );
        let mut config = GeneratorConfig::default();
        config.filter.exclude.push("Internal$".to_string());

        let outcome = SchemaMerger::from_config(&config).unwrap().merge(&[v1]).unwrap();

        assert!(outcome.schema.find_message("AuditInternal").is_none());
        let level = outcome.schema.find_enum("AuditInternal.Level").unwrap();
        assert_eq!(level.values.len(), 2);
        let item = outcome
            .diagnostics
            .all()
            .iter()
            .find(|i| i.code == DiagnosticCode::OrphanedEnum)
            .unwrap();
        assert_eq!(item.entity, "AuditInternal.Level");
        assert!(!outcome.diagnostics.has_errors());
    }

    #[test]
    fn test_unreferenced_enum_of_filtered_message_dropped() {
        let v1 = VersionSchema::new("v1", "a.v1")
            .message(MessageDef::new("Order").field(scalar("id", 1, ScalarType::String)))
            .message(MessageDef::new("AuditInternal").nested_enum(EnumDef::new("Level", &[("LOW", 0)])));
        let mut config = GeneratorConfig::default();
        config.filter.exclude.push("Internal$".to_string());

        let outcome = SchemaMerger::from_config(&config).unwrap().merge(&[v1]).unwrap();

        assert!(outcome.schema.find_enum("AuditInternal.Level").is_none());
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_map_conflict_context_shows_key_and_value() {
        let v1 = VersionSchema::new("v1", "a.v1")
            .message(MessageDef::new("Stock").field(scalar("levels", 1, ScalarType::Int32).map_of(ScalarType::String)));
        let v2 = VersionSchema::new("v2", "a.v2")
            .message(MessageDef::new("Stock").field(scalar("levels", 1, ScalarType::Int64).map_of(ScalarType::String)));

        let outcome = SchemaMerger::new().merge(&[v1, v2]).unwrap();

        let item = outcome
            .diagnostics
            .all()
            .iter()
            .find(|i| i.code == DiagnosticCode::ConvertedConflict)
            .unwrap();
        assert_eq!(item.context[0], "v1: map<string, int32> #1");
        assert_eq!(item.context[1], "v2: map<string, int64> #1");
    }

    #[test]
    fn test_duplicate_versions_rejected() {
        let v1 = VersionSchema::new("v1", "a.v1");
        assert!(SchemaMerger::new().merge(&[v1.clone(), v1]).is_err());
    }

    #[test]
    fn test_mapping_to_unknown_message_warns() {
        let v1 = VersionSchema::new("v1", "a.v1").message(MessageDef::new("Payment"));
        let merger = SchemaMerger::new().with_mapping(FieldMapping::by_name("Paymnt", "amount"));

        let outcome = merger.merge(&[v1]).unwrap();

        let item = outcome.diagnostics.all().iter().find(|i| i.code == DiagnosticCode::UnmatchedMapping).unwrap();
        assert!(item.context[0].contains("Payment"));
    }

    #[test]
    fn test_required_cycle_reported() {
        let v1 = VersionSchema::new("v1", "a.v1")
            .with_syntax(crate::schema::Syntax::Proto2)
            .message(MessageDef::new("A").field(FieldSlot::new("b", 1, FieldKind::Message(".a.v1.B".into())).required()))
            .message(MessageDef::new("B").field(FieldSlot::new("a", 1, FieldKind::Message(".a.v1.A".into())).required()));

        let outcome = SchemaMerger::new().merge(&[v1]).unwrap();

        assert!(outcome
            .diagnostics
            .all()
            .iter()
            .any(|i| i.code == DiagnosticCode::CircularDependency));
        assert!(outcome.diagnostics.blocked_entities().contains("A"));
    }
}
