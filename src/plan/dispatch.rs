//! Conflict Resolution Dispatch
//!
//! An ordered table of `(predicate, strategy)` handlers. The first handler
//! whose predicate accepts a field builds its accessors. Handlers are plain
//! functions with no state; adding a conflict class means adding a row.

use serde::{Deserialize, Serialize};

use super::{
    AccessorPlan, AccessorRole, FieldPlan, MessagePlan, ReadOp, SchemaPlan, SlotRef, VersionBinding, WriteOp,
};
use crate::merged::{Cardinality, ConflictType, MergedField, MergedMessage, MergedSchema, Repr, UnifiedType};
use crate::schema::ScalarType;
use crate::version::VersionId;

// =============================================================================
// Handler Table
// =============================================================================

/// Which strategy produced a field's plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Incompatible,
    MapValueDual,
    IntEnum,
    StringBytes,
    Numeric,
    Narrowing,
    PrimitiveMessage,
    Native,
}

/// What a predicate may look at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldTraits {
    pub conflict: ConflictType,
    pub repeated: bool,
    pub map: bool,
}

impl FieldTraits {
    pub fn of(field: &MergedField) -> Self {
        Self {
            conflict: field.conflict,
            repeated: field.cardinality == Cardinality::Repeated,
            map: matches!(field.cardinality, Cardinality::Map(_)),
        }
    }
}

type Build = fn(&MergedField) -> Vec<AccessorPlan>;

struct Handler {
    kind: HandlerKind,
    applies: fn(&FieldTraits) -> bool,
    build: Build,
}

/// Handlers in priority order; the last one accepts everything
const HANDLERS: &[Handler] = &[
    Handler {
        kind: HandlerKind::Incompatible,
        applies: |t| t.conflict == ConflictType::Incompatible,
        build: build_read_only_default,
    },
    // Maps have one value slot per key; a dual scalar/message value has no
    // single place to live, so it is read-only like an incompatible field.
    Handler {
        kind: HandlerKind::MapValueDual,
        applies: |t| t.map && t.conflict == ConflictType::PrimitiveMessage,
        build: build_read_only_default,
    },
    Handler {
        kind: HandlerKind::IntEnum,
        applies: |t| t.conflict == ConflictType::IntEnum,
        build: build_int_enum,
    },
    Handler {
        kind: HandlerKind::StringBytes,
        applies: |t| t.conflict == ConflictType::StringBytes,
        build: build_string_bytes,
    },
    Handler {
        kind: HandlerKind::Numeric,
        applies: |t| {
            matches!(
                t.conflict,
                ConflictType::Widening | ConflictType::FloatDouble | ConflictType::SignedUnsigned
            )
        },
        build: build_numeric,
    },
    Handler {
        kind: HandlerKind::Narrowing,
        applies: |t| t.conflict == ConflictType::Narrowing,
        build: build_narrowing,
    },
    Handler {
        kind: HandlerKind::PrimitiveMessage,
        applies: |t| t.conflict == ConflictType::PrimitiveMessage,
        build: build_primitive_message,
    },
    Handler {
        kind: HandlerKind::Native,
        applies: |_| true,
        build: build_native,
    },
];

/// Pick the handler for a field
pub fn select_handler(traits: &FieldTraits) -> HandlerKind {
    HANDLERS
        .iter()
        .find(|h| (h.applies)(traits))
        .map(|h| h.kind)
        .unwrap_or(HandlerKind::Native)
}

/// Plan one merged field
pub fn plan_field(field: &MergedField) -> FieldPlan {
    let traits = FieldTraits::of(field);
    let (kind, accessors) = HANDLERS
        .iter()
        .find(|h| (h.applies)(&traits))
        .map(|h| (h.kind, (h.build)(field)))
        .unwrap_or_else(|| (HandlerKind::Native, build_native(field)));

    FieldPlan {
        name: field.name.clone(),
        number: field.number,
        conflict: field.conflict,
        handler: kind,
        cardinality: field.cardinality,
        presence: field.presence && field.cardinality == Cardinality::Single,
        oneof: field.oneof.clone(),
        accessors,
    }
}

/// Plan a message and everything nested in it
pub fn plan_message(message: &MergedMessage) -> MessagePlan {
    MessagePlan {
        name: message.name.clone(),
        path: message.path.clone(),
        versions: message.versions.clone(),
        fields: message.fields.iter().map(plan_field).collect(),
        nested: message.messages.iter().map(plan_message).collect(),
    }
}

/// Plan every message of a merged schema
pub fn plan_schema(schema: &MergedSchema) -> SchemaPlan {
    SchemaPlan {
        versions: schema.versions.clone(),
        messages: schema.messages.iter().map(plan_message).collect(),
        enums: schema.all_enums().into_iter().cloned().collect(),
    }
}

// =============================================================================
// Strategies
// =============================================================================

fn slot_ref(field: &MergedField, version: &VersionId) -> Option<SlotRef> {
    let slot = field.slot(version)?;
    Some(SlotRef {
        name: slot.name.clone(),
        number: slot.number,
        repr: field.repr(version)?.clone(),
        presence: slot.presence,
        oneof: slot.oneof.clone(),
    })
}

/// Build one accessor by asking `per_version` for each present version's
/// (read, write); absent versions read empty and refuse writes
fn accessor(
    field: &MergedField,
    role: AccessorRole,
    value_type: Repr,
    writable: bool,
    per_version: impl Fn(&Repr) -> (ReadOp, WriteOp),
) -> AccessorPlan {
    let bindings = field
        .slots
        .iter()
        .map(|s| {
            let slot = slot_ref(field, &s.version);
            let (read, write) = match &slot {
                Some(slot) => per_version(&slot.repr),
                None => (ReadOp::Missing, WriteOp::NotAvailable),
            };
            VersionBinding {
                version: s.version.clone(),
                slot,
                read,
                write: writable.then_some(write),
            }
        })
        .collect();

    AccessorPlan {
        role,
        name: format!("{}{}", field.name, role.suffix()),
        value_type,
        bindings,
    }
}

fn same_rust_type(a: ScalarType, b: ScalarType) -> bool {
    a.rust_type() == b.rust_type()
}

/// Numeric read/write between a version scalar and the unified scalar
fn numeric_ops(version: ScalarType, unified: ScalarType) -> (ReadOp, WriteOp) {
    if same_rust_type(version, unified) {
        (ReadOp::Copy, WriteOp::Copy)
    } else {
        (
            ReadOp::Widen { from: version, to: unified },
            WriteOp::Narrow { from: unified, to: version },
        )
    }
}

fn build_native(field: &MergedField) -> Vec<AccessorPlan> {
    let value_type = field.unified.primary_repr();
    let is_enum = matches!(value_type, Repr::Enum(_));
    vec![accessor(field, AccessorRole::Value, value_type, true, |_| {
        if is_enum {
            (ReadOp::Copy, WriteOp::EnumMember)
        } else {
            (ReadOp::Copy, WriteOp::Copy)
        }
    })]
}

fn build_numeric(field: &MergedField) -> Vec<AccessorPlan> {
    let unified = field.unified.primary_repr();
    let target = unified.scalar().unwrap_or(ScalarType::Int64);
    vec![accessor(field, AccessorRole::Value, unified, true, |repr| match repr {
        Repr::Scalar(s) => numeric_ops(*s, target),
        _ => (ReadOp::Default, WriteOp::Unsupported),
    })]
}

fn build_narrowing(field: &MergedField) -> Vec<AccessorPlan> {
    let unified = field.unified.primary_repr();
    let target = unified.scalar().unwrap_or(ScalarType::Int64);
    vec![accessor(field, AccessorRole::Value, unified, false, |repr| match repr {
        Repr::Scalar(s) => numeric_ops(*s, target),
        _ => (ReadOp::Default, WriteOp::Unsupported),
    })]
}

fn build_int_enum(field: &MergedField) -> Vec<AccessorPlan> {
    let (int, enumeration) = match &field.unified {
        UnifiedType::IntEnum { int, enumeration } => (*int, enumeration.clone()),
        _ => return build_native(field),
    };

    let number = accessor(field, AccessorRole::Value, Repr::Scalar(int), true, |repr| match repr {
        Repr::Scalar(s) => numeric_ops(*s, int),
        Repr::Enum(_) => (ReadOp::EnumNumber { to: int }, WriteOp::NumberToEnum { from: int }),
        Repr::Message(_) => (ReadOp::Default, WriteOp::Unsupported),
    });
    let symbolic = accessor(field, AccessorRole::Enum, Repr::Enum(enumeration), true, |repr| match repr {
        Repr::Scalar(s) => (ReadOp::NumberAsEnum { from: *s }, WriteOp::EnumToNumber { to: *s }),
        Repr::Enum(_) => (ReadOp::Copy, WriteOp::EnumMember),
        Repr::Message(_) => (ReadOp::Default, WriteOp::Unsupported),
    });
    vec![number, symbolic]
}

fn build_string_bytes(field: &MergedField) -> Vec<AccessorPlan> {
    let text = accessor(field, AccessorRole::Value, Repr::Scalar(ScalarType::String), true, |repr| {
        match repr {
            Repr::Scalar(ScalarType::Bytes) => (ReadOp::Utf8Decode, WriteOp::Utf8Encode),
            _ => (ReadOp::Copy, WriteOp::Copy),
        }
    });
    let bytes = accessor(field, AccessorRole::Bytes, Repr::Scalar(ScalarType::Bytes), true, |repr| {
        match repr {
            Repr::Scalar(ScalarType::String) => (ReadOp::Utf8Encode, WriteOp::Utf8Decode),
            _ => (ReadOp::Copy, WriteOp::Copy),
        }
    });
    vec![text, bytes]
}

fn build_primitive_message(field: &MergedField) -> Vec<AccessorPlan> {
    let (scalar, message) = match &field.unified {
        UnifiedType::ScalarOrMessage { scalar, message } => (*scalar, message.clone()),
        _ => return build_native(field),
    };

    let primitive = accessor(field, AccessorRole::Value, Repr::Scalar(scalar), true, |repr| match repr {
        Repr::Scalar(s) => numeric_ops(*s, scalar),
        _ => (ReadOp::OtherFamily, WriteOp::Unsupported),
    });
    let structured = accessor(field, AccessorRole::Message, Repr::Message(message), true, |repr| match repr {
        Repr::Message(_) => (ReadOp::Copy, WriteOp::Copy),
        _ => (ReadOp::OtherFamily, WriteOp::Unsupported),
    });
    vec![primitive, structured]
}

fn build_read_only_default(field: &MergedField) -> Vec<AccessorPlan> {
    let unified = match &field.unified {
        UnifiedType::Single(repr) => repr.clone(),
        other => other.primary_repr(),
    };
    let latest_shape = field
        .slots
        .iter()
        .rev()
        .find_map(|s| s.slot.as_ref())
        .map(Cardinality::of);
    let matching = |version: &VersionId| {
        field.repr(version) == Some(&unified)
            && field.slot(version).map(Cardinality::of) == latest_shape
    };

    let mut plan = accessor(field, AccessorRole::Value, unified.clone(), false, |_| {
        (ReadOp::Copy, WriteOp::Unsupported)
    });
    for binding in &mut plan.bindings {
        if binding.slot.is_some() && !matching(&binding.version) {
            binding.read = ReadOp::Default;
        }
    }
    vec![plan]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merged::VersionSlot;
    use crate::schema::{FieldKind, FieldSlot};

    fn field(conflict: ConflictType, unified: UnifiedType, reprs: &[Option<Repr>]) -> MergedField {
        let slots = reprs
            .iter()
            .enumerate()
            .map(|(i, repr)| VersionSlot {
                version: VersionId::from(format!("v{}", i + 1).as_str()),
                slot: repr.as_ref().map(|r| {
                    let kind = match r {
                        Repr::Scalar(s) => FieldKind::Scalar(*s),
                        Repr::Enum(p) => FieldKind::Enum(p.clone()),
                        Repr::Message(p) => FieldKind::Message(p.clone()),
                    };
                    FieldSlot::new("f", 1, kind)
                }),
                repr: repr.clone(),
            })
            .collect();
        MergedField {
            name: "f".to_string(),
            number: 1,
            slots,
            unified,
            cardinality: Cardinality::Single,
            conflict,
            name_mapped: false,
            oneof: None,
            presence: false,
        }
    }

    #[test]
    fn test_handler_order() {
        let traits = |conflict, map| FieldTraits { conflict, repeated: false, map };
        assert_eq!(select_handler(&traits(ConflictType::None, false)), HandlerKind::Native);
        assert_eq!(select_handler(&traits(ConflictType::Widening, false)), HandlerKind::Numeric);
        assert_eq!(select_handler(&traits(ConflictType::SignedUnsigned, false)), HandlerKind::Numeric);
        assert_eq!(select_handler(&traits(ConflictType::PrimitiveMessage, true)), HandlerKind::MapValueDual);
        assert_eq!(select_handler(&traits(ConflictType::PrimitiveMessage, false)), HandlerKind::PrimitiveMessage);
        assert_eq!(select_handler(&traits(ConflictType::Incompatible, false)), HandlerKind::Incompatible);
    }

    #[test]
    fn test_widening_plan() {
        let f = field(
            ConflictType::Widening,
            UnifiedType::Single(Repr::Scalar(ScalarType::Int64)),
            &[Some(Repr::Scalar(ScalarType::Int32)), Some(Repr::Scalar(ScalarType::Int64))],
        );
        let plan = plan_field(&f);
        let value = plan.primary().unwrap();

        assert_eq!(
            value.bindings[0].read,
            ReadOp::Widen { from: ScalarType::Int32, to: ScalarType::Int64 }
        );
        assert_eq!(
            value.bindings[0].write,
            Some(WriteOp::Narrow { from: ScalarType::Int64, to: ScalarType::Int32 })
        );
        assert_eq!(value.bindings[1].read, ReadOp::Copy);
    }

    #[test]
    fn test_narrowing_has_no_setter() {
        let f = field(
            ConflictType::Narrowing,
            UnifiedType::Single(Repr::Scalar(ScalarType::Int64)),
            &[Some(Repr::Scalar(ScalarType::Int64)), Some(Repr::Scalar(ScalarType::Int32))],
        );
        assert!(!plan_field(&f).primary().unwrap().has_setter());
    }

    #[test]
    fn test_int_enum_has_two_accessors() {
        let f = field(
            ConflictType::IntEnum,
            UnifiedType::IntEnum { int: ScalarType::Int32, enumeration: "Unit".into() },
            &[Some(Repr::Scalar(ScalarType::Int32)), Some(Repr::Enum("Unit".into()))],
        );
        let plan = plan_field(&f);

        assert_eq!(plan.accessors.len(), 2);
        let symbolic = plan.accessor(AccessorRole::Enum).unwrap();
        assert_eq!(symbolic.name, "f_enum");
        assert_eq!(symbolic.bindings[0].read, ReadOp::NumberAsEnum { from: ScalarType::Int32 });
        assert_eq!(symbolic.bindings[1].write, Some(WriteOp::EnumMember));
    }

    #[test]
    fn test_primitive_message_families() {
        let f = field(
            ConflictType::PrimitiveMessage,
            UnifiedType::ScalarOrMessage { scalar: ScalarType::Int64, message: "Money".into() },
            &[Some(Repr::Scalar(ScalarType::Int64)), Some(Repr::Message("Money".into()))],
        );
        let plan = plan_field(&f);
        let message = plan.accessor(AccessorRole::Message).unwrap();

        assert_eq!(message.bindings[0].read, ReadOp::OtherFamily);
        assert_eq!(message.bindings[0].write, Some(WriteOp::Unsupported));
        assert_eq!(message.bindings[1].write, Some(WriteOp::Copy));
    }

    #[test]
    fn test_incompatible_reads_default() {
        let f = field(
            ConflictType::Incompatible,
            UnifiedType::Single(Repr::Scalar(ScalarType::String)),
            &[Some(Repr::Scalar(ScalarType::Int32)), Some(Repr::Scalar(ScalarType::String))],
        );
        let plan = plan_field(&f);
        let value = plan.primary().unwrap();

        assert_eq!(value.bindings[0].read, ReadOp::Default);
        assert_eq!(value.bindings[1].read, ReadOp::Copy);
        assert!(!value.has_setter());
    }

    #[test]
    fn test_absent_version_is_not_available() {
        let f = field(
            ConflictType::None,
            UnifiedType::Single(Repr::Scalar(ScalarType::String)),
            &[None, Some(Repr::Scalar(ScalarType::String))],
        );
        let plan = plan_field(&f);
        let value = plan.primary().unwrap();

        assert_eq!(value.bindings[0].read, ReadOp::Missing);
        assert_eq!(value.bindings[0].write, Some(WriteOp::NotAvailable));
    }
}
