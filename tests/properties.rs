//! Property tests for conversions, classification and merge determinism.

mod common;

use std::collections::BTreeMap;

use proptest::prelude::*;
use schema_weave::merge::classify::classify_scalars;
use schema_weave::merged::Repr;
use schema_weave::runtime::{decode_text, encode_text, narrow, text_from_bytes, widen};
use schema_weave::schema::{MessageDef, ScalarType, VersionSchema};
use schema_weave::{ConflictType, Fingerprint, SchemaMerger};

const SCALARS: [ScalarType; 15] = [
    ScalarType::Double,
    ScalarType::Float,
    ScalarType::Int32,
    ScalarType::Int64,
    ScalarType::Uint32,
    ScalarType::Uint64,
    ScalarType::Sint32,
    ScalarType::Sint64,
    ScalarType::Fixed32,
    ScalarType::Fixed64,
    ScalarType::Sfixed32,
    ScalarType::Sfixed64,
    ScalarType::Bool,
    ScalarType::String,
    ScalarType::Bytes,
];

const CONFLICTS: [ConflictType; 9] = [
    ConflictType::None,
    ConflictType::FloatDouble,
    ConflictType::Widening,
    ConflictType::IntEnum,
    ConflictType::SignedUnsigned,
    ConflictType::StringBytes,
    ConflictType::Narrowing,
    ConflictType::PrimitiveMessage,
    ConflictType::Incompatible,
];

fn scalar() -> impl Strategy<Value = ScalarType> {
    prop::sample::select(SCALARS.to_vec())
}

fn conflict() -> impl Strategy<Value = ConflictType> {
    prop::sample::select(CONFLICTS.to_vec())
}

/// Field number → type, for one version of a single message
fn fields() -> impl Strategy<Value = BTreeMap<u32, ScalarType>> {
    prop::collection::btree_map(1u32..40, scalar(), 0..12)
}

fn version(id: &str, fields: &BTreeMap<u32, ScalarType>) -> VersionSchema {
    let message = fields.iter().fold(MessageDef::new("Record"), |m, (number, ty)| {
        m.field(common::scalar(&format!("f{}", number), *number, *ty))
    });
    VersionSchema::new(id, format!("rec.{}", id)).message(message)
}

proptest! {
    #[test]
    fn prop_widened_value_narrows_back(value in any::<i32>()) {
        let wide: i64 = widen(value);
        let back: i32 = narrow(wide, "f", "v1").unwrap();
        prop_assert_eq!(back, value);
    }

    #[test]
    fn prop_narrow_succeeds_exactly_in_range(value in any::<i64>()) {
        let narrowed = narrow::<i64, i32>(value, "f", "v1");
        prop_assert_eq!(narrowed.is_ok(), i32::try_from(value).is_ok());
        if let Ok(n) = narrowed {
            prop_assert_eq!(i64::from(n), value);
        }
    }

    #[test]
    fn prop_unsigned_into_signed_keeps_bits(value in any::<u64>()) {
        let signed: i64 = widen(value);
        prop_assert_eq!(signed as u64, value);
    }

    #[test]
    fn prop_text_survives_bytes(text in ".*") {
        let bytes = encode_text(&text);
        prop_assert_eq!(decode_text(&bytes, "f", "v1").unwrap(), text.clone());
        prop_assert_eq!(text_from_bytes(&bytes), text);
    }

    #[test]
    fn prop_decode_accepts_only_utf8(bytes in prop::collection::vec(any::<u8>(), 0..32)) {
        let decoded = decode_text(&bytes, "f", "v1");
        prop_assert_eq!(decoded.is_ok(), std::str::from_utf8(&bytes).is_ok());
        prop_assert_eq!(text_from_bytes(&bytes), String::from_utf8_lossy(&bytes).into_owned());
    }

    #[test]
    fn prop_no_conflict_iff_same_rust_type(a in scalar(), b in scalar()) {
        let none = classify_scalars(a, b) == ConflictType::None;
        prop_assert_eq!(none, a.rust_type() == b.rust_type());
    }

    #[test]
    fn prop_worst_is_commutative_and_maximal(a in conflict(), b in conflict()) {
        prop_assert_eq!(a.worst(b), b.worst(a));
        prop_assert_eq!(a.worst(b).rank(), a.rank().max(b.rank()));
    }

    #[test]
    fn prop_unconflicted_field_keeps_its_type(ty in scalar()) {
        let mut only = BTreeMap::new();
        only.insert(1, ty);
        let outcome = SchemaMerger::new()
            .merge(&[version("v1", &only), version("v2", &only)])
            .unwrap();
        let field = outcome.schema.find_message("Record").unwrap().field("f1").unwrap();

        prop_assert_eq!(field.conflict, ConflictType::None);
        prop_assert_eq!(field.unified.primary_repr(), Repr::Scalar(ty));
    }

    #[test]
    fn prop_merge_is_deterministic(v1 in fields(), v2 in fields()) {
        let versions = [version("v1", &v1), version("v2", &v2)];
        let first = SchemaMerger::new().merge(&versions).unwrap();
        let second = SchemaMerger::new().merge(&versions).unwrap();

        prop_assert_eq!(
            Fingerprint::of_schema(&first.schema).unwrap(),
            Fingerprint::of_schema(&second.schema).unwrap()
        );
        prop_assert_eq!(first.diagnostics.len(), second.diagnostics.len());
    }

    #[test]
    fn prop_every_number_is_merged_once(v1 in fields(), v2 in fields()) {
        let outcome = SchemaMerger::new()
            .merge(&[version("v1", &v1), version("v2", &v2)])
            .unwrap();
        let Some(record) = outcome.schema.find_message("Record") else {
            return Ok(());
        };

        let mut expected: Vec<u32> = v1.keys().chain(v2.keys()).copied().collect();
        expected.sort_unstable();
        expected.dedup();
        let mut merged: Vec<u32> = record.fields.iter().map(|f| f.number).collect();
        merged.sort_unstable();
        prop_assert_eq!(merged, expected);
    }
}
