//! End-to-end merge scenarios over the `shop` fixture, checked through the
//! merged schema and the dynamic runtime.

mod common;

use schema_weave::runtime::{
    ConversionError, DynamicFactory, DynamicMessage, EnumValue, ErrorCode, Value,
};
use schema_weave::{ConflictType, DiagnosticCode, SchemaPlan};

// =============================================================================
// Conflict Classification
// =============================================================================

#[test]
fn test_every_field_gets_its_conflict() {
    let outcome = common::shop();
    let order = outcome.schema.find_message("Order").unwrap();

    let expected = [
        ("unit_type", ConflictType::IntEnum),
        ("total", ConflictType::Widening),
        ("checksum", ConflictType::StringBytes),
        ("shipping_cost", ConflictType::PrimitiveMessage),
        ("tax_type", ConflictType::None),
        ("tags", ConflictType::None),
        ("amount", ConflictType::None),
        ("reference", ConflictType::None),
    ];
    for (name, conflict) in expected {
        let field = order.field(name).unwrap_or_else(|| panic!("missing field {name}"));
        assert_eq!(field.conflict, conflict, "{name}");
    }
    assert!(!outcome.diagnostics.has_errors(), "{}", outcome.diagnostics);
}

// =============================================================================
// Scenario 1: integer in v1, enum in v2
// =============================================================================

#[test]
fn test_int_enum_reads_through_both_accessors() {
    let outcome = common::shop();
    let plan = SchemaPlan::build(&outcome.schema);
    let factory = DynamicFactory::new(&plan);

    let v1 = factory
        .for_version("v1")
        .unwrap()
        .wrap(DynamicMessage::new("Order").with(1, 1_i32))
        .unwrap();
    assert_eq!(
        v1.get_enum("unit_type_enum").unwrap(),
        Some(EnumValue::Known("FAHRENHEIT".to_string()))
    );

    let v2 = factory
        .for_version("v2")
        .unwrap()
        .wrap(DynamicMessage::new("Order").with(1, Value::Enum(2)))
        .unwrap();
    assert_eq!(v2.get("unit_type").unwrap(), Some(Value::I32(2)));
    assert_eq!(
        v2.get_enum("unit_type_enum").unwrap(),
        Some(EnumValue::Known("KELVIN".to_string()))
    );
}

#[test]
fn test_int_enum_number_without_member() {
    let outcome = common::shop();
    let plan = SchemaPlan::build(&outcome.schema);
    let factory = DynamicFactory::new(&plan);

    // v1 stores plain integers, so any number reads back as unrecognized
    let v1 = factory
        .for_version("v1")
        .unwrap()
        .wrap(DynamicMessage::new("Order").with(1, 7_i32))
        .unwrap();
    assert_eq!(v1.get_enum("unit_type_enum").unwrap(), Some(EnumValue::Unrecognized(7)));

    // v2 only accepts declared members
    let mut builder = factory.for_version("v2").unwrap().builder("Order").unwrap();
    let err = builder.set("unit_type", 7_i32).unwrap_err();
    assert_eq!(err.code(), ErrorCode::EnumValueNotSupported);
    builder.set("unit_type", 2_i32).unwrap();
    assert_eq!(builder.payload().get(1), Some(&Value::Enum(2)));
}

#[test]
fn test_enum_setter_on_integer_version() {
    let outcome = common::shop();
    let plan = SchemaPlan::build(&outcome.schema);
    let factory = DynamicFactory::new(&plan);

    let mut builder = factory.for_version("v1").unwrap().builder("Order").unwrap();
    builder.set("unit_type_enum", Value::Enum(2)).unwrap();
    assert_eq!(builder.payload().get(1), Some(&Value::I32(2)));
}

// =============================================================================
// Scenario 2: 32-bit in v1, 64-bit in v2
// =============================================================================

#[test]
fn test_widening_setter_rejects_out_of_range() {
    let outcome = common::shop();
    let plan = SchemaPlan::build(&outcome.schema);
    let factory = DynamicFactory::new(&plan);

    let mut builder = factory.for_version("v1").unwrap().builder("Order").unwrap();
    builder.set("total", 42_i64).unwrap();

    let err = builder.set("total", 5_000_000_000_i64).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValueOutOfRange);
    assert!(err.to_string().starts_with("[CONV-002]"));
    assert_eq!(builder.payload().get(2), Some(&Value::I32(42)));

    let wrapper = builder.wrap();
    assert_eq!(wrapper.get("total").unwrap(), Some(Value::I64(42)));
}

#[test]
fn test_widening_setter_on_wide_version() {
    let outcome = common::shop();
    let plan = SchemaPlan::build(&outcome.schema);
    let factory = DynamicFactory::new(&plan);

    let mut builder = factory.for_version("v2").unwrap().builder("Order").unwrap();
    builder.set("total", 5_000_000_000_i64).unwrap();
    assert_eq!(builder.wrap().get("total").unwrap(), Some(Value::I64(5_000_000_000)));
}

// =============================================================================
// Scenario 3: text in v1, bytes in v2
// =============================================================================

#[test]
fn test_string_bytes_conversion() {
    let outcome = common::shop();
    let plan = SchemaPlan::build(&outcome.schema);
    let factory = DynamicFactory::new(&plan);

    let v2 = factory
        .for_version("v2")
        .unwrap()
        .wrap(DynamicMessage::new("Order").with(3, Value::Bytes(vec![97, 98, 99])))
        .unwrap();
    assert_eq!(v2.get("checksum").unwrap(), Some(Value::String("abc".to_string())));

    let v1 = factory
        .for_version("v1")
        .unwrap()
        .wrap(DynamicMessage::new("Order").with(3, "abc"))
        .unwrap();
    assert_eq!(v1.get("checksum_bytes").unwrap(), Some(Value::Bytes(vec![97, 98, 99])));
}

#[test]
fn test_invalid_utf8_into_text_version() {
    let outcome = common::shop();
    let plan = SchemaPlan::build(&outcome.schema);
    let factory = DynamicFactory::new(&plan);

    let mut builder = factory.for_version("v1").unwrap().builder("Order").unwrap();
    let err = builder.set("checksum_bytes", Value::Bytes(vec![0xff, 0xfe])).unwrap_err();
    assert_eq!(err.code(), ErrorCode::TypeMismatch);
    assert!(builder.payload().is_empty());

    builder.set("checksum_bytes", Value::Bytes(b"ok".to_vec())).unwrap();
    assert_eq!(builder.payload().get(3), Some(&Value::String("ok".to_string())));
}

// =============================================================================
// Scenario 4: integer in v1, message in v2
// =============================================================================

#[test]
fn test_primitive_message_families() {
    let outcome = common::shop();
    let plan = SchemaPlan::build(&outcome.schema);
    let factory = DynamicFactory::new(&plan);

    let v1 = factory
        .for_version("v1")
        .unwrap()
        .wrap(DynamicMessage::new("Order").with(4, 250_i64))
        .unwrap();
    assert_eq!(v1.get("shipping_cost").unwrap(), Some(Value::I64(250)));
    assert_eq!(v1.get("shipping_cost_message").unwrap(), None);

    let money = DynamicMessage::new("Money").with(1, "EUR").with(2, 3_i64);
    let v2 = factory
        .for_version("v2")
        .unwrap()
        .wrap(DynamicMessage::new("Order").with(4, Value::Message(money.clone())))
        .unwrap();
    assert_eq!(v2.get("shipping_cost").unwrap(), None);
    assert_eq!(v2.get("shipping_cost_message").unwrap(), Some(Value::Message(money)));
}

#[test]
fn test_primitive_message_wrong_family_setter() {
    let outcome = common::shop();
    let plan = SchemaPlan::build(&outcome.schema);
    let factory = DynamicFactory::new(&plan);

    let mut builder = factory.for_version("v2").unwrap().builder("Order").unwrap();
    let err = builder.set("shipping_cost", 5_i64).unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnsupportedOperation);
}

// =============================================================================
// Scenario 5: equivalent enums collapse
// =============================================================================

#[test]
fn test_equivalent_enums_collapse() {
    let outcome = common::shop();
    let all = outcome.schema.all_enums();
    let tax: Vec<_> = all.iter().filter(|e| e.name == "TaxType").collect();

    assert_eq!(tax.len(), 1);
    assert_eq!(tax[0].path, "TaxType");
    assert_eq!(tax[0].collapsed_from, vec!["Order.TaxType".to_string()]);
    assert!(outcome
        .diagnostics
        .all()
        .iter()
        .any(|d| d.code == DiagnosticCode::EnumCollapsed));
}

// =============================================================================
// Scenario 6: explicit mapping and version-only fields
// =============================================================================

#[test]
fn test_mapped_field_uses_each_versions_number() {
    let outcome = common::shop();
    let plan = SchemaPlan::build(&outcome.schema);
    let factory = DynamicFactory::new(&plan);

    let mut v1 = factory.for_version("v1").unwrap().builder("Order").unwrap();
    v1.set("amount", 12_i64).unwrap();
    assert_eq!(v1.payload().get(10), Some(&Value::I64(12)));

    let mut v2 = factory.for_version("v2").unwrap().builder("Order").unwrap();
    v2.set("amount", 12_i64).unwrap();
    assert_eq!(v2.payload().get(8), Some(&Value::I64(12)));
    assert_eq!(v2.payload().get(10), None);
}

#[test]
fn test_version_only_field_not_available() {
    let outcome = common::shop();
    let plan = SchemaPlan::build(&outcome.schema);
    let factory = DynamicFactory::new(&plan);

    let mut builder = factory.for_version("v1").unwrap().builder("Order").unwrap();
    let err = builder.set("reference", "R-1").unwrap_err();

    assert_eq!(err.code(), ErrorCode::FieldNotAvailable);
    match err {
        ConversionError::FieldNotAvailable { field, version } => {
            assert_eq!(field, "reference");
            assert_eq!(version, "v1");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// =============================================================================
// Version Dispatch
// =============================================================================

#[test]
fn test_unknown_version_and_message() {
    let outcome = common::shop();
    let plan = SchemaPlan::build(&outcome.schema);
    let factory = DynamicFactory::new(&plan);

    let err = factory.for_version("v3").unwrap_err();
    assert_eq!(err.code(), ErrorCode::VersionNotSupported);
    assert!(err.to_string().contains("v1, v2"));

    let err = factory.for_version("v1").unwrap().builder("Money").unwrap_err();
    assert_eq!(err.code(), ErrorCode::MessageNotFound);
    assert_eq!(factory.latest().unwrap().version().as_str(), "v2");
}
