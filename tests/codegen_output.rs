//! Generated source for the `shop` fixture, checked as text.

mod common;

use common::{message_field, scalar};
use schema_weave::schema::{MessageDef, ScalarType, VersionSchema};
use schema_weave::{generate, GeneratorConfig, MemorySink, SchemaMerger};

fn shop_units(config: &GeneratorConfig) -> MemorySink {
    let mut sink = MemorySink::new();
    let report = generate(&common::shop(), config, &mut sink).unwrap();
    assert!(report.is_success(), "{:?}", report.failures);
    sink
}

// =============================================================================
// Units and Order
// =============================================================================

#[test]
fn test_units_in_canonical_order() {
    let mut sink = MemorySink::new();
    let report = generate(&common::shop(), &GeneratorConfig::default(), &mut sink).unwrap();

    assert_eq!(
        report.generated,
        vec!["tax_type.rs", "unit_type.rs", "money.rs", "order.rs", "factory.rs", "mod.rs"]
    );
    assert!(report.skipped.is_empty());
    assert_eq!(sink.len(), 6);
}

#[test]
fn test_every_unit_carries_the_header() {
    let sink = shop_units(&GeneratorConfig::default());
    for name in sink.file_names() {
        let code = sink.file(name).unwrap();
        assert!(
            code.contains("Generated by schema-weave from versions v1, v2 - DO NOT EDIT"),
            "{name}"
        );
        assert!(code.contains("//! Schema fingerprint: "), "{name}");
    }
}

// =============================================================================
// Message Units
// =============================================================================

#[test]
fn test_message_unit_items() {
    let sink = shop_units(&GeneratorConfig::default());
    let order = sink.file("order.rs").unwrap();

    assert!(order.contains("pub trait Order {"));
    assert!(order.contains("pub trait OrderBuilder {"));
    assert!(order.contains("pub struct OrderExtract<P: 'static> {"));
    assert!(order.contains("pub struct OrderView<'a, P: 'static> {"));
    assert!(order.contains("pub static ORDER_V1: OrderExtract<crate::proto::v1::Order>"));
    assert!(order.contains("pub static ORDER_V2: OrderExtract<crate::proto::v2::Order>"));
    assert!(order.contains("pub struct OrderPayloadV1 {"));
    assert!(order.contains("pub struct OrderPayloadV2 {"));
}

#[test]
fn test_secondary_accessors_per_conflict() {
    let sink = shop_units(&GeneratorConfig::default());
    let order = sink.file("order.rs").unwrap();

    assert!(order.contains("fn unit_type(&self)"));
    assert!(order.contains("fn unit_type_enum(&self)"));
    assert!(order.contains("fn checksum_bytes(&self)"));
    assert!(order.contains("fn shipping_cost_message(&self)"));
    assert!(!order.contains("fn total_enum(&self)"));
}

#[test]
fn test_conversions_in_emitted_code() {
    let sink = shop_units(&GeneratorConfig::default());
    let order = sink.file("order.rs").unwrap();

    assert!(order.contains("runtime::widen::<i32, i64>("));
    assert!(order.contains("runtime::narrow::<i64, i32>(value, \"total\", \"v1\")?"));
    assert!(order.contains("runtime::text_from_bytes(&"));
    assert!(order.contains("runtime::decode_text(&value, \"checksum_bytes\", \"v1\")?"));
    assert!(order.contains("Err(ConversionError::not_available(\"reference\", \"v1\"))"));
}

// =============================================================================
// Enum Units
// =============================================================================

#[test]
fn test_enum_unit_conversions() {
    let sink = shop_units(&GeneratorConfig::default());
    let unit_type = sink.file("unit_type.rs").unwrap();

    assert!(unit_type.contains("#[repr(i32)]"));
    assert!(unit_type.contains("pub enum UnitType {"));
    assert!(unit_type.contains("Kelvin = 2,"));
    assert!(unit_type.contains("pub fn to_v2(self) -> Option<crate::proto::v2::UnitType>"));
    assert!(unit_type.contains("crate::proto::v2::UnitType::try_from(self as i32).ok()"));
    assert!(unit_type.contains("impl ProtoEnum for UnitType {"));
    assert!(unit_type.contains("impl TryFrom<i32> for UnitType {"));
}

#[test]
fn test_collapsed_enum_has_no_version_conversions() {
    let sink = shop_units(&GeneratorConfig::default());
    let tax_type = sink.file("tax_type.rs").unwrap();

    assert!(tax_type.contains("Also declared as: Order.TaxType"));
    assert!(tax_type.contains("Vat = 100,"));
    assert!(!tax_type.contains("pub fn to_v1"));
    assert!(sink.file("order_tax_type.rs").is_none());
}

#[test]
fn test_legacy_enum_conversion() {
    let mut config = GeneratorConfig::default();
    config.output.protocol_major_version = 2;
    let sink = shop_units(&config);
    let unit_type = sink.file("unit_type.rs").unwrap();

    assert!(unit_type.contains("crate::proto::v2::UnitType::from_i32(self as i32)"));
    assert!(!unit_type.contains("try_from(self as i32)"));
}

// =============================================================================
// Factory and Index
// =============================================================================

#[test]
fn test_factory_dispatch() {
    let sink = shop_units(&GeneratorConfig::default());
    let factory = sink.file("factory.rs").unwrap();

    assert!(factory.contains("pub const SUPPORTED_VERSIONS: &[&str] = &[\"v1\", \"v2\"];"));
    assert!(factory.contains("pub const DEFAULT_VERSION: &str = \"v2\";"));
    assert!(factory.contains("pub trait VersionContext: Sync {"));
    assert!(factory.contains("pub struct V1Context;"));
    assert!(factory.contains("\"v1\" => Ok(&V1Context),"));
    assert!(factory.contains("ConversionError::version_not_supported(other, SUPPORTED_VERSIONS)"));
    assert!(factory.contains("fn wrap_order<'a>"));
    assert!(factory.contains("fn new_order(&self)"));
    // Money only exists in v2
    assert!(factory.contains("Err(ConversionError::message_not_found(\"Money\", \"v1\"))"));
}

#[test]
fn test_wrap_of_absent_message_ignores_payload() {
    let sink = shop_units(&GeneratorConfig::default());
    let factory = sink.file("factory.rs").unwrap();

    let v1 = factory.split("impl VersionContext for V1Context {").nth(1).unwrap();
    let v1 = v1.split("impl VersionContext for V2Context {").next().unwrap();
    assert!(v1.contains("fn wrap_money<'a>(&self, _payload: &'a dyn Any)"));
    assert!(v1.contains("fn wrap_order<'a>(&self, payload: &'a dyn Any)"));

    let v2 = factory.split("impl VersionContext for V2Context {").nth(1).unwrap();
    assert!(v2.contains("fn wrap_money<'a>(&self, payload: &'a dyn Any)"));
}

#[test]
fn test_factory_lists_each_version_schema() {
    let sink = shop_units(&GeneratorConfig::default());
    let factory = sink.file("factory.rs").unwrap();

    assert!(factory.contains("pub static V1_SCHEMA: SchemaInfo = SchemaInfo {"));
    assert!(factory.contains("pub static V2_SCHEMA: SchemaInfo = SchemaInfo {"));
    assert!(factory.contains("fn schema_info(&self) -> &'static SchemaInfo;"));
    assert!(factory.contains("fn schema_info(&self) -> &'static SchemaInfo {\n        &V1_SCHEMA\n    }"));

    let v1 = factory.split("pub static V1_SCHEMA").nth(1).unwrap();
    let v1 = v1.split("pub static V2_SCHEMA").next().unwrap();
    assert!(v1.contains("FieldInfo { name: \"total\", number: 2, type_name: \"int32\", label: \"optional\" },"));
    assert!(v1.contains("FieldInfo { name: \"amount\", number: 10, type_name: \"int64\", label: \"optional\" },"));
    assert!(v1.contains("FieldInfo { name: \"tags\", number: 6, type_name: \"string\", label: \"repeated\" },"));
    assert!(v1.contains("EnumInfo { path: \"TaxType\", values: &[(\"VAT\", 100)] },"));
    assert!(!v1.contains("path: \"Money\""));
    assert!(!v1.contains("\"reference\""));

    let v2 = factory.split("pub static V2_SCHEMA").nth(1).unwrap();
    assert!(v2.contains("path: \"Money\""));
    assert!(v2.contains("FieldInfo { name: \"amount\", number: 8, type_name: \"int64\", label: \"optional\" },"));
    assert!(v2.contains("FieldInfo { name: \"shipping_cost\", number: 4, type_name: \"Money\", label: \"optional\" },"));
    assert!(v2.contains("(\"FAHRENHEIT\", 1)"));

    let index = sink.file("mod.rs").unwrap();
    assert!(index.contains("V1_SCHEMA"));
}

#[test]
fn test_module_index() {
    let sink = shop_units(&GeneratorConfig::default());
    let index = sink.file("mod.rs").unwrap();

    for unit in ["tax_type", "unit_type", "money", "order", "factory"] {
        assert!(index.contains(&format!("pub mod {};", unit)), "{unit}");
    }
    assert!(index.contains("pub use order::"));
}

#[test]
fn test_version_modules_without_suffix() {
    let mut config = GeneratorConfig::default();
    config.output.version_suffix = false;
    let sink = shop_units(&config);
    let order = sink.file("order.rs").unwrap();

    assert!(order.contains("pub mod v1 {"));
    assert!(order.contains("    pub static ORDER: OrderExtract<crate::proto::v1::Order>"));
    assert!(order.contains("    pub struct OrderPayload {"));
    assert!(!order.contains("OrderPayloadV1"));

    let factory = sink.file("factory.rs").unwrap();
    assert!(factory.contains("crate::unified::order::v1::ORDER"));
}

// =============================================================================
// Settings and Failures
// =============================================================================

#[test]
fn test_builders_can_be_disabled() {
    let mut config = GeneratorConfig::default();
    config.output.generate_builders = false;
    let sink = shop_units(&config);

    assert!(!sink.file("order.rs").unwrap().contains("OrderBuilder"));
    assert!(!sink.file("factory.rs").unwrap().contains("fn new_order"));
}

#[test]
fn test_blocked_entity_is_skipped() {
    let v1 = VersionSchema::new("v1", "shop.v1")
        .message(MessageDef::new("Legacy").reserve(3))
        .message(MessageDef::new("Order").field(scalar("total", 1, ScalarType::Int64)));
    let v2 = VersionSchema::new("v2", "shop.v2")
        .message(MessageDef::new("Legacy").field(scalar("reused", 3, ScalarType::String)))
        .message(MessageDef::new("Order").field(scalar("total", 1, ScalarType::Int64)));
    let outcome = SchemaMerger::new().merge(&[v1, v2]).unwrap();

    let mut sink = MemorySink::new();
    let report = generate(&outcome, &GeneratorConfig::default(), &mut sink).unwrap();

    assert_eq!(report.skipped, vec!["Legacy".to_string()]);
    assert!(sink.file("legacy.rs").is_none());
    assert!(sink.file("order.rs").is_some());
    assert!(!sink.file("factory.rs").unwrap().contains("wrap_legacy"));
}

fn audit_event() -> schema_weave::MergeOutcome {
    let event = |package: &str| {
        VersionSchema::new(&package[6..], package).message(
            MessageDef::new("Event")
                .field(message_field("at", 1, ".google.protobuf.Timestamp"))
                .field(message_field("took", 2, ".google.protobuf.Duration"))
                .field(message_field("score", 3, ".google.protobuf.DoubleValue")),
        )
    };
    SchemaMerger::new().merge(&[event("audit.v1"), event("audit.v2")]).unwrap()
}

#[test]
fn test_well_known_types_map_to_prost_types() {
    let mut config = GeneratorConfig::default();
    config.output.native_well_known_types = false;
    let mut sink = MemorySink::new();
    generate(&audit_event(), &config, &mut sink).unwrap();
    let event = sink.file("event.rs").unwrap();

    assert!(event.contains("fn at(&self) -> Option<::prost_types::Timestamp>;"));
    assert!(event.contains("fn took(&self) -> Option<::prost_types::Duration>;"));
    assert!(!event.contains("chrono"));
}

#[test]
fn test_well_known_types_exposed_natively() {
    let mut sink = MemorySink::new();
    generate(&audit_event(), &GeneratorConfig::default(), &mut sink).unwrap();
    let event = sink.file("event.rs").unwrap();

    assert!(event.contains(
        "fn at(&self) -> Option<::schema_weave::runtime::chrono::DateTime<::schema_weave::runtime::chrono::Utc>>;"
    ));
    assert!(event.contains("fn took(&self) -> Option<::schema_weave::runtime::chrono::TimeDelta>;"));
    assert!(event.contains("fn score(&self) -> Option<f64>;"));
    assert!(event.contains("runtime::timestamp_from_parts(v.seconds, v.nanos)"));
    assert!(event.contains("runtime::duration_from_parts(v.seconds, v.nanos)"));
    assert!(event.contains(
        "{ let (seconds, nanos) = runtime::timestamp_parts(&value); ::prost_types::Timestamp { seconds, nanos } }"
    ));
    assert!(event.contains("::prost_types::Duration { seconds, nanos }"));
}

#[test]
fn test_float_setter_documents_rounding() {
    let v1 = VersionSchema::new("v1", "lab.v1")
        .message(MessageDef::new("Sample").field(scalar("weight", 1, ScalarType::Float)));
    let v2 = VersionSchema::new("v2", "lab.v2")
        .message(MessageDef::new("Sample").field(scalar("weight", 1, ScalarType::Double)));
    let outcome = SchemaMerger::new().merge(&[v1, v2]).unwrap();

    let mut sink = MemorySink::new();
    generate(&outcome, &GeneratorConfig::default(), &mut sink).unwrap();
    let sample = sink.file("sample.rs").unwrap();

    assert!(sample.contains(
        "    /// Rounded to the nearest f32 in v1; only the magnitude is range-checked\n    fn set_weight(&mut self, value: f64)"
    ));
    assert!(sample.contains("runtime::narrow::<f64, f32>(value, \"weight\", \"v1\")?"));
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = GeneratorConfig::default();
    config.output.version_module_pattern = "crate::proto".to_string();
    let mut sink = MemorySink::new();

    assert!(generate(&common::shop(), &config, &mut sink).is_err());
    assert!(sink.is_empty());
}
