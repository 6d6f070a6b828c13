//! Shared fixtures: a two-version `shop` schema exercising every conflict
//! the merger handles.
//!
//! | field           | v1                 | v2                  |
//! |-----------------|--------------------|---------------------|
//! | unit_type #1    | int32              | enum UnitType       |
//! | total #2        | int32              | int64               |
//! | checksum #3     | string             | bytes               |
//! | shipping_cost #4| int64              | message Money       |
//! | tax_type #5     | enum Order.TaxType | enum TaxType        |
//! | tags #6         | repeated string    | repeated string     |
//! | amount          | int64 #10          | int64 #8 (mapped)   |
//! | reference #10   | -                  | string              |

#![allow(dead_code)]

use schema_weave::schema::{EnumDef, FieldKind, FieldSlot, MessageDef, ScalarType, VersionSchema};
use schema_weave::{FieldMapping, MergeOutcome, SchemaMerger};

pub fn scalar(name: &str, number: u32, scalar: ScalarType) -> FieldSlot {
    FieldSlot::new(name, number, FieldKind::Scalar(scalar))
}

pub fn enum_field(name: &str, number: u32, type_ref: &str) -> FieldSlot {
    FieldSlot::new(name, number, FieldKind::Enum(type_ref.to_string()))
}

pub fn message_field(name: &str, number: u32, type_ref: &str) -> FieldSlot {
    FieldSlot::new(name, number, FieldKind::Message(type_ref.to_string()))
}

pub fn tax_type() -> EnumDef {
    EnumDef::new("TaxType", &[("VAT", 100)])
}

pub fn shop_v1() -> VersionSchema {
    VersionSchema::new("v1", "shop.v1").message(
        MessageDef::new("Order")
            .field(scalar("unit_type", 1, ScalarType::Int32))
            .field(scalar("total", 2, ScalarType::Int32))
            .field(scalar("checksum", 3, ScalarType::String))
            .field(scalar("shipping_cost", 4, ScalarType::Int64))
            .field(enum_field("tax_type", 5, ".shop.v1.Order.TaxType"))
            .field(scalar("tags", 6, ScalarType::String).repeated())
            .field(scalar("amount", 10, ScalarType::Int64))
            .nested_enum(tax_type()),
    )
}

pub fn shop_v2() -> VersionSchema {
    VersionSchema::new("v2", "shop.v2")
        .enumeration(EnumDef::new(
            "UnitType",
            &[("CELSIUS", 0), ("FAHRENHEIT", 1), ("KELVIN", 2)],
        ))
        .enumeration(tax_type())
        .message(
            MessageDef::new("Money")
                .field(scalar("currency", 1, ScalarType::String))
                .field(scalar("units", 2, ScalarType::Int64)),
        )
        .message(
            MessageDef::new("Order")
                .field(enum_field("unit_type", 1, ".shop.v2.UnitType"))
                .field(scalar("total", 2, ScalarType::Int64))
                .field(scalar("checksum", 3, ScalarType::Bytes))
                .field(message_field("shipping_cost", 4, ".shop.v2.Money"))
                .field(enum_field("tax_type", 5, ".shop.v2.TaxType"))
                .field(scalar("tags", 6, ScalarType::String).repeated())
                .field(scalar("amount", 8, ScalarType::Int64))
                .field(scalar("reference", 10, ScalarType::String)),
        )
}

pub fn amount_mapping() -> FieldMapping {
    FieldMapping::by_numbers("Order", "amount", &[("v1", 10), ("v2", 8)])
}

/// Both versions merged with the `amount` mapping
pub fn shop() -> MergeOutcome {
    SchemaMerger::new()
        .with_mapping(amount_mapping())
        .merge(&[shop_v1(), shop_v2()])
        .expect("shop schema merges")
}
