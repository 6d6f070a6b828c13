//! Runtime support for generated wrappers
//!
//! Generated code depends on this module only:
//! - `convert`: widening reads, range-checked narrowing writes, UTF-8 views
//! - `enums`: `ProtoEnum` and `EnumValue` (members unknown to a version)
//! - `dispatch`: string-keyed version lookup
//! - `error`: `ConversionError` with stable codes
//! - `time`: `Timestamp` and `Duration` as `chrono` values
//! - `info`: static per-version listing of messages, fields and enums
//!
//! `dynamic` interprets accessor plans over untyped payloads with the same
//! semantics, so behaviour can be exercised without compiling generated code.

pub mod convert;
pub mod dispatch;
pub mod dynamic;
pub mod enums;
pub mod error;
pub mod info;
pub mod time;

pub use convert::{bytes_from_text, decode_text, encode_text, narrow, text_from_bytes, widen, Numeric, ProtoNumber};
pub use dispatch::{find_version, VersionRegistry};
pub use dynamic::{DynamicBuilder, DynamicFactory, DynamicMessage, DynamicVersion, DynamicWrapper, MapKey, Value};
pub use enums::{member_for_version, number_for_version, EnumValue, ProtoEnum};
pub use error::{ConversionError, ConversionResult, ErrorCode};
pub use info::{EnumInfo, FieldInfo, MessageInfo, SchemaInfo};
pub use time::{duration_from_parts, duration_parts, timestamp_from_parts, timestamp_parts};

/// Generated code names chrono types through this path
pub use chrono;
