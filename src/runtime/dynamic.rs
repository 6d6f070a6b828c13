//! Dynamic wrappers
//!
//! Executes accessor plans against payloads held as [`DynamicMessage`]s
//! (field number → [`Value`]) instead of generated structs. Semantics match
//! the emitted code one for one, which makes this the reference for what a
//! generated wrapper or builder does in every version.
//!
//! Builders convert before they mutate: a failed conversion leaves the
//! payload exactly as it was.

use std::collections::BTreeMap;
use std::fmt;

use tracing::trace;

use super::convert::{bytes_from_text, decode_text, encode_text, text_from_bytes, Numeric, ProtoNumber};
use super::dispatch::VersionRegistry;
use super::enums::EnumValue;
use super::error::{ConversionError, ConversionResult};
use crate::merged::{Cardinality, Repr};
use crate::plan::{AccessorPlan, FieldPlan, MessagePlan, ReadOp, SchemaPlan, VersionBinding, WriteOp};
use crate::schema::ScalarType;
use crate::version::VersionId;

// =============================================================================
// Values
// =============================================================================

/// Map key (protobuf allows integral, bool and string keys)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    Uint(u64),
    String(String),
}

/// A field value, in version or unified terms
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Double(f64),
    Float(f32),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    /// Enum member number
    Enum(i64),
    Message(DynamicMessage),
    List(Vec<Value>),
    Map(BTreeMap<MapKey, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Double(_) => "f64",
            Self::Float(_) => "f32",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::Bool(_) => "bool",
            Self::String(_) => "String",
            Self::Bytes(_) => "Vec<u8>",
            Self::Enum(_) => "enum",
            Self::Message(_) => "message",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Numeric content of a number value
    pub fn numeric(&self) -> Option<Numeric> {
        match self {
            Self::Double(v) => Some(v.to_numeric()),
            Self::Float(v) => Some(v.to_numeric()),
            Self::I32(v) => Some(v.to_numeric()),
            Self::I64(v) => Some(v.to_numeric()),
            Self::U32(v) => Some(v.to_numeric()),
            Self::U64(v) => Some(v.to_numeric()),
            _ => None,
        }
    }

    /// Whether this value has the shape of one element of `repr`
    pub fn fits(&self, repr: &Repr) -> bool {
        match (repr, self) {
            (Repr::Scalar(s), value) => s.rust_type() == value.type_name(),
            (Repr::Enum(_), Self::Enum(_)) => true,
            (Repr::Message(path), Self::Message(m)) => m.type_path == *path,
            _ => false,
        }
    }

    /// Default element of `repr`; messages have none
    pub fn default_for(repr: &Repr) -> Option<Value> {
        match repr {
            Repr::Scalar(s) => Some(Self::default_scalar(*s)),
            Repr::Enum(_) => Some(Self::Enum(0)),
            Repr::Message(_) => None,
        }
    }

    pub fn default_scalar(scalar: ScalarType) -> Value {
        match scalar {
            ScalarType::Bool => Self::Bool(false),
            ScalarType::String => Self::String(String::new()),
            ScalarType::Bytes => Self::Bytes(Vec::new()),
            numeric => Self::widened(numeric, Numeric::Int(0)),
        }
    }

    /// Number as `scalar`, converting without failure
    fn widened(scalar: ScalarType, n: Numeric) -> Value {
        fn lenient<T: ProtoNumber>(n: Numeric) -> T {
            T::from_numeric(n).unwrap_or_else(|| T::wrapping_from(n))
        }
        match scalar {
            ScalarType::Double => Self::Double(lenient(n)),
            ScalarType::Float => Self::Float(lenient(n)),
            ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => Self::I32(lenient(n)),
            ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => Self::I64(lenient(n)),
            ScalarType::Uint32 | ScalarType::Fixed32 => Self::U32(lenient(n)),
            ScalarType::Uint64 | ScalarType::Fixed64 => Self::U64(lenient(n)),
            ScalarType::Bool => Self::Bool(!matches!(n, Numeric::Int(0))),
            ScalarType::String => Self::String(n.to_string()),
            ScalarType::Bytes => Self::Bytes(n.to_string().into_bytes()),
        }
    }

    /// Number as `scalar`, failing when it does not fit
    fn narrowed(scalar: ScalarType, n: Numeric, field: &str, version: &str) -> ConversionResult<Value> {
        fn exact<T: ProtoNumber>(n: Numeric, field: &str, version: &str) -> ConversionResult<T> {
            T::from_numeric(n).ok_or_else(|| super::convert::out_of_range::<T>(n, field, version))
        }
        let value = match scalar {
            ScalarType::Double => Self::Double(exact(n, field, version)?),
            ScalarType::Float => Self::Float(exact(n, field, version)?),
            ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => Self::I32(exact(n, field, version)?),
            ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => Self::I64(exact(n, field, version)?),
            ScalarType::Uint32 | ScalarType::Fixed32 => Self::U32(exact(n, field, version)?),
            ScalarType::Uint64 | ScalarType::Fixed64 => Self::U64(exact(n, field, version)?),
            other => {
                return Err(ConversionError::mismatch(
                    field,
                    version,
                    format!("cannot store a number into {}", other),
                ))
            }
        };
        Ok(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Double(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::I32(v) => write!(f, "{}", v),
            Self::I64(v) => write!(f, "{}", v),
            Self::U32(v) => write!(f, "{}", v),
            Self::U64(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{:?}", v),
            Self::Bytes(v) => write!(f, "{:?}", v),
            Self::Enum(v) => write!(f, "enum {}", v),
            Self::Message(m) => write!(f, "{} {{..}}", m.type_path),
            Self::List(items) => write!(f, "[{} items]", items.len()),
            Self::Map(entries) => write!(f, "{{{} entries}}", entries.len()),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Self::$variant(v)
            }
        }
    )*};
}

value_from!(
    f64 => Double,
    f32 => Float,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    bool => Bool,
    String => String,
    Vec<u8> => Bytes,
    DynamicMessage => Message,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// One version's payload for one message, keyed by field number
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DynamicMessage {
    type_path: String,
    fields: BTreeMap<u32, Value>,
}

impl DynamicMessage {
    pub fn new(type_path: impl Into<String>) -> Self {
        Self {
            type_path: type_path.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style setter for fixtures
    pub fn with(mut self, number: u32, value: impl Into<Value>) -> Self {
        self.fields.insert(number, value.into());
        self
    }

    pub fn type_path(&self) -> &str {
        &self.type_path
    }

    pub fn get(&self, number: u32) -> Option<&Value> {
        self.fields.get(&number)
    }

    pub fn set(&mut self, number: u32, value: Value) {
        self.fields.insert(number, value);
    }

    pub fn remove(&mut self, number: u32) -> Option<Value> {
        self.fields.remove(&number)
    }

    pub fn has(&self, number: u32) -> bool {
        self.fields.contains_key(&number)
    }

    pub fn numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.fields.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// =============================================================================
// Accessor Resolution
// =============================================================================

/// Everything needed to run one accessor against one version
struct Bound<'p> {
    field: &'p FieldPlan,
    accessor: &'p AccessorPlan,
    binding: &'p VersionBinding,
}

impl<'p> Bound<'p> {
    fn version(&self) -> &'p str {
        self.binding.version.as_str()
    }

    fn name(&self) -> &'p str {
        &self.accessor.name
    }

    /// Write op for a mutation, or the error the generated setter raises
    fn write_op(&self, operation: &str) -> ConversionResult<&'p WriteOp> {
        match &self.binding.write {
            None => Err(ConversionError::unsupported(self.name(), operation, self.version())),
            Some(WriteOp::NotAvailable) => Err(ConversionError::not_available(self.name(), self.version())),
            Some(WriteOp::Unsupported) => Err(ConversionError::unsupported(self.name(), operation, self.version())),
            Some(op) => Ok(op),
        }
    }

    fn number(&self) -> ConversionResult<u32> {
        self.binding
            .slot
            .as_ref()
            .map(|s| s.number)
            .ok_or_else(|| ConversionError::not_available(self.name(), self.version()))
    }

    fn expect_shape(&self, expected: Cardinality, operation: &str) -> ConversionResult<()> {
        let same = match (self.field.cardinality, expected) {
            (Cardinality::Map(_), Cardinality::Map(_)) => true,
            (actual, expected) => actual == expected,
        };
        if same {
            Ok(())
        } else {
            Err(ConversionError::unsupported(self.name(), operation, self.version()))
        }
    }
}

fn resolve<'p>(message: &'p MessagePlan, accessor: &str, version: &VersionId) -> ConversionResult<Bound<'p>> {
    message
        .fields
        .iter()
        .find_map(|field| {
            field
                .accessors
                .iter()
                .find(|a| a.name == accessor)
                .and_then(|a| a.binding(version).map(|binding| Bound { field, accessor: a, binding }))
        })
        .ok_or_else(|| ConversionError::not_available(accessor, version.as_str()))
}

// =============================================================================
// Wrapper
// =============================================================================

/// Read-only unified view of one version's payload
#[derive(Debug, Clone)]
pub struct DynamicWrapper<'p> {
    plan: &'p SchemaPlan,
    message: &'p MessagePlan,
    version: VersionId,
    payload: DynamicMessage,
}

impl<'p> DynamicWrapper<'p> {
    pub fn version(&self) -> &VersionId {
        &self.version
    }

    pub fn message(&self) -> &'p MessagePlan {
        self.message
    }

    pub fn payload(&self) -> &DynamicMessage {
        &self.payload
    }

    pub fn into_payload(self) -> DynamicMessage {
        self.payload
    }

    /// Value of an accessor in unified terms.
    ///
    /// `None` means empty: an unset presence-tracked field, an unset message,
    /// a field missing from this version that tracks presence, or the other
    /// family of a dual accessor.
    pub fn get(&self, accessor: &str) -> ConversionResult<Option<Value>> {
        let bound = resolve(self.message, accessor, &self.version)?;
        let raw = bound.binding.slot.as_ref().and_then(|s| self.payload.get(s.number));
        let value_type = &bound.accessor.value_type;

        match (&bound.binding.read, raw) {
            (ReadOp::Missing | ReadOp::OtherFamily, _) | (_, None) => Ok(empty(bound.field, value_type)),
            (ReadOp::Default, _) => Ok(match bound.field.cardinality {
                Cardinality::Single => Value::default_for(value_type),
                _ => empty(bound.field, value_type),
            }),
            (op, Some(raw)) => match (bound.field.cardinality, raw) {
                (Cardinality::Single, raw) => read_element(op, raw, &bound).map(Some),
                (Cardinality::Repeated, Value::List(items)) => items
                    .iter()
                    .map(|item| read_element(op, item, &bound))
                    .collect::<ConversionResult<Vec<_>>>()
                    .map(|items| Some(Value::List(items))),
                (Cardinality::Map(_), Value::Map(entries)) => entries
                    .iter()
                    .map(|(k, v)| read_element(op, v, &bound).map(|v| (k.clone(), v)))
                    .collect::<ConversionResult<BTreeMap<_, _>>>()
                    .map(|entries| Some(Value::Map(entries))),
                (_, other) => Err(ConversionError::mismatch(
                    bound.name(),
                    bound.version(),
                    format!("payload holds {} for a {:?} field", other.type_name(), bound.field.cardinality),
                )),
            },
        }
    }

    /// Symbolic value of an enum-typed accessor
    pub fn get_enum(&self, accessor: &str) -> ConversionResult<Option<EnumValue<String>>> {
        let bound = resolve(self.message, accessor, &self.version)?;
        let Repr::Enum(path) = &bound.accessor.value_type else {
            return Err(ConversionError::mismatch(accessor, self.version.as_str(), "accessor is not enum-typed"));
        };
        let symbol = |number: i64| {
            i32::try_from(number)
                .ok()
                .and_then(|n| self.plan.enumeration(path).and_then(|e| e.value_by_number(n)))
                .map(|v| EnumValue::Known(v.name.clone()))
                .unwrap_or(EnumValue::Unrecognized(number))
        };
        match self.get(accessor)? {
            Some(Value::Enum(number)) => Ok(Some(symbol(number))),
            Some(other) => Err(ConversionError::mismatch(
                accessor,
                self.version.as_str(),
                format!("expected enum, got {}", other.type_name()),
            )),
            None => Ok(None),
        }
    }

    /// Whether the payload holds a value for this accessor
    pub fn has(&self, accessor: &str) -> ConversionResult<bool> {
        let bound = resolve(self.message, accessor, &self.version)?;
        let readable = !matches!(bound.binding.read, ReadOp::Missing | ReadOp::OtherFamily);
        Ok(readable
            && bound
                .binding
                .slot
                .as_ref()
                .map(|s| self.payload.has(s.number))
                .unwrap_or(false))
    }

    /// Builder starting from this payload
    pub fn to_builder(&self) -> DynamicBuilder<'p> {
        DynamicBuilder {
            plan: self.plan,
            message: self.message,
            version: self.version.clone(),
            payload: self.payload.clone(),
        }
    }
}

/// Unified value of an empty field
fn empty(field: &FieldPlan, value_type: &Repr) -> Option<Value> {
    match field.cardinality {
        Cardinality::Repeated => Some(Value::List(Vec::new())),
        Cardinality::Map(_) => Some(Value::Map(BTreeMap::new())),
        Cardinality::Single if field.presence => None,
        Cardinality::Single => Value::default_for(value_type),
    }
}

fn read_element(op: &ReadOp, raw: &Value, bound: &Bound<'_>) -> ConversionResult<Value> {
    let mismatch = || {
        ConversionError::mismatch(
            bound.name(),
            bound.version(),
            format!("payload holds {} where {:?} expects another type", raw.type_name(), op),
        )
    };
    let value = match (op, raw) {
        (ReadOp::Copy, raw) => raw.clone(),
        (ReadOp::Widen { from, to }, raw) if raw.fits(&Repr::Scalar(*from)) => {
            Value::widened(*to, raw.numeric().ok_or_else(mismatch)?)
        }
        (ReadOp::EnumNumber { to }, Value::Enum(n)) => Value::widened(*to, Numeric::Int(*n as i128)),
        (ReadOp::NumberAsEnum { from }, raw) if raw.fits(&Repr::Scalar(*from)) => match raw.numeric() {
            Some(Numeric::Int(n)) => Value::Enum(i64::try_from(n).map_err(|_| mismatch())?),
            _ => return Err(mismatch()),
        },
        (ReadOp::Utf8Decode, Value::Bytes(bytes)) => Value::String(text_from_bytes(bytes)),
        (ReadOp::Utf8Encode, Value::String(text)) => Value::Bytes(bytes_from_text(text)),
        _ => return Err(mismatch()),
    };
    Ok(value)
}

// =============================================================================
// Builder
// =============================================================================

/// Mutable unified view of one version's payload
#[derive(Debug, Clone)]
pub struct DynamicBuilder<'p> {
    plan: &'p SchemaPlan,
    message: &'p MessagePlan,
    version: VersionId,
    payload: DynamicMessage,
}

impl<'p> DynamicBuilder<'p> {
    pub fn version(&self) -> &VersionId {
        &self.version
    }

    pub fn payload(&self) -> &DynamicMessage {
        &self.payload
    }

    /// Set a single-valued accessor
    pub fn set(&mut self, accessor: &str, value: impl Into<Value>) -> ConversionResult<&mut Self> {
        let bound = resolve(self.message, accessor, &self.version)?;
        bound.expect_shape(Cardinality::Single, "set")?;
        let op = bound.write_op("set")?;
        let raw = self.write_element(op, &value.into(), &bound)?;
        let number = bound.number()?;
        self.clear_oneof_siblings(&bound);
        self.payload.set(number, raw);
        trace!(accessor, version = %self.version, "set");
        Ok(self)
    }

    /// Clear an accessor (unset a single value, empty a list or map)
    pub fn clear(&mut self, accessor: &str) -> ConversionResult<&mut Self> {
        let bound = resolve(self.message, accessor, &self.version)?;
        bound.write_op("clear")?;
        let number = bound.number()?;
        self.payload.remove(number);
        Ok(self)
    }

    /// Append one element to a list
    pub fn append(&mut self, accessor: &str, value: impl Into<Value>) -> ConversionResult<&mut Self> {
        self.append_all(accessor, [value.into()])
    }

    /// Append several elements to a list; nothing is appended if any fails
    pub fn append_all<I>(&mut self, accessor: &str, values: I) -> ConversionResult<&mut Self>
    where
        I: IntoIterator<Item = Value>,
    {
        let bound = resolve(self.message, accessor, &self.version)?;
        bound.expect_shape(Cardinality::Repeated, "append")?;
        let converted = self.convert_all(&bound, "append", values)?;
        let number = bound.number()?;
        let mut items = match self.payload.remove(number) {
            Some(Value::List(items)) => items,
            _ => Vec::new(),
        };
        items.extend(converted);
        self.payload.set(number, Value::List(items));
        Ok(self)
    }

    /// Replace a list's contents; the list is untouched if any element fails
    pub fn replace_all<I>(&mut self, accessor: &str, values: I) -> ConversionResult<&mut Self>
    where
        I: IntoIterator<Item = Value>,
    {
        let bound = resolve(self.message, accessor, &self.version)?;
        bound.expect_shape(Cardinality::Repeated, "replace_all")?;
        let converted = self.convert_all(&bound, "replace_all", values)?;
        let number = bound.number()?;
        self.payload.set(number, Value::List(converted));
        Ok(self)
    }

    /// Insert or replace one map entry
    pub fn put(&mut self, accessor: &str, key: MapKey, value: impl Into<Value>) -> ConversionResult<&mut Self> {
        let bound = resolve(self.message, accessor, &self.version)?;
        bound.expect_shape(Cardinality::Map(ScalarType::String), "put")?;
        let op = bound.write_op("put")?;
        let raw = self.write_element(op, &value.into(), &bound)?;
        let number = bound.number()?;
        let mut entries = match self.payload.remove(number) {
            Some(Value::Map(entries)) => entries,
            _ => BTreeMap::new(),
        };
        entries.insert(key, raw);
        self.payload.set(number, Value::Map(entries));
        Ok(self)
    }

    /// Remove one map entry
    pub fn remove(&mut self, accessor: &str, key: &MapKey) -> ConversionResult<&mut Self> {
        let bound = resolve(self.message, accessor, &self.version)?;
        bound.expect_shape(Cardinality::Map(ScalarType::String), "remove")?;
        bound.write_op("remove")?;
        let number = bound.number()?;
        if let Some(Value::Map(entries)) = self.payload.get(number) {
            let mut entries = entries.clone();
            entries.remove(key);
            self.payload.set(number, Value::Map(entries));
        }
        Ok(self)
    }

    pub fn build(self) -> DynamicMessage {
        self.payload
    }

    /// Finish and view the result through the unified accessors
    pub fn wrap(self) -> DynamicWrapper<'p> {
        DynamicWrapper {
            plan: self.plan,
            message: self.message,
            version: self.version,
            payload: self.payload,
        }
    }

    fn convert_all<I>(&self, bound: &Bound<'_>, operation: &str, values: I) -> ConversionResult<Vec<Value>>
    where
        I: IntoIterator<Item = Value>,
    {
        let op = bound.write_op(operation)?;
        values
            .into_iter()
            .map(|v| self.write_element(op, &v, bound))
            .collect()
    }

    fn write_element(&self, op: &WriteOp, value: &Value, bound: &Bound<'_>) -> ConversionResult<Value> {
        let (field, version) = (bound.name(), bound.version());
        if !value.fits(&bound.accessor.value_type) {
            return Err(ConversionError::mismatch(
                field,
                version,
                format!("expected {}, got {}", bound.accessor.value_type, value.type_name()),
            ));
        }

        let number_of = |value: &Value| match (value, value.numeric()) {
            (Value::Enum(n), _) => Some(Numeric::Int(*n as i128)),
            (_, n) => n,
        };

        match (op, number_of(value)) {
            (WriteOp::Copy, _) => Ok(value.clone()),
            (WriteOp::Narrow { to, .. }, Some(n)) | (WriteOp::EnumToNumber { to }, Some(n)) => {
                Value::narrowed(*to, n, field, version)
            }
            (WriteOp::NumberToEnum { .. }, Some(n)) | (WriteOp::EnumMember, Some(n)) => {
                self.check_member(bound, n).map(Value::Enum)
            }
            (WriteOp::Utf8Encode, _) => match value {
                Value::String(text) => Ok(Value::Bytes(encode_text(text))),
                other => Err(ConversionError::mismatch(field, version, format!("expected text, got {}", other.type_name()))),
            },
            (WriteOp::Utf8Decode, _) => match value {
                Value::Bytes(bytes) => decode_text(bytes, field, version).map(Value::String),
                other => Err(ConversionError::mismatch(field, version, format!("expected bytes, got {}", other.type_name()))),
            },
            (WriteOp::NotAvailable, _) => Err(ConversionError::not_available(field, version)),
            (WriteOp::Unsupported, _) => Err(ConversionError::unsupported(field, "set", version)),
            (op, None) => Err(ConversionError::mismatch(
                field,
                version,
                format!("{:?} needs a number, got {}", op, value.type_name()),
            )),
        }
    }

    /// Number to store in an enum-typed slot; must be a member in this version
    fn check_member(&self, bound: &Bound<'_>, n: Numeric) -> ConversionResult<i64> {
        let (field, version) = (bound.name(), bound.version());
        let path = match bound.binding.slot.as_ref().map(|s| &s.repr) {
            Some(Repr::Enum(path)) => path,
            _ => return Err(ConversionError::mismatch(field, version, "slot is not enum-typed")),
        };
        let enumeration = self
            .plan
            .enumeration(path)
            .ok_or_else(|| ConversionError::mismatch(field, version, format!("unknown enum {}", path)))?;
        let raw = match n {
            Numeric::Int(v) => i64::try_from(v).unwrap_or(i64::MAX),
            Numeric::Float(_) => return Err(ConversionError::mismatch(field, version, "enum numbers are integral")),
        };
        let supported = i32::try_from(raw)
            .map(|number| enumeration.supports(number, &bound.binding.version))
            .unwrap_or(false);
        if supported {
            Ok(raw)
        } else {
            Err(ConversionError::enum_not_supported(field, &enumeration.name, raw, version))
        }
    }

    /// Setting a oneof member clears the other members of its group
    fn clear_oneof_siblings(&mut self, bound: &Bound<'_>) {
        let Some(slot) = bound.binding.slot.as_ref() else { return };
        let Some(group) = slot.oneof.as_deref() else { return };
        let siblings: Vec<u32> = self
            .message
            .fields
            .iter()
            .filter_map(|f| f.primary()?.binding(&self.version)?.slot.as_ref())
            .filter(|s| s.oneof.as_deref() == Some(group) && s.number != slot.number)
            .map(|s| s.number)
            .collect();
        for number in siblings {
            self.payload.remove(number);
        }
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Version-dispatch factory over a schema plan
#[derive(Debug, Clone)]
pub struct DynamicFactory<'p> {
    plan: &'p SchemaPlan,
    registry: VersionRegistry<VersionId>,
}

impl<'p> DynamicFactory<'p> {
    pub fn new(plan: &'p SchemaPlan) -> Self {
        let registry = plan
            .versions
            .iter()
            .fold(VersionRegistry::new(), |registry, v| registry.register(v.as_str(), v.clone()));
        Self { plan, registry }
    }

    pub fn supported_versions(&self) -> Vec<&str> {
        self.registry.supported()
    }

    /// Context for one version; unknown identifiers are rejected
    pub fn for_version(&self, version: &str) -> ConversionResult<DynamicVersion<'p>> {
        let version = self.registry.get(version)?.clone();
        Ok(DynamicVersion { plan: self.plan, version })
    }

    /// Context for the default (latest) version
    pub fn latest(&self) -> Option<DynamicVersion<'p>> {
        self.registry.latest().map(|(_, version)| DynamicVersion {
            plan: self.plan,
            version: version.clone(),
        })
    }
}

/// Wrap and build operations bound to one version
#[derive(Debug, Clone)]
pub struct DynamicVersion<'p> {
    plan: &'p SchemaPlan,
    version: VersionId,
}

impl<'p> DynamicVersion<'p> {
    pub fn version(&self) -> &VersionId {
        &self.version
    }

    /// Wrap a payload of this version
    pub fn wrap(&self, payload: DynamicMessage) -> ConversionResult<DynamicWrapper<'p>> {
        let message = self.message(payload.type_path())?;
        Ok(DynamicWrapper {
            plan: self.plan,
            message,
            version: self.version.clone(),
            payload,
        })
    }

    /// Empty builder for a message of this version
    pub fn builder(&self, message: &str) -> ConversionResult<DynamicBuilder<'p>> {
        let plan = self.message(message)?;
        Ok(DynamicBuilder {
            plan: self.plan,
            message: plan,
            version: self.version.clone(),
            payload: DynamicMessage::new(message),
        })
    }

    fn message(&self, path: &str) -> ConversionResult<&'p MessagePlan> {
        self.plan
            .message(path)
            .filter(|m| m.exists_in(&self.version))
            .ok_or_else(|| ConversionError::message_not_found(path, self.version.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::SchemaMerger;
    use crate::runtime::error::ErrorCode;
    use crate::schema::{FieldKind, FieldSlot, MessageDef, VersionSchema};

    fn plan() -> SchemaPlan {
        let v1 = VersionSchema::new("v1", "shop.v1").message(
            MessageDef::new("Order")
                .field(FieldSlot::new("total", 1, FieldKind::Scalar(ScalarType::Int32)))
                .field(FieldSlot::new("tags", 2, FieldKind::Scalar(ScalarType::String)).repeated())
                .field(FieldSlot::new("count", 3, FieldKind::Scalar(ScalarType::Uint32))),
        );
        let v2 = VersionSchema::new("v2", "shop.v2").message(
            MessageDef::new("Order")
                .field(FieldSlot::new("total", 1, FieldKind::Scalar(ScalarType::Int64)))
                .field(FieldSlot::new("tags", 2, FieldKind::Scalar(ScalarType::String)).repeated())
                .field(FieldSlot::new("count", 3, FieldKind::Scalar(ScalarType::Int32)))
                .field(FieldSlot::new("note", 4, FieldKind::Scalar(ScalarType::String))),
        );
        let outcome = SchemaMerger::new().merge(&[v1, v2]).unwrap();
        SchemaPlan::build(&outcome.schema)
    }

    #[test]
    fn test_widening_read_and_range_checked_write() {
        let plan = plan();
        let factory = DynamicFactory::new(&plan);
        let v1 = factory.for_version("v1").unwrap();

        let wrapper = v1.wrap(DynamicMessage::new("Order").with(1, 7_i32)).unwrap();
        assert_eq!(wrapper.get("total").unwrap(), Some(Value::I64(7)));

        let mut builder = wrapper.to_builder();
        let err = builder.set("total", 5_000_000_000_i64).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValueOutOfRange);
        assert_eq!(builder.payload().get(1), Some(&Value::I32(7)));
    }

    #[test]
    fn test_unsigned_read_keeps_value() {
        let plan = plan();
        let factory = DynamicFactory::new(&plan);
        let wrapper = factory
            .for_version("v1")
            .unwrap()
            .wrap(DynamicMessage::new("Order").with(3, u32::MAX))
            .unwrap();

        assert_eq!(wrapper.get("count").unwrap(), Some(Value::I64(4_294_967_295)));
    }

    #[test]
    fn test_list_operations() {
        let plan = plan();
        let factory = DynamicFactory::new(&plan);
        let mut builder = factory.for_version("v2").unwrap().builder("Order").unwrap();

        builder.append("tags", "a").unwrap();
        builder.append_all("tags", vec![Value::from("b"), Value::from("c")]).unwrap();
        let err = builder.append_all("tags", vec![Value::from("d"), Value::I32(1)]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::TypeMismatch);

        let wrapper = builder.clone().wrap();
        assert_eq!(
            wrapper.get("tags").unwrap(),
            Some(Value::List(vec!["a".into(), "b".into(), "c".into()]))
        );

        builder.replace_all("tags", vec![Value::from("z")]).unwrap();
        builder.clear("tags").unwrap();
        assert_eq!(builder.wrap().get("tags").unwrap(), Some(Value::List(Vec::new())));
    }

    #[test]
    fn test_missing_field_in_version() {
        let plan = plan();
        let factory = DynamicFactory::new(&plan);
        let mut builder = factory.for_version("v1").unwrap().builder("Order").unwrap();

        let err = builder.set("note", "hello").unwrap_err();
        assert_eq!(err.code(), ErrorCode::FieldNotAvailable);
        assert_eq!(builder.wrap().get("note").unwrap(), Some(Value::String(String::new())));
    }

    #[test]
    fn test_unknown_version_and_message() {
        let plan = plan();
        let factory = DynamicFactory::new(&plan);

        assert_eq!(factory.for_version("v3").unwrap_err().code(), ErrorCode::VersionNotSupported);
        let v1 = factory.for_version("v1").unwrap();
        assert_eq!(v1.builder("Invoice").unwrap_err().code(), ErrorCode::MessageNotFound);
        assert_eq!(factory.latest().unwrap().version().as_str(), "v2");
    }
}
