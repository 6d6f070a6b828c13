//! Rust Code Emitter
//!
//! Renders accessor plans to Rust source over per-version `prost` types.
//!
//! Per message:
//! - unified trait (`Order`) and builder trait (`OrderBuilder`)
//! - extraction table `OrderExtract<P>`: one function pointer per accessor
//! - `OrderView<'a, P>`: the shared getters, identical for every version,
//!   each delegating to the table
//! - per version: a static extraction table (`ORDER_V1`) and a payload
//!   builder (`OrderPayloadV1`) whose setters convert before they store
//!
//! Key constraint: this module never looks at conflict types. Everything it
//! renders comes from the plan's ReadOp/WriteOp per version.

use std::collections::HashSet;

use super::names::{
    accessor_method, enum_variant, escape_keyword, mutator_method, prost_field, prost_oneof_path,
    prost_type_path, to_pascal_case, to_screaming_case, to_snake_case, type_name, unit_module, version_item,
    version_item_ref,
};
use super::GenerationContext;
use crate::error::{Result, SchemaError};
use crate::merged::{Cardinality, MergedEnum, Repr};
use crate::plan::{AccessorPlan, FieldPlan, MessagePlan, ReadOp, SlotRef, WriteOp};
use crate::schema::{ScalarType, WellKnownType};
use crate::version::VersionId;

/// Path generated code uses to reach the runtime support module
pub const RUNTIME: &str = "::schema_weave::runtime";

/// Source text of one unit plus the unified items it exports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedUnit {
    pub code: String,
    pub exports: Vec<String>,
}

// =============================================================================
// Type Resolution
// =============================================================================

/// An accessor with its Rust types resolved
struct Accessor<'p> {
    field: &'p FieldPlan,
    plan: &'p AccessorPlan,
    method: String,
    /// Element type in unified terms
    element: String,
    /// Setter parameter type for one element
    input: String,
}

impl Accessor<'_> {
    fn returns_option(&self) -> bool {
        self.field.cardinality == Cardinality::Single
            && (self.field.presence || matches!(self.plan.value_type, Repr::Message(_)))
    }

    fn getter_type(&self) -> String {
        match self.field.cardinality {
            Cardinality::Single if self.returns_option() => format!("Option<{}>", self.element),
            Cardinality::Single => self.element.clone(),
            Cardinality::Repeated => format!("Vec<{}>", self.element),
            Cardinality::Map(key) => format!("HashMap<{}, {}>", key.rust_type(), self.element),
        }
    }

    fn extract_type(&self) -> String {
        match self.field.cardinality {
            Cardinality::Single => format!("Option<{}>", self.element),
            _ => self.getter_type(),
        }
    }

    fn is_enum(&self) -> bool {
        matches!(self.plan.value_type, Repr::Enum(_))
    }
}

fn entity_error(entity: &str, reason: impl Into<String>) -> SchemaError {
    SchemaError::Generation {
        entity: entity.to_string(),
        reason: reason.into(),
    }
}

/// Unified name of an enum, following collapsed paths to the survivor
fn enum_type(ctx: &GenerationContext<'_>, entity: &str, path: &str) -> Result<String> {
    let merged = ctx
        .plan()
        .enumeration(path)
        .ok_or_else(|| entity_error(entity, format!("references unknown enum {}", path)))?;
    if !ctx.is_available(&merged.path) {
        return Err(entity_error(entity, format!("depends on blocked entity {}", merged.path)));
    }
    Ok(type_name(&merged.path))
}

/// `Timestamp` or `Duration` reference exposed as a chrono value
fn native_time(ctx: &GenerationContext<'_>, path: &str) -> Option<WellKnownType> {
    if !ctx.output().native_well_known_types {
        return None;
    }
    WellKnownType::from_type_ref(path).filter(|wkt| matches!(wkt, WellKnownType::Timestamp | WellKnownType::Duration))
}

/// Rust type of a message reference that is not merged (well-known types).
/// Wrappers already arrive from prost as primitives.
fn external_type(ctx: &GenerationContext<'_>, entity: &str, path: &str) -> Result<String> {
    match native_time(ctx, path) {
        Some(WellKnownType::Timestamp) => return Ok(format!("{0}::chrono::DateTime<{0}::chrono::Utc>", RUNTIME)),
        Some(_) => return Ok(format!("{}::chrono::TimeDelta", RUNTIME)),
        None => {}
    }
    WellKnownType::from_type_ref(path)
        .map(|wkt| wkt.prost_type().to_string())
        .ok_or_else(|| entity_error(entity, format!("unsupported external message type {}", path)))
}

fn is_merged_message(ctx: &GenerationContext<'_>, path: &str) -> bool {
    ctx.plan().message(path).is_some()
}

fn check_message(ctx: &GenerationContext<'_>, entity: &str, path: &str) -> Result<()> {
    if ctx.is_available(path) {
        Ok(())
    } else {
        Err(entity_error(entity, format!("depends on blocked entity {}", path)))
    }
}

/// Type a getter returns for one element of `repr`
fn element_type(ctx: &GenerationContext<'_>, entity: &str, repr: &Repr) -> Result<String> {
    match repr {
        Repr::Scalar(s) => Ok(s.rust_type().to_string()),
        Repr::Enum(path) => Ok(format!("EnumValue<{}>", enum_type(ctx, entity, path)?)),
        Repr::Message(path) if is_merged_message(ctx, path) => {
            check_message(ctx, entity, path)?;
            Ok(format!("Box<dyn {} + '_>", type_name(path)))
        }
        Repr::Message(path) => external_type(ctx, entity, path),
    }
}

/// Type a setter accepts for one element of `repr`
fn input_type(ctx: &GenerationContext<'_>, entity: &str, repr: &Repr) -> Result<String> {
    match repr {
        Repr::Scalar(s) => Ok(s.rust_type().to_string()),
        Repr::Enum(path) => enum_type(ctx, entity, path),
        Repr::Message(path) if is_merged_message(ctx, path) => {
            check_message(ctx, entity, path)?;
            Ok(format!("Box<dyn {}Builder>", type_name(path)))
        }
        Repr::Message(path) => external_type(ctx, entity, path),
    }
}

fn resolve_accessors<'p>(ctx: &GenerationContext<'_>, message: &'p MessagePlan) -> Result<Vec<Accessor<'p>>> {
    let mut out = Vec::new();
    for field in &message.fields {
        for plan in &field.accessors {
            let entity = format!("{}.{}", message.path, plan.name);
            out.push(Accessor {
                field,
                plan,
                method: accessor_method(&plan.name),
                element: element_type(ctx, &entity, &plan.value_type)?,
                input: input_type(ctx, &entity, &plan.value_type)?,
            });
        }
    }
    Ok(out)
}

// =============================================================================
// Per-Version Item Names
// =============================================================================

fn extract_static_base(message: &MessagePlan) -> String {
    to_screaming_case(&type_name(&message.path))
}

/// Name of a per-version static (`ORDER_V1`, or `ORDER` inside `mod v1`)
fn static_item(ctx: &GenerationContext<'_>, message: &MessagePlan, version: &VersionId) -> String {
    let base = extract_static_base(message);
    if ctx.output().version_suffix {
        format!("{}_{}", base, version.module_segment().to_ascii_uppercase())
    } else {
        base
    }
}

/// Absolute path of a per-version item of the message at `path`
pub(super) fn version_ref(ctx: &GenerationContext<'_>, path: &str, item: &str) -> String {
    let root = path.split('.').next().unwrap_or(path);
    format!("{}::{}::{}", ctx.unified_root(), unit_module(root), item)
}

pub(super) fn static_ref(ctx: &GenerationContext<'_>, path: &str, version: &VersionId) -> String {
    let base = to_screaming_case(&type_name(path));
    let item = if ctx.output().version_suffix {
        format!("{}_{}", base, version.module_segment().to_ascii_uppercase())
    } else {
        format!("{}::{}", version.module_segment(), base)
    };
    version_ref(ctx, path, &item)
}

pub(super) fn payload_ref(ctx: &GenerationContext<'_>, path: &str, version: &VersionId) -> String {
    let base = format!("{}Payload", type_name(path));
    version_ref(ctx, path, &version_item_ref(ctx.output(), &base, version))
}

// =============================================================================
// Public API
// =============================================================================

/// Emit the unit for a top-level message and everything nested in it
pub fn emit_message_unit(ctx: &GenerationContext<'_>, message: &MessagePlan) -> Result<EmittedUnit> {
    let messages = message.walk();
    let mut resolved = Vec::with_capacity(messages.len());
    for m in &messages {
        resolved.push((*m, resolve_accessors(ctx, m)?));
    }

    let mut output = String::new();
    output.push_str(&ctx.header(&format!("Unified accessors for `{}`", message.path)));
    output.push_str("#![allow(unused_imports, unused_variables, clippy::clone_on_copy, clippy::redundant_closure)]\n\n");
    output.push_str("use super::*;\n");
    output.push_str(&format!(
        "use {}::{{self, ConversionError, ConversionResult, EnumValue, ProtoEnum}};\n",
        RUNTIME
    ));
    output.push_str("use std::collections::HashMap;\n\n");

    let mut exports = Vec::new();
    for (m, accessors) in &resolved {
        let name = type_name(&m.path);
        emit_trait(&mut output, m, &name, accessors);
        exports.push(name.clone());
        if ctx.output().generate_builders {
            emit_builder_trait(&mut output, &name, accessors);
            exports.push(format!("{}Builder", name));
        }
        emit_extract_struct(&mut output, &name, accessors);
        emit_view(&mut output, &name, accessors);
        exports.push(format!("{}Extract", name));
        exports.push(format!("{}View", name));
    }

    for version in ctx.versions().iter() {
        let mut section = String::new();
        for (m, accessors) in &resolved {
            if !m.exists_in(version) {
                continue;
            }
            emit_extract_static(&mut section, ctx, m, accessors, version)?;
            if ctx.output().generate_builders {
                emit_payload_builder(&mut section, ctx, m, accessors, version)?;
            }
        }
        if section.is_empty() {
            continue;
        }
        if ctx.output().version_suffix {
            output.push_str(&section);
        } else {
            output.push_str(&format!("/// {} items\n", version));
            output.push_str(&format!("pub mod {} {{\n", version.module_segment()));
            output.push_str("    use super::*;\n\n");
            for line in section.lines() {
                if line.is_empty() {
                    output.push('\n');
                } else {
                    output.push_str(&format!("    {}\n", line));
                }
            }
            output.push_str("}\n\n");
        }
    }

    Ok(EmittedUnit { code: output, exports })
}

/// Emit the unit for one merged enum
pub fn emit_enum_unit(ctx: &GenerationContext<'_>, merged: &MergedEnum) -> Result<EmittedUnit> {
    let name = type_name(&merged.path);
    if merged.values.is_empty() {
        return Err(entity_error(&merged.path, "enum has no members"));
    }

    let mut variants: Vec<String> = Vec::with_capacity(merged.values.len());
    for value in &merged.values {
        let mut variant = enum_variant(&name, &value.name);
        if variants.contains(&variant) {
            variant = format!("{}{}", variant, value.number.unsigned_abs());
        }
        variants.push(variant);
    }

    let mut output = String::new();
    output.push_str(&ctx.header(&format!("Unified enum `{}`", merged.path)));
    output.push_str("#![allow(unused_imports)]\n\n");
    output.push_str("use super::*;\n");
    output.push_str(&format!("use {}::{{EnumValue, ProtoEnum}};\n\n", RUNTIME));

    let versions: Vec<&str> = merged.versions.iter().map(|v| v.as_str()).collect();
    output.push_str(&format!("/// `{}` across versions {}\n", merged.path, versions.join(", ")));
    if !merged.collapsed_from.is_empty() {
        output.push_str(&format!("///\n/// Also declared as: {}\n", merged.collapsed_from.join(", ")));
    }
    output.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]\n");
    output.push_str("#[repr(i32)]\n");
    output.push_str(&format!("pub enum {} {{\n", name));
    for (value, variant) in merged.values.iter().zip(&variants) {
        let mut doc = format!("{} = {}", value.name, value.number);
        if value.versions.len() < merged.versions.len() {
            let only: Vec<&str> = value.versions.iter().map(|v| v.as_str()).collect();
            doc.push_str(&format!("; only in {}", only.join(", ")));
        }
        if !value.aliases.is_empty() {
            doc.push_str(&format!("; also named {}", value.aliases.join(", ")));
        }
        output.push_str(&format!("    /// {}\n", doc));
        output.push_str(&format!("    {} = {},\n", variant, value.number));
    }
    output.push_str("}\n\n");

    output.push_str(&format!("impl {} {{\n", name));
    output.push_str(&format!("    pub const ALL: &'static [{}] = &[\n", name));
    for variant in &variants {
        output.push_str(&format!("        Self::{},\n", variant));
    }
    output.push_str("    ];\n\n");

    output.push_str("    /// Member name as declared in the schema\n");
    output.push_str("    pub fn as_str_name(self) -> &'static str {\n");
    output.push_str("        match self {\n");
    for (value, variant) in merged.values.iter().zip(&variants) {
        output.push_str(&format!("            Self::{} => \"{}\",\n", variant, value.name));
    }
    output.push_str("        }\n    }\n\n");

    output.push_str("    /// Versions declaring this member\n");
    output.push_str("    pub fn versions(self) -> &'static [&'static str] {\n");
    output.push_str("        match self {\n");
    for (value, variant) in merged.values.iter().zip(&variants) {
        let tags: Vec<String> = value.versions.iter().map(|v| format!("\"{}\"", v)).collect();
        output.push_str(&format!("            Self::{} => &[{}],\n", variant, tags.join(", ")));
    }
    output.push_str("        }\n    }\n");

    // Per-version prost conversions exist only where every version declares
    // the enum at the surviving path
    if merged.collapsed_from.is_empty() {
        for version in &merged.versions {
            let prost = prost_type_path(ctx.output(), version, &merged.path);
            let segment = version.module_segment();
            output.push_str(&format!("\n    /// Convert to the {} enum\n", version));
            output.push_str(&format!("    pub fn to_{}(self) -> Option<{}> {{\n", segment, prost));
            if ctx.output().legacy_enum_conversion() {
                output.push_str(&format!("        {}::from_i32(self as i32)\n", prost));
            } else {
                output.push_str(&format!("        {}::try_from(self as i32).ok()\n", prost));
            }
            output.push_str("    }\n\n");
            output.push_str(&format!("    /// Convert from the {} enum\n", version));
            output.push_str(&format!("    pub fn from_{}(value: {}) -> EnumValue<Self> {{\n", segment, prost));
            output.push_str("        EnumValue::from_raw(value as i64)\n");
            output.push_str("    }\n");
        }
    }
    output.push_str("}\n\n");

    output.push_str(&format!("impl ProtoEnum for {} {{\n", name));
    output.push_str(&format!("    const NAME: &'static str = \"{}\";\n\n", merged.path));
    output.push_str("    fn number(self) -> i32 {\n        self as i32\n    }\n\n");
    output.push_str("    fn from_number(number: i32) -> Option<Self> {\n");
    output.push_str("        match number {\n");
    for (value, variant) in merged.values.iter().zip(&variants) {
        output.push_str(&format!("            {} => Some(Self::{}),\n", value.number, variant));
    }
    output.push_str("            _ => None,\n        }\n    }\n\n");
    output.push_str("    fn supported_in(self, version: &str) -> bool {\n");
    output.push_str("        self.versions().contains(&version)\n");
    output.push_str("    }\n}\n\n");

    output.push_str(&format!("impl TryFrom<i32> for {} {{\n", name));
    output.push_str("    type Error = i32;\n\n");
    output.push_str("    fn try_from(number: i32) -> Result<Self, i32> {\n");
    output.push_str("        Self::from_number(number).ok_or(number)\n");
    output.push_str("    }\n}\n");

    Ok(EmittedUnit { code: output, exports: vec![name] })
}

// =============================================================================
// Unified Items
// =============================================================================

fn accessor_doc(accessor: &Accessor<'_>) -> String {
    let field = accessor.field;
    let absent: Vec<&str> = accessor
        .plan
        .bindings
        .iter()
        .filter(|b| b.slot.is_none())
        .map(|b| b.version.as_str())
        .collect();
    let mut doc = format!("`{}` #{} ({})", field.name, field.number, field.conflict);
    if !absent.is_empty() {
        doc.push_str(&format!("; absent in {}", absent.join(", ")));
    }
    doc
}

fn emit_trait(output: &mut String, message: &MessagePlan, name: &str, accessors: &[Accessor<'_>]) {
    let versions: Vec<&str> = message.versions.iter().map(|v| v.as_str()).collect();
    output.push_str(&format!("/// `{}` across versions {}\n", message.path, versions.join(", ")));
    output.push_str(&format!("pub trait {} {{\n", name));
    output.push_str("    /// Version of the wrapped payload\n");
    output.push_str("    fn version(&self) -> &'static str;\n");
    for accessor in accessors {
        output.push_str(&format!("\n    /// {}\n", accessor_doc(accessor)));
        output.push_str(&format!("    fn {}(&self) -> {};\n", accessor.method, accessor.getter_type()));
    }
    output.push_str("}\n\n");
}

/// Note on setters that store into `float` in some version
fn setter_doc(accessor: &Accessor<'_>) -> Option<String> {
    let rounded: Vec<&str> = accessor
        .plan
        .bindings
        .iter()
        .filter(|b| matches!(b.write, Some(WriteOp::Narrow { to: ScalarType::Float, .. })))
        .map(|b| b.version.as_str())
        .collect();
    if rounded.is_empty() {
        return None;
    }
    Some(format!(
        "Rounded to the nearest f32 in {}; only the magnitude is range-checked",
        rounded.join(", ")
    ))
}

fn emit_builder_trait(output: &mut String, name: &str, accessors: &[Accessor<'_>]) {
    output.push_str(&format!("/// Version-checked mutation of a `{}` payload\n", name));
    output.push_str(&format!("pub trait {}Builder {{\n", name));
    output.push_str("    fn version(&self) -> &'static str;\n\n");
    output.push_str("    /// Read the payload built so far\n");
    output.push_str(&format!("    fn view(&self) -> Box<dyn {} + '_>;\n\n", name));
    output.push_str("    fn into_any(self: Box<Self>) -> Box<dyn std::any::Any>;\n");

    for accessor in accessors.iter().filter(|a| a.plan.has_setter()) {
        let name = &accessor.plan.name;
        output.push('\n');
        if let Some(doc) = setter_doc(accessor) {
            output.push_str(&format!("    /// {}\n", doc));
        }
        match accessor.field.cardinality {
            Cardinality::Single => {
                output.push_str(&format!(
                    "    fn {}(&mut self, value: {}) -> ConversionResult<()>;\n",
                    mutator_method("set", name),
                    accessor.input
                ));
            }
            Cardinality::Repeated => {
                output.push_str(&format!(
                    "    fn {}(&mut self, value: {}) -> ConversionResult<()>;\n",
                    mutator_method("append", name),
                    accessor.input
                ));
                output.push_str(&format!(
                    "    fn {}(&mut self, values: Vec<{}>) -> ConversionResult<()>;\n",
                    mutator_method("append_all", name),
                    accessor.input
                ));
                output.push_str(&format!(
                    "    fn {}(&mut self, values: Vec<{}>) -> ConversionResult<()>;\n",
                    mutator_method("replace_all", name),
                    accessor.input
                ));
            }
            Cardinality::Map(key) => {
                output.push_str(&format!(
                    "    fn {}(&mut self, key: {}, value: {}) -> ConversionResult<()>;\n",
                    mutator_method("put", name),
                    key.rust_type(),
                    accessor.input
                ));
                output.push_str(&format!(
                    "    fn {}(&mut self, key: &{}) -> ConversionResult<()>;\n",
                    mutator_method("remove", name),
                    key.rust_type()
                ));
            }
        }
        output.push_str(&format!("    fn {}(&mut self) -> ConversionResult<()>;\n", mutator_method("clear", name)));
    }
    output.push_str("}\n\n");
}

fn emit_extract_struct(output: &mut String, name: &str, accessors: &[Accessor<'_>]) {
    output.push_str(&format!("/// Per-version extraction functions for `{}`\n", name));
    output.push_str(&format!("pub struct {}Extract<P: 'static> {{\n", name));
    output.push_str("    pub version: &'static str,\n");
    for accessor in accessors {
        output.push_str(&format!("    pub {}: fn(&P) -> {},\n", accessor.method, accessor.extract_type()));
    }
    output.push_str("}\n\n");
}

fn emit_view(output: &mut String, name: &str, accessors: &[Accessor<'_>]) {
    output.push_str(&format!("/// Unified view of a `{}` payload of any version\n", name));
    output.push_str(&format!("pub struct {}View<'a, P: 'static> {{\n", name));
    output.push_str("    payload: &'a P,\n");
    output.push_str(&format!("    extract: &'static {}Extract<P>,\n", name));
    output.push_str("}\n\n");

    output.push_str(&format!("impl<'a, P: 'static> {}View<'a, P> {{\n", name));
    output.push_str(&format!(
        "    pub fn new(payload: &'a P, extract: &'static {}Extract<P>) -> Self {{\n",
        name
    ));
    output.push_str("        Self { payload, extract }\n    }\n\n");
    output.push_str("    pub fn payload(&self) -> &'a P {\n        self.payload\n    }\n}\n\n");

    output.push_str(&format!("impl<'a, P: 'static> {} for {}View<'a, P> {{\n", name, name));
    output.push_str("    fn version(&self) -> &'static str {\n        self.extract.version\n    }\n");
    for accessor in accessors {
        let call = format!("(self.extract.{})(self.payload)", accessor.method);
        let body = match accessor.field.cardinality {
            Cardinality::Single if accessor.returns_option() => call,
            Cardinality::Single if accessor.is_enum() => format!("{}.unwrap_or_else(|| EnumValue::from_raw(0))", call),
            Cardinality::Single => format!("{}.unwrap_or_default()", call),
            _ => call,
        };
        output.push_str(&format!(
            "\n    fn {}(&self) -> {} {{\n        {}\n    }}\n",
            accessor.method,
            accessor.getter_type(),
            body
        ));
    }
    output.push_str("}\n\n");
}

// =============================================================================
// Per-Version Extraction
// =============================================================================

/// How to reach a single-valued field in a payload `p`
enum Raw {
    /// Expression of an owned value that is always there
    Always(String),
    /// Expression of an `Option` (owned scalar, or `&M` for messages)
    Optional(String),
}

fn raw_single(ctx: &GenerationContext<'_>, message: &MessagePlan, version: &VersionId, slot: &SlotRef) -> Raw {
    let is_message = matches!(slot.repr, Repr::Message(_));
    if let Some(group) = &slot.oneof {
        let variant = format!(
            "{}::{}",
            prost_oneof_path(ctx.output(), version, &message.path, group),
            to_pascal_case(&slot.name)
        );
        let bound = if is_message { "v" } else { "v.clone()" };
        return Raw::Optional(format!(
            "match &p.{} {{ Some({}(v)) => Some({}), _ => None }}",
            prost_field(group),
            variant,
            bound
        ));
    }
    let field = prost_field(&slot.name);
    if is_message {
        Raw::Optional(format!("p.{}.as_ref()", field))
    } else if slot.presence {
        Raw::Optional(format!("p.{}.clone()", field))
    } else {
        Raw::Always(format!("p.{}.clone()", field))
    }
}

/// Conversion of a version element `var` into the unified element; `None`
/// when the value passes through unchanged
fn read_conversion(
    ctx: &GenerationContext<'_>,
    op: &ReadOp,
    accessor: &Accessor<'_>,
    version: &VersionId,
    var: &str,
) -> Option<String> {
    match op {
        ReadOp::Copy => match &accessor.plan.value_type {
            Repr::Scalar(_) => None,
            Repr::Enum(_) => Some(format!("EnumValue::from_raw(i64::from({}))", var)),
            Repr::Message(path) if is_merged_message(ctx, path) => Some(format!(
                "Box::new({}View::new({}, &{})) as Box<dyn {} + '_>",
                type_name(path),
                var,
                static_ref(ctx, path, version),
                type_name(path)
            )),
            Repr::Message(path) => match native_time(ctx, path) {
                Some(WellKnownType::Timestamp) => Some(format!("runtime::timestamp_from_parts({0}.seconds, {0}.nanos)", var)),
                Some(_) => Some(format!("runtime::duration_from_parts({0}.seconds, {0}.nanos)", var)),
                None => Some(format!("{}.clone()", var)),
            },
        },
        ReadOp::Widen { from, to } => Some(format!(
            "runtime::widen::<{}, {}>({})",
            from.rust_type(),
            to.rust_type(),
            var
        )),
        ReadOp::EnumNumber { to } => Some(format!("runtime::widen::<i32, {}>({})", to.rust_type(), var)),
        ReadOp::NumberAsEnum { from } => Some(format!(
            "EnumValue::from_raw(runtime::widen::<{}, i64>({}))",
            from.rust_type(),
            var
        )),
        ReadOp::Utf8Decode => Some(format!("runtime::text_from_bytes(&{})", var)),
        ReadOp::Utf8Encode => Some(format!("runtime::bytes_from_text(&{})", var)),
        ReadOp::Missing | ReadOp::OtherFamily | ReadOp::Default => None,
    }
}

fn default_element(accessor: &Accessor<'_>) -> String {
    match &accessor.plan.value_type {
        Repr::Scalar(_) => "Some(Default::default())".to_string(),
        Repr::Enum(_) => "Some(EnumValue::from_raw(0))".to_string(),
        Repr::Message(_) => "None".to_string(),
    }
}

/// Closure computing one accessor's unified value from a version payload
fn extraction(
    ctx: &GenerationContext<'_>,
    message: &MessagePlan,
    accessor: &Accessor<'_>,
    version: &VersionId,
) -> String {
    let Some(binding) = accessor.plan.binding(version) else {
        return "|_| Default::default()".to_string();
    };
    let slot = match (&binding.read, &binding.slot) {
        (ReadOp::Missing | ReadOp::OtherFamily, _) | (_, None) => {
            return "|_| Default::default()".to_string();
        }
        (ReadOp::Default, _) => {
            return match accessor.field.cardinality {
                Cardinality::Single => format!("|_| {}", default_element(accessor)),
                _ => "|_| Default::default()".to_string(),
            };
        }
        (_, Some(slot)) => slot,
    };

    let is_message = matches!(slot.repr, Repr::Message(_));
    match accessor.field.cardinality {
        Cardinality::Single => match raw_single(ctx, message, version, slot) {
            Raw::Always(expr) => match read_conversion(ctx, &binding.read, accessor, version, &expr) {
                Some(converted) => format!("|p| Some({})", converted),
                None => format!("|p| Some({})", expr),
            },
            Raw::Optional(expr) => match read_conversion(ctx, &binding.read, accessor, version, "v") {
                Some(converted) => format!("|p| {}.map(|v| {})", expr, converted),
                None => format!("|p| {}", expr),
            },
        },
        Cardinality::Repeated => {
            let field = prost_field(&slot.name);
            let var = if is_message { "v" } else { "v.clone()" };
            match read_conversion(ctx, &binding.read, accessor, version, var) {
                Some(converted) => format!("|p| p.{}.iter().map(|v| {}).collect()", field, converted),
                None => format!("|p| p.{}.clone()", field),
            }
        }
        Cardinality::Map(_) => {
            let field = prost_field(&slot.name);
            let var = if is_message { "v" } else { "v.clone()" };
            match read_conversion(ctx, &binding.read, accessor, version, var) {
                Some(converted) => format!(
                    "|p| p.{}.iter().map(|(k, v)| (k.clone(), {})).collect()",
                    field, converted
                ),
                None => format!("|p| p.{}.clone()", field),
            }
        }
    }
}

fn emit_extract_static(
    output: &mut String,
    ctx: &GenerationContext<'_>,
    message: &MessagePlan,
    accessors: &[Accessor<'_>],
    version: &VersionId,
) -> Result<()> {
    let name = type_name(&message.path);
    let prost = prost_type_path(ctx.output(), version, &message.path);
    output.push_str(&format!("/// `{}` extraction for {}\n", message.path, version));
    output.push_str(&format!(
        "pub static {}: {}Extract<{}> = {}Extract {{\n",
        static_item(ctx, message, version),
        name,
        prost,
        name
    ));
    output.push_str(&format!("    version: \"{}\",\n", version));
    for accessor in accessors {
        output.push_str(&format!(
            "    {}: {},\n",
            accessor.method,
            extraction(ctx, message, accessor, version)
        ));
    }
    output.push_str("};\n\n");
    Ok(())
}

// =============================================================================
// Per-Version Mutation
// =============================================================================

/// Expression converting unified `var` into the version's element type
/// (may use `?`)
fn write_conversion(
    ctx: &GenerationContext<'_>,
    op: &WriteOp,
    accessor: &Accessor<'_>,
    slot: &SlotRef,
    version: &VersionId,
    var: &str,
) -> Result<String> {
    let field = &accessor.plan.name;
    let entity = field.to_string();
    let expr = match op {
        WriteOp::Copy => match &accessor.plan.value_type {
            Repr::Message(path) if is_merged_message(ctx, path) => format!(
                "{}.into_any().downcast::<{}>().map(|b| b.payload).map_err(|_| ConversionError::mismatch(\"{}\", \"{}\", \"builder belongs to another version\"))?",
                var,
                payload_ref(ctx, path, version),
                field,
                version
            ),
            Repr::Message(path) => match native_time(ctx, path) {
                Some(WellKnownType::Timestamp) => format!(
                    "{{ let (seconds, nanos) = runtime::timestamp_parts(&{}); ::prost_types::Timestamp {{ seconds, nanos }} }}",
                    var
                ),
                Some(_) => format!(
                    "{{ let (seconds, nanos) = runtime::duration_parts(&{}); ::prost_types::Duration {{ seconds, nanos }} }}",
                    var
                ),
                None => var.to_string(),
            },
            _ => var.to_string(),
        },
        WriteOp::Narrow { from, to } => format!(
            "runtime::narrow::<{}, {}>({}, \"{}\", \"{}\")?",
            from.rust_type(),
            to.rust_type(),
            var,
            field,
            version
        ),
        WriteOp::NumberToEnum { from } => {
            let Repr::Enum(path) = &slot.repr else {
                return Err(entity_error(&entity, "number-to-enum write into a non-enum slot"));
            };
            format!(
                "runtime::number_for_version::<{}>(runtime::widen::<{}, i64>({}), \"{}\", \"{}\")?",
                enum_type(ctx, &entity, path)?,
                from.rust_type(),
                var,
                field,
                version
            )
        }
        WriteOp::EnumToNumber { to } => format!(
            "runtime::narrow::<i32, {}>(ProtoEnum::number({}), \"{}\", \"{}\")?",
            to.rust_type(),
            var,
            field,
            version
        ),
        WriteOp::EnumMember => format!("runtime::member_for_version({}, \"{}\", \"{}\")?", var, field, version),
        WriteOp::Utf8Encode => format!("runtime::encode_text(&{})", var),
        WriteOp::Utf8Decode => format!("runtime::decode_text(&{}, \"{}\", \"{}\")?", var, field, version),
        WriteOp::NotAvailable | WriteOp::Unsupported => {
            return Err(entity_error(&entity, "non-storing write has no conversion"));
        }
    };
    Ok(expr)
}

/// Body for a mutator whose write op never stores
fn refusal(op: &WriteOp, field: &str, operation: &str, version: &VersionId) -> Option<String> {
    match op {
        WriteOp::NotAvailable => Some(format!(
            "Err(ConversionError::not_available(\"{}\", \"{}\"))",
            field, version
        )),
        WriteOp::Unsupported => Some(format!(
            "Err(ConversionError::unsupported(\"{}\", \"{}\", \"{}\"))",
            field, operation, version
        )),
        _ => None,
    }
}

fn store_single(ctx: &GenerationContext<'_>, message: &MessagePlan, slot: &SlotRef, version: &VersionId) -> String {
    if let Some(group) = &slot.oneof {
        return format!(
            "self.payload.{} = Some({}::{}(v));",
            prost_field(group),
            prost_oneof_path(ctx.output(), version, &message.path, group),
            to_pascal_case(&slot.name)
        );
    }
    let field = prost_field(&slot.name);
    if slot.presence || matches!(slot.repr, Repr::Message(_)) {
        format!("self.payload.{} = Some(v);", field)
    } else {
        format!("self.payload.{} = v;", field)
    }
}

fn clear_single(ctx: &GenerationContext<'_>, message: &MessagePlan, slot: &SlotRef, version: &VersionId) -> String {
    if let Some(group) = &slot.oneof {
        let field = prost_field(group);
        return format!(
            "if matches!(self.payload.{}, Some({}::{}(_))) {{\n            self.payload.{} = None;\n        }}",
            field,
            prost_oneof_path(ctx.output(), version, &message.path, group),
            to_pascal_case(&slot.name),
            field
        );
    }
    let field = prost_field(&slot.name);
    match &slot.repr {
        Repr::Message(_) => format!("self.payload.{} = None;", field),
        _ if slot.presence => format!("self.payload.{} = None;", field),
        _ => format!("self.payload.{} = Default::default();", field),
    }
}

fn method(output: &mut String, signature: &str, body: &str) {
    output.push_str(&format!("\n    fn {} {{\n", signature));
    for line in body.lines() {
        output.push_str(&format!("        {}\n", line));
    }
    output.push_str("    }\n");
}

fn emit_payload_builder(
    output: &mut String,
    ctx: &GenerationContext<'_>,
    message: &MessagePlan,
    accessors: &[Accessor<'_>],
    version: &VersionId,
) -> Result<()> {
    let name = type_name(&message.path);
    let prost = prost_type_path(ctx.output(), version, &message.path);
    let item = version_item(ctx.output(), &format!("{}Payload", name), version);

    output.push_str(&format!("/// `{}` builder over a {} payload\n", message.path, version));
    output.push_str("#[derive(Debug, Clone, Default, PartialEq)]\n");
    output.push_str(&format!("pub struct {} {{\n    pub payload: {},\n}}\n\n", item, prost));
    output.push_str(&format!("impl {} {{\n", item));
    output.push_str(&format!("    pub fn new(payload: {}) -> Self {{\n        Self {{ payload }}\n    }}\n\n", prost));
    output.push_str(&format!("    pub fn into_payload(self) -> {} {{\n        self.payload\n    }}\n}}\n\n", prost));

    output.push_str(&format!("impl {}Builder for {} {{\n", name, item));
    output.push_str(&format!("    fn version(&self) -> &'static str {{\n        \"{}\"\n    }}\n\n", version));
    output.push_str(&format!(
        "    fn view(&self) -> Box<dyn {} + '_> {{\n        Box::new({}View::new(&self.payload, &{}))\n    }}\n\n",
        name,
        name,
        static_ref(ctx, &message.path, version)
    ));
    output.push_str("    fn into_any(self: Box<Self>) -> Box<dyn std::any::Any> {\n        self\n    }\n");

    for accessor in accessors.iter().filter(|a| a.plan.has_setter()) {
        let field = &accessor.plan.name;
        let binding = accessor.plan.binding(version);
        let op = binding
            .and_then(|b| b.write.clone())
            .unwrap_or(WriteOp::Unsupported);
        let slot = binding.and_then(|b| b.slot.as_ref());

        let storing = match (slot, refusal(&op, field, "set", version)) {
            (Some(slot), None) => Some((slot, write_conversion(ctx, &op, accessor, slot, version, "value")?)),
            _ => None,
        };
        let refuse = |operation: &str| {
            refusal(&op, field, operation, version)
                .unwrap_or_else(|| format!("Err(ConversionError::not_available(\"{}\", \"{}\"))", field, version))
        };

        match accessor.field.cardinality {
            Cardinality::Single => {
                let set_sig = format!("{}(&mut self, value: {}) -> ConversionResult<()>", mutator_method("set", field), accessor.input);
                let clear_sig = format!("{}(&mut self) -> ConversionResult<()>", mutator_method("clear", field));
                match &storing {
                    Some((slot, conversion)) => {
                        method(
                            output,
                            &set_sig,
                            &format!("let v = {};\n{}\nOk(())", conversion, store_single(ctx, message, slot, version)),
                        );
                        method(output, &clear_sig, &format!("{}\nOk(())", clear_single(ctx, message, slot, version)));
                    }
                    None => {
                        method(output, &set_sig, &refuse("set"));
                        method(output, &clear_sig, &refuse("clear"));
                    }
                }
            }
            Cardinality::Repeated => {
                let sigs = [
                    format!("{}(&mut self, value: {}) -> ConversionResult<()>", mutator_method("append", field), accessor.input),
                    format!("{}(&mut self, values: Vec<{}>) -> ConversionResult<()>", mutator_method("append_all", field), accessor.input),
                    format!("{}(&mut self, values: Vec<{}>) -> ConversionResult<()>", mutator_method("replace_all", field), accessor.input),
                    format!("{}(&mut self) -> ConversionResult<()>", mutator_method("clear", field)),
                ];
                match &storing {
                    Some((slot, conversion)) => {
                        let target = prost_field(&slot.name);
                        let collect = format!(
                            "let items = values\n    .into_iter()\n    .map(|value| -> ConversionResult<_> {{ Ok({}) }})\n    .collect::<ConversionResult<Vec<_>>>()?;",
                            conversion
                        );
                        method(output, &sigs[0], &format!("let v = {};\nself.payload.{}.push(v);\nOk(())", conversion, target));
                        method(output, &sigs[1], &format!("{}\nself.payload.{}.extend(items);\nOk(())", collect, target));
                        method(output, &sigs[2], &format!("{}\nself.payload.{} = items;\nOk(())", collect, target));
                        method(output, &sigs[3], &format!("self.payload.{}.clear();\nOk(())", target));
                    }
                    None => {
                        for (sig, operation) in sigs.iter().zip(["append", "append_all", "replace_all", "clear"]) {
                            method(output, sig, &refuse(operation));
                        }
                    }
                }
            }
            Cardinality::Map(key) => {
                let sigs = [
                    format!(
                        "{}(&mut self, key: {}, value: {}) -> ConversionResult<()>",
                        mutator_method("put", field),
                        key.rust_type(),
                        accessor.input
                    ),
                    format!("{}(&mut self, key: &{}) -> ConversionResult<()>", mutator_method("remove", field), key.rust_type()),
                    format!("{}(&mut self) -> ConversionResult<()>", mutator_method("clear", field)),
                ];
                match &storing {
                    Some((slot, conversion)) => {
                        let target = prost_field(&slot.name);
                        method(output, &sigs[0], &format!("let v = {};\nself.payload.{}.insert(key, v);\nOk(())", conversion, target));
                        method(output, &sigs[1], &format!("self.payload.{}.remove(key);\nOk(())", target));
                        method(output, &sigs[2], &format!("self.payload.{}.clear();\nOk(())", target));
                    }
                    None => {
                        for (sig, operation) in sigs.iter().zip(["put", "remove", "clear"]) {
                            method(output, sig, &refuse(operation));
                        }
                    }
                }
            }
        }
    }
    output.push_str("}\n\n");
    Ok(())
}

/// Snake-case method suffix for a message in factory methods
pub fn factory_method(prefix: &str, path: &str) -> String {
    escape_keyword(&format!("{}_{}", prefix, to_snake_case(&type_name(path))))
}

/// Exports of a unit, deduplicated in order
pub fn dedup_exports(exports: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    exports.into_iter().filter(|e| seen.insert(e.clone())).collect()
}
