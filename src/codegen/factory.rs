//! Version-dispatch factory and module index emitters
//!
//! The factory maps a version identifier to a `VersionContext` that wraps
//! payloads of that version and creates empty builders for it. The module
//! index declares every unit and re-exports the unified items.

use super::names::{type_name, unit_module};
use super::rust::{factory_method, payload_ref, static_ref, RUNTIME};
use super::{GeneratedUnit, GenerationContext};
use crate::merged::{Cardinality, MergedSchema, Repr};
use crate::plan::MessagePlan;
use crate::schema::{FieldSlot, Label};
use crate::version::VersionId;

fn context_type(version: &VersionId) -> String {
    format!("{}Context", version.type_suffix())
}

/// Name of the `SchemaInfo` static of a version (`V1_SCHEMA`)
pub fn schema_static(version: &VersionId) -> String {
    format!("{}_SCHEMA", version.module_segment().to_ascii_uppercase())
}

fn field_info(slot: &FieldSlot, repr: &Repr) -> (String, &'static str) {
    let element = match repr {
        Repr::Scalar(s) => s.proto_name().to_string(),
        Repr::Enum(path) | Repr::Message(path) => path.clone(),
    };
    match Cardinality::of(slot) {
        Cardinality::Map(key) => (format!("map<{}, {}>", key, element), "map"),
        Cardinality::Repeated => (element, "repeated"),
        Cardinality::Single if slot.label == Label::Required => (element, "required"),
        Cardinality::Single => (element, "optional"),
    }
}

/// `SchemaInfo` static listing what one version declares
fn emit_schema_info(output: &mut String, schema: &MergedSchema, version: &VersionId) {
    output.push_str(&format!("/// Messages and enums declared by {}\n", version));
    output.push_str(&format!("pub static {}: SchemaInfo = SchemaInfo {{\n", schema_static(version)));
    output.push_str(&format!("    version: {:?},\n", version.as_str()));
    output.push_str("    messages: &[\n");
    for message in schema.all_messages().into_iter().filter(|m| m.exists_in(version)) {
        output.push_str(&format!(
            "        MessageInfo {{\n            path: {:?},\n            fields: &[\n",
            message.path
        ));
        for field in &message.fields {
            let (Some(slot), Some(repr)) = (field.slot(version), field.repr(version)) else {
                continue;
            };
            let (type_name, label) = field_info(slot, repr);
            output.push_str(&format!(
                "                FieldInfo {{ name: {:?}, number: {}, type_name: {:?}, label: {:?} }},\n",
                slot.name, slot.number, type_name, label
            ));
        }
        output.push_str("            ],\n        },\n");
    }
    output.push_str("    ],\n    enums: &[\n");
    for merged in schema.all_enums().into_iter().filter(|e| e.versions.contains(version)) {
        let values: Vec<String> = merged
            .values
            .iter()
            .filter(|v| v.versions.contains(version))
            .map(|v| format!("({:?}, {})", v.name, v.number))
            .collect();
        output.push_str(&format!(
            "        EnumInfo {{ path: {:?}, values: &[{}] }},\n",
            merged.path,
            values.join(", ")
        ));
    }
    output.push_str("    ],\n};\n\n");
}

/// Emit the factory over every successfully generated message
pub fn emit_factory(ctx: &GenerationContext<'_>, messages: &[&MessagePlan]) -> String {
    let builders = ctx.output().generate_builders;
    let versions: Vec<&VersionId> = ctx.versions().iter().collect();

    let mut output = String::new();
    output.push_str(&ctx.header("Version dispatch"));
    output.push_str("#![allow(unused_imports)]\n\n");
    output.push_str("use super::*;\n");
    output.push_str(&format!(
        "use {}::{{ConversionError, ConversionResult, EnumInfo, FieldInfo, MessageInfo, SchemaInfo}};\n",
        RUNTIME
    ));
    output.push_str("use std::any::Any;\n\n");

    let tags: Vec<String> = versions.iter().map(|v| format!("\"{}\"", v)).collect();
    output.push_str("/// Every supported version, oldest first\n");
    output.push_str(&format!("pub const SUPPORTED_VERSIONS: &[&str] = &[{}];\n\n", tags.join(", ")));
    if let Some(latest) = versions.last() {
        output.push_str("/// The latest version, used when a caller names none\n");
        output.push_str(&format!("pub const DEFAULT_VERSION: &str = \"{}\";\n\n", latest));
    }

    for version in &versions {
        emit_schema_info(&mut output, ctx.schema(), version);
    }

    // Trait
    output.push_str("/// Wrap and build operations bound to one version\n");
    output.push_str("pub trait VersionContext: Sync {\n");
    output.push_str("    fn version(&self) -> &'static str;\n\n");
    output.push_str("    /// Messages and enums this version declares\n");
    output.push_str("    fn schema_info(&self) -> &'static SchemaInfo;\n");
    for message in messages {
        let name = type_name(&message.path);
        output.push_str(&format!("\n    /// Wrap a `{}` payload of this version\n", message.path));
        output.push_str(&format!(
            "    fn {}<'a>(&self, payload: &'a dyn Any) -> ConversionResult<Box<dyn {} + 'a>>;\n",
            factory_method("wrap", &message.path),
            name
        ));
        if builders {
            output.push_str(&format!(
                "    fn {}(&self) -> ConversionResult<Box<dyn {}Builder>>;\n",
                factory_method("new", &message.path),
                name
            ));
        }
    }
    output.push_str("}\n\n");

    // One context per version
    for version in &versions {
        let context = context_type(version);
        output.push_str(&format!("/// Operations on {} payloads\n", version));
        output.push_str("#[derive(Debug, Clone, Copy, Default)]\n");
        output.push_str(&format!("pub struct {};\n\n", context));
        output.push_str(&format!("impl VersionContext for {} {{\n", context));
        output.push_str(&format!("    fn version(&self) -> &'static str {{\n        \"{}\"\n    }}\n", version));
        output.push_str(&format!(
            "\n    fn schema_info(&self) -> &'static SchemaInfo {{\n        &{}\n    }}\n",
            schema_static(version)
        ));

        for message in messages {
            let name = type_name(&message.path);
            let exists = message.exists_in(version);
            output.push_str(&format!(
                "\n    fn {}<'a>(&self, {}: &'a dyn Any) -> ConversionResult<Box<dyn {} + 'a>> {{\n",
                factory_method("wrap", &message.path),
                if exists { "payload" } else { "_payload" },
                name
            ));
            if exists {
                let prost = super::names::prost_type_path(ctx.output(), version, &message.path);
                output.push_str(&format!("        payload\n            .downcast_ref::<{}>()\n", prost));
                output.push_str(&format!(
                    "            .map(|p| Box::new({}View::new(p, &{})) as Box<dyn {} + 'a>)\n",
                    name,
                    static_ref(ctx, &message.path, version),
                    name
                ));
                output.push_str(&format!(
                    "            .ok_or_else(|| ConversionError::mismatch(\"{}\", \"{}\", \"payload is not a {} {}\"))\n",
                    message.path, version, version, message.path
                ));
            } else {
                output.push_str(&format!(
                    "        Err(ConversionError::message_not_found(\"{}\", \"{}\"))\n",
                    message.path, version
                ));
            }
            output.push_str("    }\n");

            if builders {
                output.push_str(&format!(
                    "\n    fn {}(&self) -> ConversionResult<Box<dyn {}Builder>> {{\n",
                    factory_method("new", &message.path),
                    name
                ));
                if message.exists_in(version) {
                    output.push_str(&format!(
                        "        Ok(Box::new({}::default()))\n",
                        payload_ref(ctx, &message.path, version)
                    ));
                } else {
                    output.push_str(&format!(
                        "        Err(ConversionError::message_not_found(\"{}\", \"{}\"))\n",
                        message.path, version
                    ));
                }
                output.push_str("    }\n");
            }
        }
        output.push_str("}\n\n");
    }

    // Lookup
    output.push_str("/// Context for a version identifier\n");
    output.push_str("pub fn for_version(version: &str) -> ConversionResult<&'static dyn VersionContext> {\n");
    output.push_str("    match version {\n");
    for version in &versions {
        output.push_str(&format!("        \"{}\" => Ok(&{}),\n", version, context_type(version)));
    }
    output.push_str("        other => Err(ConversionError::version_not_supported(other, SUPPORTED_VERSIONS)),\n");
    output.push_str("    }\n}\n");
    if let Some(latest) = versions.last() {
        output.push_str("\n/// Context for the default version\n");
        output.push_str("pub fn latest() -> &'static dyn VersionContext {\n");
        output.push_str(&format!("    &{}\n}}\n", context_type(latest)));
    }

    output
}

/// Emit the module index declaring every unit
pub fn emit_module_index(ctx: &GenerationContext<'_>, units: &[GeneratedUnit]) -> String {
    let mut output = String::new();
    output.push_str(&ctx.header("Unified API over every supported version"));
    output.push('\n');

    for unit in units {
        output.push_str(&format!("pub mod {};\n", unit_module_of(unit)));
    }
    output.push('\n');
    for unit in units {
        if unit.exports.is_empty() {
            continue;
        }
        output.push_str(&format!(
            "pub use {}::{{{}}};\n",
            unit_module_of(unit),
            unit.exports.join(", ")
        ));
    }
    output
}

fn unit_module_of(unit: &GeneratedUnit) -> String {
    unit.file_name.trim_end_matches(".rs").to_string()
}

/// File stem of the unit generated for a logical path
pub fn unit_file(path: &str) -> String {
    format!("{}.rs", unit_module(path))
}
