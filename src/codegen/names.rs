//! Name Resolution
//!
//! Maps merged logical paths, field names and enum members to Rust
//! identifiers, for both the unified API and the per-version `prost`
//! modules it wraps:
//! - types: path segments joined in PascalCase (`Order.Item` -> `OrderItem`)
//! - prost paths: parent messages become snake_case modules
//!   (`Order.Item` -> `order::Item`)
//! - enum members: prost-style prefix stripping (`UNIT_TYPE_KELVIN` -> `Kelvin`)
//!
//! Keywords are escaped with `r#` the way prost escapes them.

use crate::config::OutputConfig;
use crate::version::VersionId;

const RUST_KEYWORDS: &[&str] = &[
    "as", "break", "const", "continue", "crate", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "static", "struct", "trait",
    "true", "type", "unsafe", "use", "where", "while", "async", "await",
    "dyn", "abstract", "become", "box", "do", "final", "macro", "override",
    "priv", "typeof", "unsized", "virtual", "yield", "try",
];

/// Keywords that cannot be raw identifiers; prost appends `_` instead
const RESERVED_PATH_KEYWORDS: &[&str] = &["self", "Self", "super", "crate"];

// =============================================================================
// Casing
// =============================================================================

/// Convert to PascalCase (`unit_type` -> `UnitType`, `KELVIN` -> `Kelvin`)
pub fn to_pascal_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for word in s.split(|c: char| c == '_' || c == '-' || c == ' ' || c == '.') {
        let mut chars = word.chars();
        let Some(first) = chars.next() else { continue };
        result.push(first.to_ascii_uppercase());
        let rest: String = chars.collect();
        if word.chars().all(|c| !c.is_ascii_lowercase()) {
            result.push_str(&rest.to_ascii_lowercase());
        } else {
            result.push_str(&rest);
        }
    }
    result
}

/// Convert to snake_case (`UnitType` -> `unit_type`)
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;

    for c in s.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c == '-' || c == ' ' || c == '.' {
            result.push('_');
            prev_lower = false;
        } else {
            result.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }

    result
}

/// Convert to SCREAMING_SNAKE_CASE
pub fn to_screaming_case(s: &str) -> String {
    to_snake_case(s).to_ascii_uppercase()
}

/// Escape an identifier that collides with a keyword
pub fn escape_keyword(name: &str) -> String {
    if RESERVED_PATH_KEYWORDS.contains(&name) {
        format!("{}_", name)
    } else if RUST_KEYWORDS.contains(&name) {
        format!("r#{}", name)
    } else {
        name.to_string()
    }
}

// =============================================================================
// Unified Names
// =============================================================================

/// Unified type name of a merged message or enum
pub fn type_name(path: &str) -> String {
    path.split('.').map(to_pascal_case).collect()
}

/// Method name of an accessor
pub fn accessor_method(accessor: &str) -> String {
    escape_keyword(&to_snake_case(accessor))
}

/// Setter-style method name (`set_total`, `append_all_tags`)
pub fn mutator_method(prefix: &str, accessor: &str) -> String {
    format!("{}_{}", prefix, to_snake_case(accessor))
}

/// Variant name of a unified enum member
pub fn enum_variant(enum_name: &str, member: &str) -> String {
    let prefix = format!("{}_", to_screaming_case(enum_name));
    let stripped = member
        .strip_prefix(&prefix)
        .filter(|rest| rest.chars().next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false))
        .unwrap_or(member);
    to_pascal_case(stripped)
}

/// Module (file stem) of a generation unit for a logical path
pub fn unit_module(path: &str) -> String {
    path.split('.').map(to_snake_case).collect::<Vec<_>>().join("_")
}

// =============================================================================
// Per-Version Names
// =============================================================================

/// Path of a prost type for a logical path in one version's module
pub fn prost_type_path(output: &OutputConfig, version: &VersionId, path: &str) -> String {
    let mut segments: Vec<&str> = path.split('.').collect();
    let name = segments.pop().unwrap_or(path);
    let mut out = output.version_module(version);
    for parent in segments {
        out.push_str("::");
        out.push_str(&escape_keyword(&to_snake_case(parent)));
    }
    out.push_str("::");
    out.push_str(&to_pascal_case(name));
    out
}

/// Path of the prost oneof enum for `group` inside message `path`
pub fn prost_oneof_path(output: &OutputConfig, version: &VersionId, path: &str, group: &str) -> String {
    let mut out = output.version_module(version);
    for segment in path.split('.') {
        out.push_str("::");
        out.push_str(&escape_keyword(&to_snake_case(segment)));
    }
    out.push_str("::");
    out.push_str(&to_pascal_case(group));
    out
}

/// Field name prost generates for a proto field
pub fn prost_field(name: &str) -> String {
    escape_keyword(&to_snake_case(name))
}

/// Item name for a per-version artifact (`OrderPayloadV1`, or `OrderPayload`
/// inside a per-version module when suffixes are off)
pub fn version_item(output: &OutputConfig, base: &str, version: &VersionId) -> String {
    if output.version_suffix {
        format!("{}{}", base, version.type_suffix())
    } else {
        base.to_string()
    }
}

/// Reference to a per-version artifact from the unified module's top level
pub fn version_item_ref(output: &OutputConfig, base: &str, version: &VersionId) -> String {
    if output.version_suffix {
        version_item(output, base, version)
    } else {
        format!("{}::{}", version.module_segment(), base)
    }
}
