//! Configuration management for schema merging and generation
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (weave.toml)
//! - Environment variables (WEAVE__*)
//!
//! ## Example config file (weave.toml):
//! ```toml
//! [output]
//! unified_module = "unified"
//! version_module_pattern = "crate::proto::{version}"
//! generate_builders = true
//! version_suffix = true
//! protocol_major_version = 3
//! native_well_known_types = true
//!
//! [filter]
//! include = ["^Order", "^Payment$"]
//! exclude = ["Internal$"]
//!
//! [[mappings]]
//! message = "Payment"
//! field = "amount"
//! numbers = { v1 = 2, v2 = 3 }
//!
//! [run]
//! fail_fast = false
//! jobs = 4
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, SchemaError};
use crate::version::VersionId;

/// Main configuration for merging and generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GeneratorConfig {
    /// Generated code layout
    #[serde(default)]
    pub output: OutputConfig,

    /// Which top-level messages take part
    #[serde(default)]
    pub filter: FilterConfig,

    /// Explicit field alignments
    #[serde(default)]
    pub mappings: Vec<FieldMapping>,

    /// Execution settings
    #[serde(default)]
    pub run: RunConfig,
}

/// Generated code layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Module holding the unified API
    #[serde(default = "default_unified_module")]
    pub unified_module: String,

    /// Path of each version's prost module; `{version}` is replaced by the
    /// version's module segment
    #[serde(default = "default_version_module_pattern")]
    pub version_module_pattern: String,

    /// Generate builders (setters) alongside wrappers
    #[serde(default = "default_true")]
    pub generate_builders: bool,

    /// Suffix per-version type names with the version (`OrderV1`)
    #[serde(default = "default_true")]
    pub version_suffix: bool,

    /// Major version of the protobuf runtime the per-version code targets.
    /// Below 3 the generated enum conversion uses the legacy `from_i32`.
    #[serde(default = "default_protocol_major_version")]
    pub protocol_major_version: u32,

    /// Expose `Timestamp` and `Duration` fields as `chrono` values instead
    /// of the raw `prost-types` messages
    #[serde(default = "default_true")]
    pub native_well_known_types: bool,
}

/// Top-level message filters (regular expressions on the message name)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FilterConfig {
    /// Only messages matching one of these (all when empty)
    #[serde(default)]
    pub include: Vec<String>,

    /// Messages matching any of these are skipped
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Abort at the first failing entity instead of collecting failures
    #[serde(default)]
    pub fail_fast: bool,

    /// Worker threads for generation (1 = sequential)
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

/// Explicit alignment of one logical field.
///
/// Without `numbers`, slots are matched by `field` name across versions.
/// With `numbers`, the listed version uses that wire number; unlisted
/// versions fall back to the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Message name or logical path (`Payment`, `Order.Item`)
    pub message: String,

    /// Unified field name
    pub field: String,

    /// Version identifier -> wire number
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub numbers: BTreeMap<String, u32>,
}

impl FieldMapping {
    pub fn by_name(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: field.into(),
            numbers: BTreeMap::new(),
        }
    }

    pub fn by_numbers(message: impl Into<String>, field: impl Into<String>, numbers: &[(&str, u32)]) -> Self {
        Self {
            message: message.into(),
            field: field.into(),
            numbers: numbers.iter().map(|(v, n)| (v.to_string(), *n)).collect(),
        }
    }

    pub fn is_numbered(&self) -> bool {
        !self.numbers.is_empty()
    }

    pub fn number_for(&self, version: &VersionId) -> Option<u32> {
        self.numbers.get(version.as_str()).copied()
    }

    /// Whether this mapping targets the message at `path`
    pub fn applies_to(&self, path: &str) -> bool {
        self.message == path || (!self.message.contains('.') && crate::schema::simple_name(path) == self.message)
    }
}

// Default value functions
fn default_unified_module() -> String {
    "unified".to_string()
}

fn default_version_module_pattern() -> String {
    "crate::proto::{version}".to_string()
}

fn default_true() -> bool {
    true
}

fn default_protocol_major_version() -> u32 {
    3
}

fn default_jobs() -> usize {
    1
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            unified_module: default_unified_module(),
            version_module_pattern: default_version_module_pattern(),
            generate_builders: true,
            version_suffix: true,
            protocol_major_version: default_protocol_major_version(),
            native_well_known_types: true,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            jobs: default_jobs(),
        }
    }
}

impl OutputConfig {
    /// Module path of one version's prost types
    pub fn version_module(&self, version: &VersionId) -> String {
        self.version_module_pattern
            .replace("{version}", &version.module_segment())
    }

    /// Whether enum conversion uses the legacy `from_i32` form
    pub fn legacy_enum_conversion(&self) -> bool {
        self.protocol_major_version < 3
    }
}

impl FilterConfig {
    /// Compile the include and exclude patterns
    pub fn compile(&self) -> Result<MessageFilter> {
        let include = self
            .include
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let exclude = self
            .exclude
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(MessageFilter { include, exclude })
    }
}

/// Compiled top-level message filter
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl MessageFilter {
    pub fn accepts(&self, name: &str) -> bool {
        (self.include.is_empty() || self.include.iter().any(|r| r.is_match(name)))
            && !self.exclude.iter().any(|r| r.is_match(name))
    }
}

impl GeneratorConfig {
    /// Layer defaults, the well-known files, the XDG config, `config_path`
    /// and `WEAVE__*` variables, later sources winning
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = ["weave.toml", ".weave.toml", "config/weave.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "schema-weave", "weave") {
            let xdg_config = config_dir.config_dir().join("weave.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (WEAVE__*)
        builder = builder.add_source(
            Environment::with_prefix("WEAVE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Reject settings that would make generation meaningless
    pub fn validate(&self) -> Result<()> {
        if self.output.unified_module.trim().is_empty() {
            return Err(SchemaError::InvalidConfig("output.unified_module is empty".to_string()));
        }
        if !self.output.version_module_pattern.contains("{version}") {
            return Err(SchemaError::InvalidConfig(format!(
                "output.version_module_pattern '{}' has no {{version}} placeholder",
                self.output.version_module_pattern
            )));
        }
        if self.run.jobs == 0 {
            return Err(SchemaError::InvalidConfig("run.jobs must be at least 1".to_string()));
        }
        for mapping in &self.mappings {
            if mapping.message.trim().is_empty() || mapping.field.trim().is_empty() {
                return Err(SchemaError::InvalidConfig(format!(
                    "mapping '{}.{}' needs both message and field",
                    mapping.message, mapping.field
                )));
            }
            if let Some((version, _)) = mapping.numbers.iter().find(|(_, n)| **n == 0) {
                return Err(SchemaError::InvalidConfig(format!(
                    "mapping '{}.{}' uses field number 0 for {}",
                    mapping.message, mapping.field, version
                )));
            }
        }
        self.filter.compile()?;
        Ok(())
    }

    /// Mappings that target the message at `path`
    pub fn mappings_for(&self, path: &str) -> Vec<&FieldMapping> {
        self.mappings.iter().filter(|m| m.applies_to(path)).collect()
    }
}
