//! Code Generation
//!
//! Turns a merge outcome into Rust source units.
//!
//! Architecture:
//! - GenerationContext: immutable after `new()`; holds the plan, settings,
//!   blocked entities and fingerprint
//! - SchemaPlan: pure projection of the merged schema; every conversion
//!   decision is made before emission
//! - Emitters (`rust`, `factory`): render plans, never raw schemas
//! - OutputSink: receives finished units in canonical order
//!
//! Failures are per entity. An entity with an error diagnostic is skipped,
//! one that fails to emit is recorded, and everything else still generates
//! unless `fail_fast` is set.

pub mod factory;
pub mod names;
pub mod rust;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::checksum::Fingerprint;
use crate::config::{GeneratorConfig, OutputConfig};
use crate::error::{Result, SchemaError};
use crate::merge::MergeOutcome;
use crate::merged::MergedSchema;
use crate::plan::{MessagePlan, SchemaPlan};
use crate::version::VersionSet;

// =============================================================================
// Generated Units
// =============================================================================

/// Kind of a generated unit; also its position in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Enum,
    Message,
    Factory,
    Index,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enum => write!(f, "enum"),
            Self::Message => write!(f, "message"),
            Self::Factory => write!(f, "factory"),
            Self::Index => write!(f, "index"),
        }
    }
}

/// One generated source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUnit {
    /// Logical path of the entity (or `factory` / `mod`)
    pub id: String,
    pub kind: UnitKind,
    /// File name relative to the unified module directory
    pub file_name: String,
    pub code: String,
    /// Unified items the module index re-exports
    pub exports: Vec<String>,
}

/// Destination of generated units
pub trait OutputSink {
    fn accept(&mut self, unit: &GeneratedUnit) -> Result<()>;
}

/// Sink keeping units in memory, keyed by file name
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    units: BTreeMap<String, GeneratedUnit>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(&self, file_name: &str) -> Option<&str> {
        self.units.get(file_name).map(|u| u.code.as_str())
    }

    pub fn unit(&self, id: &str) -> Option<&GeneratedUnit> {
        self.units.values().find(|u| u.id == id)
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.units.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl OutputSink for MemorySink {
    fn accept(&mut self, unit: &GeneratedUnit) -> Result<()> {
        if self.units.contains_key(&unit.file_name) {
            return Err(SchemaError::Sink {
                unit: unit.file_name.clone(),
                reason: "duplicate file name".to_string(),
            });
        }
        self.units.insert(unit.file_name.clone(), unit.clone());
        Ok(())
    }
}

/// An entity that could not be generated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFailure {
    pub entity: String,
    pub reason: String,
}

/// What a generation run produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    /// File names handed to the sink, in order
    pub generated: Vec<String>,
    /// Entities skipped because of error diagnostics
    pub skipped: Vec<String>,
    pub failures: Vec<EntityFailure>,
    pub fingerprint: String,
}

impl GenerationReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

// =============================================================================
// GenerationContext
// =============================================================================

/// Immutable generation context, shared by every worker
pub struct GenerationContext<'a> {
    outcome: &'a MergeOutcome,
    config: &'a GeneratorConfig,
    plan: SchemaPlan,
    fingerprint: Fingerprint,
    blocked: BTreeSet<String>,
    /// Messages and enums that will be emitted
    available: HashSet<String>,
}

impl<'a> GenerationContext<'a> {
    pub fn new(outcome: &'a MergeOutcome, config: &'a GeneratorConfig) -> Result<Self> {
        config.validate()?;
        let plan = SchemaPlan::build(&outcome.schema);
        let fingerprint = Fingerprint::of_generation(&outcome.schema, config)?;
        let blocked = outcome.diagnostics.blocked_entities();

        let mut available = HashSet::new();
        for message in plan.messages.iter().flat_map(|m| m.walk()) {
            if !is_blocked(&blocked, &message.path) {
                available.insert(message.path.clone());
            }
        }
        for merged in &plan.enums {
            if !is_blocked(&blocked, &merged.path) {
                available.insert(merged.path.clone());
            }
        }

        Ok(Self {
            outcome,
            config,
            plan,
            fingerprint,
            blocked,
            available,
        })
    }

    pub fn plan(&self) -> &SchemaPlan {
        &self.plan
    }

    pub fn schema(&self) -> &MergedSchema {
        &self.outcome.schema
    }

    pub fn versions(&self) -> &VersionSet {
        &self.plan.versions
    }

    pub fn output(&self) -> &OutputConfig {
        &self.config.output
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Whether a message or enum path will be emitted
    pub fn is_available(&self, path: &str) -> bool {
        self.available.contains(path)
    }

    pub fn is_blocked(&self, path: &str) -> bool {
        is_blocked(&self.blocked, path)
    }

    /// Absolute path of the unified module
    pub fn unified_root(&self) -> String {
        format!("crate::{}", self.config.output.unified_module)
    }

    /// Header of every generated file
    pub fn header(&self, title: &str) -> String {
        let versions: Vec<&str> = self.versions().iter().map(|v| v.as_str()).collect();
        let mut out = String::new();
        out.push_str(&format!("//! {}\n", title));
        out.push_str("//!\n");
        out.push_str(&format!(
            "//! Generated by schema-weave from versions {} - DO NOT EDIT\n",
            versions.join(", ")
        ));
        out.push_str(&format!("//! Schema fingerprint: {}\n\n", self.fingerprint.short()));
        out
    }

    pub fn diagnostics(&self) -> &crate::diagnostics::Diagnostics {
        &self.outcome.diagnostics
    }
}

fn is_blocked(blocked: &BTreeSet<String>, path: &str) -> bool {
    let root = path.split('.').next().unwrap_or(path);
    blocked.contains(path) || blocked.contains(root)
}

// =============================================================================
// Jobs
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Job<'p> {
    Enum(&'p crate::merged::MergedEnum),
    Message(&'p MessagePlan),
}

impl Job<'_> {
    fn entity(&self) -> &str {
        match self {
            Job::Enum(e) => &e.path,
            Job::Message(m) => &m.path,
        }
    }

    fn kind(&self) -> UnitKind {
        match self {
            Job::Enum(_) => UnitKind::Enum,
            Job::Message(_) => UnitKind::Message,
        }
    }

    fn run(&self, ctx: &GenerationContext<'_>) -> Result<GeneratedUnit> {
        let emitted = match self {
            Job::Enum(e) => rust::emit_enum_unit(ctx, e)?,
            Job::Message(m) => rust::emit_message_unit(ctx, m)?,
        };
        Ok(GeneratedUnit {
            id: self.entity().to_string(),
            kind: self.kind(),
            file_name: factory::unit_file(self.entity()),
            code: emitted.code,
            exports: rust::dedup_exports(emitted.exports),
        })
    }
}

fn run_jobs(ctx: &GenerationContext<'_>, jobs: &[Job<'_>]) -> Vec<Result<GeneratedUnit>> {
    let workers = ctx.config.run.jobs.max(1);
    if workers == 1 || jobs.len() < 2 {
        let mut results = Vec::with_capacity(jobs.len());
        for job in jobs {
            let result = job.run(ctx);
            let failed = result.is_err();
            results.push(result);
            if failed && ctx.config.run.fail_fast {
                break;
            }
        }
        return results;
    }

    let chunk = jobs.len().div_ceil(workers);
    std::thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .chunks(chunk)
            .map(|slice| scope.spawn(move || slice.iter().map(|job| job.run(ctx)).collect::<Vec<_>>()))
            .collect();
        handles
            .into_iter()
            .flat_map(|h| {
                h.join().unwrap_or_else(|_| {
                    vec![Err(SchemaError::Generation {
                        entity: "worker".to_string(),
                        reason: "generation worker panicked".to_string(),
                    })]
                })
            })
            .collect()
    })
}

// =============================================================================
// Public API
// =============================================================================

/// Generate every unit for a merge outcome into `sink`.
///
/// Output is deterministic: units reach the sink in canonical order
/// (enums, messages, factory, index; by path within a kind) whatever
/// the worker count.
pub fn generate(outcome: &MergeOutcome, config: &GeneratorConfig, sink: &mut dyn OutputSink) -> Result<GenerationReport> {
    let ctx = GenerationContext::new(outcome, config)?;
    let mut report = GenerationReport {
        fingerprint: ctx.fingerprint().to_string(),
        ..Default::default()
    };

    let mut jobs = Vec::new();
    for merged in &ctx.plan().enums {
        jobs.push(Job::Enum(merged));
    }
    for message in &ctx.plan().messages {
        jobs.push(Job::Message(message));
    }
    jobs.retain(|job| {
        if ctx.is_blocked(job.entity()) {
            warn!(entity = %job.entity(), "Skipping entity with error diagnostics");
            report.skipped.push(job.entity().to_string());
            false
        } else {
            true
        }
    });
    jobs.sort_by(|a, b| (a.kind(), a.entity()).cmp(&(b.kind(), b.entity())));

    let mut units = Vec::new();
    let mut file_names = HashSet::new();
    for (job, result) in jobs.iter().zip(run_jobs(&ctx, &jobs)) {
        let failure = match result {
            Ok(unit) if !file_names.insert(unit.file_name.clone()) => {
                SchemaError::Generation {
                    entity: unit.id.clone(),
                    reason: format!("file name {} already generated", unit.file_name),
                }
            }
            Ok(unit) => {
                debug!(entity = %unit.id, file = %unit.file_name, "Generated unit");
                units.push(unit);
                continue;
            }
            Err(e) => e,
        };
        if config.run.fail_fast {
            return Err(failure);
        }
        warn!(entity = %job.entity(), error = %failure, "Generation failed");
        report.failures.push(EntityFailure {
            entity: job.entity().to_string(),
            reason: failure.to_string(),
        });
    }

    let generated: BTreeSet<&str> = units
        .iter()
        .filter(|u| u.kind == UnitKind::Message)
        .map(|u| u.id.as_str())
        .collect();
    let messages: Vec<&MessagePlan> = ctx
        .plan()
        .messages
        .iter()
        .filter(|m| generated.contains(m.path.as_str()))
        .flat_map(|m| m.walk())
        .collect();

    let mut factory_exports = vec![
        "for_version".to_string(),
        "VersionContext".to_string(),
        "SUPPORTED_VERSIONS".to_string(),
    ];
    if !ctx.versions().is_empty() {
        factory_exports.push("latest".to_string());
        factory_exports.push("DEFAULT_VERSION".to_string());
    }
    factory_exports.extend(ctx.versions().iter().map(|v| format!("{}Context", v.type_suffix())));
    factory_exports.extend(ctx.versions().iter().map(factory::schema_static));
    units.push(GeneratedUnit {
        id: "factory".to_string(),
        kind: UnitKind::Factory,
        file_name: "factory.rs".to_string(),
        code: factory::emit_factory(&ctx, &messages),
        exports: factory_exports,
    });

    let index = factory::emit_module_index(&ctx, &units);
    units.push(GeneratedUnit {
        id: "mod".to_string(),
        kind: UnitKind::Index,
        file_name: "mod.rs".to_string(),
        code: index,
        exports: Vec::new(),
    });

    for unit in &units {
        sink.accept(unit)?;
        report.generated.push(unit.file_name.clone());
    }

    info!(
        units = report.generated.len(),
        skipped = report.skipped.len(),
        failures = report.failures.len(),
        fingerprint = %ctx.fingerprint().short(),
        "Generated unified API"
    );

    Ok(report)
}
