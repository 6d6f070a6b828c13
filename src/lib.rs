//! Schema Weave
//!
//! Merges N versions of a protobuf schema into one version-agnostic API and
//! generates Rust wrappers that read and write every version through it.
//!
//! ## Features
//!
//! - **Field Alignment**: fields matched by wire number, with explicit
//!   name/number mappings for renumbered fields
//! - **Conflict Classification**: every type difference gets one of nine
//!   conflict types and a fixed handling strategy
//! - **Enum Unification**: member union with per-version availability;
//!   equivalent enums collapse into one
//! - **Code Generation**: unified traits, shared getters, per-version
//!   builders and a version-dispatch factory
//! - **Schema Diff**: pairwise comparison of two versions with a
//!   breaking-change policy and renumbered-field suggestions
//! - **Runtime**: typed conversion errors, range-checked narrowing and a
//!   dynamic interpreter over untyped payloads
//!
//! ## Architecture
//!
//! ```text
//! VersionSchema (v1 .. vN)
//!   └─ merge::SchemaMerger ──> MergedSchema + Diagnostics
//!        └─ plan::SchemaPlan (handler table: ReadOp/WriteOp per version)
//!             ├─ codegen::generate ──> OutputSink (one unit per message/enum)
//!             └─ runtime::DynamicFactory (same plan, untyped payloads)
//! ```

pub mod checksum;
pub mod codegen;
pub mod compatibility;
pub mod config;
pub mod diagnostics;
pub mod diff;
pub mod error;
pub mod merge;
pub mod merged;
pub mod plan;
pub mod runtime;
pub mod schema;
pub mod version;

pub use checksum::Fingerprint;
pub use codegen::{generate, GeneratedUnit, GenerationReport, MemorySink, OutputSink};
pub use compatibility::CompatibilityReport;
pub use config::{FieldMapping, GeneratorConfig};
pub use diagnostics::{DiagnosticCode, Diagnostics, Severity};
pub use diff::{SchemaDiff, SchemaDiffer};
pub use error::{Result, SchemaError};
pub use merge::{MergeOutcome, SchemaMerger};
pub use merged::{ConflictType, Handling, MergedSchema};
pub use plan::SchemaPlan;
pub use schema::{VersionSchema, WellKnownType};
pub use version::{VersionId, VersionSet};
