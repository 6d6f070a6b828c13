//! Schema Weave CLI
//!
//! Merges versioned schemas and generates the unified API, reports
//! cross-version conflicts, compares two versions for breaking changes, or
//! prints the merge fingerprint.
//!
//! `weave diff` exits with status 2 when a breaking change is found, and
//! with status 1 under `--strict` when only warnings are.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use schema_weave::{
    generate, CompatibilityReport, Fingerprint, GeneratedUnit, GeneratorConfig, MergeOutcome, OutputSink,
    SchemaDiffer, SchemaMerger, VersionSchema,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "weave")]
#[command(about = "Merge versioned protobuf schemas into one version-agnostic API")]
struct Cli {
    /// Configuration file (defaults: weave.toml, .weave.toml, config/weave.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct Inputs {
    /// Version schema JSON files or directories holding them
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Version order, oldest first (default: file name order)
    #[arg(long, value_delimiter = ',')]
    versions: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the unified API into a directory
    Generate {
        #[command(flatten)]
        inputs: Inputs,

        /// Output directory for generated units
        #[arg(short, long)]
        out: PathBuf,

        /// Abort at the first failing entity
        #[arg(long)]
        fail_fast: bool,

        /// Worker threads
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Report cross-version conflicts
    Report {
        #[command(flatten)]
        inputs: Inputs,

        #[arg(long, value_enum, default_value = "text")]
        format: ReportFormat,

        /// Exit with an error when the schema is not compatible
        #[arg(long)]
        strict: bool,
    },

    /// Compare two versions and report breaking changes
    Diff {
        /// Older version schema JSON file
        old: PathBuf,

        /// Newer version schema JSON file
        new: PathBuf,

        #[arg(long, value_enum, default_value = "text")]
        format: DiffFormat,

        /// Only list breaking changes and suspected renumbers (text format)
        #[arg(long)]
        breaking_only: bool,

        /// Also fail on warning-level breaking changes
        #[arg(long)]
        strict: bool,
    },

    /// Print the fingerprint of the merged schema
    Fingerprint {
        #[command(flatten)]
        inputs: Inputs,
    },

    /// Write the effective configuration to a TOML file
    Init {
        #[arg(default_value = "weave.toml")]
        path: PathBuf,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum DiffFormat {
    Text,
    Json,
    Markdown,
}

// =============================================================================
// Directory Sink
// =============================================================================

/// Writes each unit to `<root>/<file_name>`
struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    fn create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).with_context(|| format!("creating {}", root.display()))?;
        Ok(Self { root: root.to_path_buf() })
    }
}

impl OutputSink for DirectorySink {
    fn accept(&mut self, unit: &GeneratedUnit) -> schema_weave::Result<()> {
        let path = self.root.join(&unit.file_name);
        fs::write(&path, &unit.code).map_err(|e| schema_weave::SchemaError::Sink {
            unit: unit.file_name.clone(),
            reason: format!("{}: {}", path.display(), e),
        })?;
        debug!(file = %path.display(), "Wrote unit");
        Ok(())
    }
}

// =============================================================================
// Input Discovery
// =============================================================================

fn discover(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
                .collect();
            found.sort();
            files.extend(found);
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            bail!("input {} does not exist", input.display());
        }
    }
    if files.is_empty() {
        bail!("no schema files found");
    }
    Ok(files)
}

fn load_versions(inputs: &Inputs) -> Result<Vec<VersionSchema>> {
    let mut files = discover(&inputs.inputs)?;
    if inputs.versions.is_empty() {
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    }

    let mut schemas = Vec::with_capacity(files.len());
    for file in &files {
        let schema = VersionSchema::from_file(file).with_context(|| format!("loading {}", file.display()))?;
        debug!(file = %file.display(), version = %schema.version, "Loaded version schema");
        schemas.push(schema);
    }

    if inputs.versions.is_empty() {
        return Ok(schemas);
    }

    let mut ordered = Vec::with_capacity(inputs.versions.len());
    for version in &inputs.versions {
        let index = schemas
            .iter()
            .position(|s| s.version.as_str() == version)
            .with_context(|| format!("no schema file declares version {}", version))?;
        ordered.push(schemas.swap_remove(index));
    }
    if !schemas.is_empty() {
        let extra: Vec<&str> = schemas.iter().map(|s| s.version.as_str()).collect();
        bail!("versions not listed in --versions: {}", extra.join(", "));
    }
    Ok(ordered)
}

fn merge(config: &GeneratorConfig, inputs: &Inputs) -> Result<MergeOutcome> {
    let versions = load_versions(inputs)?;
    let merger = SchemaMerger::from_config(config)?;
    Ok(merger.merge(&versions)?)
}

// =============================================================================
// Commands
// =============================================================================

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = GeneratorConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Generate {
            inputs,
            out,
            fail_fast,
            jobs,
        } => {
            config.run.fail_fast |= fail_fast;
            if let Some(jobs) = jobs {
                config.run.jobs = jobs;
            }
            config.validate()?;

            let outcome = merge(&config, &inputs)?;
            for item in outcome.diagnostics.all() {
                eprintln!("{}", item);
            }

            let mut sink = DirectorySink::create(&out)?;
            let report = generate(&outcome, &config, &mut sink)?;

            println!("Generated {} files into {}", report.generated.len(), out.display());
            for entity in &report.skipped {
                println!("  skipped {} (error diagnostics)", entity);
            }
            for failure in &report.failures {
                println!("  failed {}: {}", failure.entity, failure.reason);
            }
            info!(fingerprint = %report.fingerprint, "Done");

            if !report.is_success() {
                bail!("{} entities failed to generate", report.failures.len());
            }
            Ok(())
        }

        Commands::Report { inputs, format, strict } => {
            let outcome = merge(&config, &inputs)?;
            let report = CompatibilityReport::from_outcome(&outcome);
            match format {
                ReportFormat::Text => print!("{}", report.to_text()),
                ReportFormat::Json => println!("{}", report.to_json()?),
            }
            if strict && !report.is_compatible {
                bail!("schema versions are not compatible");
            }
            Ok(())
        }

        Commands::Diff {
            old,
            new,
            format,
            breaking_only,
            strict,
        } => {
            let load = |path: &Path| {
                VersionSchema::from_file(path).with_context(|| format!("loading {}", path.display()))
            };
            let (old, new) = (load(old.as_path())?, load(new.as_path())?);
            let diff = SchemaDiffer::new().with_mappings(&config.mappings).compare(&old, &new);

            match format {
                DiffFormat::Text if breaking_only => print!("{}", diff.to_text_breaking_only()),
                DiffFormat::Text => print!("{}", diff.to_text()),
                DiffFormat::Json => println!("{}", diff.to_json()?),
                DiffFormat::Markdown => print!("{}", diff.to_markdown()),
            }

            if diff.is_breaking() {
                eprintln!("Breaking changes between {} and {}", diff.old_version, diff.new_version);
                std::process::exit(2);
            }
            if strict && !diff.breaking.is_empty() {
                eprintln!("Warnings between {} and {} (strict mode)", diff.old_version, diff.new_version);
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Fingerprint { inputs } => {
            let outcome = merge(&config, &inputs)?;
            let schema = Fingerprint::of_schema(&outcome.schema)?;
            let generation = Fingerprint::of_generation(&outcome.schema, &config)?;
            println!("schema     {}", schema);
            println!("generation {}", generation);
            Ok(())
        }

        Commands::Init { path, force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to replace it)", path.display());
            }
            config.validate()?;
            let target = path.to_str().context("configuration path is not valid UTF-8")?;
            config.save(target).with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}
