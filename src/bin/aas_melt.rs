//! aas-melt: Flatten AAS environments into relational tables
//!
//! Usage:
//!   # Melt one environment, output tagged records to stdout
//!   aas-melt pump.json
//!
//!   # Melt several environments into one .jsonl file per table
//!   aas-melt --output-dir ./tables pump.json valve.json
//!
//!   # Also copy thumbnails and File element targets found below ./package
//!   aas-melt --output-dir ./tables --files-from ./package pump.json

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use aas_melt::files::{copy_environment_files, AuxOutcome};
use aas_melt::melt::{AasMelter, ConceptCache, JsonlSink, MeltConfig, RecordSink, StreamSink};
use aas_melt::model::Environment;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "aas-melt")]
#[command(about = "Flatten AAS environments into relational tables", long_about = None)]
struct Args {
    /// Environment JSON files, melted in order with one shared concept cache
    #[arg(value_name = "FILE", required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory for separate .jsonl files per table
    /// If omitted, writes to stdout as a single stream tagged with table names
    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,

    /// Directory holding thumbnails and supplementary files referenced by the environments
    #[arg(long, requires = "output_dir")]
    files_from: Option<PathBuf>,

    /// Shells whose idShort contains this text are excluded (default: "globalsecurity")
    #[arg(long)]
    exclusion_marker: Option<String>,

    /// Don't warn when a value is stored in a different family than declared
    #[arg(long)]
    no_fallback_warnings: bool,

    /// Keep empty list attributes as "[]" instead of leaving them unset
    #[arg(long)]
    keep_empty_lists: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Build config
    let mut config = MeltConfig::default();
    if let Some(marker) = args.exclusion_marker.clone() {
        config.exclusion_marker = marker;
    }
    if args.no_fallback_warnings {
        config.warn_on_fallback = false;
    }
    if args.keep_empty_lists {
        config.skip_empty_lists = false;
    }

    let melter = AasMelter::new(config);
    let mut cache = ConceptCache::new();

    let mut sink: Box<dyn RecordSink> = match &args.output_dir {
        Some(dir) => Box::new(JsonlSink::new(dir)?),
        None => Box::new(StreamSink::new(std::io::stdout().lock())),
    };

    let mut loaded = 0usize;
    for input in &args.inputs {
        match process_file(input, &melter, &mut cache, sink.as_mut(), &args) {
            Ok(records) => {
                loaded += 1;
                tracing::info!(file = %input.display(), records, "loaded environment");
            }
            Err(err) => {
                tracing::error!(file = %input.display(), "failed to load environment: {:#}", err);
            }
        }
    }

    tracing::info!(
        loaded,
        total = args.inputs.len(),
        concept_descriptions = cache.len(),
        "done"
    );

    if loaded == 0 {
        bail!("no environment could be loaded");
    }
    Ok(())
}

/// Parse, melt and commit one environment file
fn process_file(
    input: &Path,
    melter: &AasMelter,
    cache: &mut ConceptCache,
    sink: &mut dyn RecordSink,
    args: &Args,
) -> Result<usize> {
    let env = read_environment(input)?;
    let source = input.to_string_lossy();
    let batch = melter.melt_source(Some(source.as_ref()), &env, cache)?;

    if let Err(err) = batch.persist(sink) {
        cache.forget(&batch);
        return Err(err).context("Failed to commit records");
    }

    if let (Some(files_from), Some(output_dir)) = (&args.files_from, &args.output_dir) {
        copy_files(&env, files_from, &output_dir.join("files"));
    }

    Ok(batch.len())
}

/// Read an environment file using SIMD-accelerated JSON parsing
fn read_environment(input: &Path) -> Result<Environment> {
    let mut content = std::fs::read(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let env: Option<Environment> = simd_json::serde::from_slice(&mut content)
        .with_context(|| format!("Failed to parse environment in {}", input.display()))?;
    Ok(env.unwrap_or_default())
}

fn copy_files(env: &Environment, source_root: &Path, target_root: &Path) {
    let outcomes = copy_environment_files(env, source_root, target_root);
    let copied = outcomes
        .iter()
        .filter(|(_, outcome)| matches!(outcome, AuxOutcome::Copied(_)))
        .count();
    let failed = outcomes
        .iter()
        .filter(|(_, outcome)| matches!(outcome, AuxOutcome::Failed(_)))
        .count();
    tracing::info!(
        copied,
        skipped = outcomes.len() - copied - failed,
        failed,
        "auxiliary files"
    );
}
