//! mdc-scan - find duplicate media files by partial content signature
//!
//! Walks the given files and directories, computes the head/tail signature of every
//! file and reports groups of files whose signatures match. Unreadable files are
//! reported and skipped.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mdc_cache::{compute_signature, ContentSignature, FileSource};
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Command-line arguments for mdc-scan
#[derive(Parser, Debug)]
#[command(name = "mdc-scan")]
#[command(about = "Find duplicate media files by partial content signature")]
#[command(version)]
struct Args {
    /// Files or directories to scan
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Config file (overrides MDC_CONFIG and the default location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Log level (overrides the config file)
    #[arg(long, env = "MDC_LOG_LEVEL")]
    log_level: Option<String>,
}

/// Files sharing one content signature
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct DuplicateGroup {
    partial_hash: String,
    file_size: u64,
    files: Vec<PathBuf>,
}

/// Scan results
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanReport {
    scanned: usize,
    groups: Vec<DuplicateGroup>,
    skipped: Vec<SkippedFile>,
}

#[derive(Debug, Serialize)]
struct SkippedFile {
    path: PathBuf,
    error: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, config_source) =
        mdc_common::config::load_config_with_source(args.config.as_deref())
            .context("Failed to load configuration")?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    mdc_common::logging::init_tracing(&config.logging).context("Failed to initialize logging")?;

    info!("Starting mdc-scan {}", env!("CARGO_PKG_VERSION"));
    config_source.log();

    let files = collect_files(&args.paths);
    info!(files = files.len(), "Computing signatures");

    let mut signatures = Vec::with_capacity(files.len());
    let mut skipped = Vec::new();
    for path in files {
        match compute_signature(&FileSource::new(&path)).await {
            Ok(signature) => {
                debug!(path = %path.display(), hash = %signature.partial_hash, "Signed");
                signatures.push((path, signature));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                skipped.push(SkippedFile {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }

    let report = ScanReport {
        scanned: signatures.len(),
        groups: group_duplicates(signatures),
        skipped,
    };
    info!(
        scanned = report.scanned,
        groups = report.groups.len(),
        skipped = report.skipped.len(),
        "Scan complete"
    );

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        print_text(&report);
    }

    Ok(())
}

/// Expand directories into the regular files below them
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in paths {
        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(e) => warn!(root = %root.display(), error = %e, "Failed to walk path"),
            }
        }
    }
    files
}

/// Group files whose signatures match (same partial hash and size)
///
/// Only groups with two or more files are returned, ordered by hash.
fn group_duplicates(signatures: Vec<(PathBuf, ContentSignature)>) -> Vec<DuplicateGroup> {
    let mut by_signature: BTreeMap<(String, u64), Vec<PathBuf>> = BTreeMap::new();
    for (path, signature) in signatures {
        by_signature
            .entry((signature.partial_hash, signature.file_size))
            .or_default()
            .push(path);
    }

    by_signature
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .map(|((partial_hash, file_size), files)| DuplicateGroup {
            partial_hash,
            file_size,
            files,
        })
        .collect()
}

fn print_text(report: &ScanReport) {
    if report.groups.is_empty() {
        println!("No duplicates among {} file(s)", report.scanned);
    }
    for group in &report.groups {
        println!(
            "{} ({} bytes, {} files)",
            short_hash(&group.partial_hash),
            group.file_size,
            group.files.len()
        );
        for file in &group.files {
            println!("  {}", file.display());
        }
    }
    for skipped in &report.skipped {
        println!("skipped {}: {}", skipped.path.display(), skipped.error);
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
