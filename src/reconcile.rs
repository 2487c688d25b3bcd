//! Desired-vs-existing reconciliation of generated variants.
//!
//! The desired set is the cross product of every planned source, each of
//! its breakpoints, and each output format (the source's own format, plus
//! WebP when enabled). The existing set is every `<width>.<ext>` file in a
//! `<stem>.<hash>` directory directly below the output root, enumerated
//! once per run; anything else in the tree is never touched.
//! Reconciliation is a pure set difference on output paths:
//!
//! - `to_create` = desired jobs whose output does not exist yet
//! - `to_delete` = existing files nobody wants any more
//!
//! No content comparison happens: an edited source gets a new hash, hence a
//! new directory, and its old directory falls out as stale.

use crate::hashing::is_variant_dir_name;
use crate::imaging::OutputFormat;
use crate::planner::PlannedSource;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One resize + encode unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationJob {
    pub source: PathBuf,
    pub width: u32,
    pub output: PathBuf,
    pub format: OutputFormat,
}

/// The minimal create/delete changeset for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Sorted by output path.
    pub to_create: Vec<GenerationJob>,
    /// Sorted.
    pub to_delete: Vec<PathBuf>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }
}

/// Output formats for a source: its own, then WebP if enabled and different.
fn output_formats(source: &Path, webp: bool) -> Vec<(OutputFormat, String)> {
    let mut formats = Vec::with_capacity(2);
    if let Some(ext) = source.extension().and_then(|e| e.to_str()) {
        let ext = ext.to_ascii_lowercase();
        if let Some(format) = OutputFormat::from_extension(&ext) {
            formats.push((format, ext));
        }
    }
    if webp && !formats.iter().any(|(f, _)| *f == OutputFormat::WebP) {
        formats.push((OutputFormat::WebP, OutputFormat::WebP.extension().to_string()));
    }
    formats
}

/// Jobs for one planned source:
/// `<output_dir>/<stem>.<hash>/<width>.<ext>` for every width × format.
pub fn desired_jobs(planned: &PlannedSource, output_dir: &Path, webp: bool) -> Vec<GenerationJob> {
    let dir = output_dir.join(planned.key.as_str());
    let formats = output_formats(&planned.source, webp);

    planned
        .breakpoints
        .iter()
        .flat_map(|&width| {
            formats.iter().map({
                let dir = &dir;
                move |(format, ext)| GenerationJob {
                    source: planned.source.clone(),
                    width,
                    output: dir.join(format!("{}.{}", width, ext)),
                    format: *format,
                }
            })
        })
        .collect()
}

/// Jobs for every planned source.
pub fn desired_for_all(
    planned: &[PlannedSource],
    output_dir: &Path,
    webp: bool,
) -> Vec<GenerationJob> {
    planned
        .iter()
        .flat_map(|p| desired_jobs(p, output_dir, webp))
        .collect()
}

/// Whether `name` looks like a generated variant: `<width>.<ext>`.
fn is_variant_file_name(name: &str) -> bool {
    match name.split_once('.') {
        Some((width, ext)) => {
            !width.is_empty()
                && width.bytes().all(|b| b.is_ascii_digit())
                && !ext.is_empty()
                && ext.bytes().all(|b| b.is_ascii_alphanumeric())
        }
        None => false,
    }
}

/// Every generated variant currently below `output_dir`:
/// `<output_dir>/<stem>.<hash>/<width>.<ext>`. A missing directory is empty.
pub fn existing_outputs(output_dir: &Path) -> Result<BTreeSet<PathBuf>, walkdir::Error> {
    let mut existing = BTreeSet::new();
    if !output_dir.exists() {
        return Ok(existing);
    }
    let walker = WalkDir::new(output_dir)
        .follow_links(false)
        .max_depth(2)
        .into_iter()
        .filter_entry(|e| {
            e.depth() != 1 || is_variant_dir_name(&e.file_name().to_string_lossy())
        });
    for entry in walker {
        let entry = entry?;
        if entry.depth() == 2
            && entry.file_type().is_file()
            && is_variant_file_name(&entry.file_name().to_string_lossy())
        {
            existing.insert(entry.into_path());
        }
    }
    Ok(existing)
}

/// Diff desired jobs against existing files.
///
/// Jobs sharing an output path (identical sources at different paths) are
/// collapsed to the first.
pub fn reconcile(desired: Vec<GenerationJob>, existing: &BTreeSet<PathBuf>) -> Reconciliation {
    let mut by_output: BTreeMap<PathBuf, GenerationJob> = BTreeMap::new();
    for job in desired {
        by_output.entry(job.output.clone()).or_insert(job);
    }

    let to_delete = existing
        .iter()
        .filter(|path| !by_output.contains_key(*path))
        .cloned()
        .collect();
    let to_create = by_output
        .into_values()
        .filter(|job| !existing.contains(&job.output))
        .collect();

    Reconciliation {
        to_create,
        to_delete,
    }
}
