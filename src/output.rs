//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Resolve
//!
//! ```text
//! static/img/dawn.jpg
//!     image/webp: /generated/dawn.1a2b3c4/400.webp 400w,/generated/dawn.1a2b3c4/800.webp 800w
//!     default: /generated/dawn.1a2b3c4/400.jpg 400w,/generated/dawn.1a2b3c4/800.jpg 800w
//!     src: /generated/dawn.1a2b3c4/800.jpg
//! ```
//!
//! An image without variants prints `no variants, using original`.
//!
//! ## Plan
//!
//! ```text
//! 2 source images
//! + dawn.1a2b3c4/400.jpg
//! + dawn.1a2b3c4/400.webp
//! - dawn.0000000/400.jpg
//! 2 to create, 1 to delete
//! ```
//!
//! ## Generate
//!
//! ```text
//! dawn.1a2b3c4/400.webp (400x300)
//! FAILED dawn.1a2b3c4/600.jpg: Failed to decode ...
//! Created 1 variant, deleted 1 stale file
//! 1 job failed:
//!     dawn.1a2b3c4/600.jpg: Failed to decode ...
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::catalog::{Variant, VariantCatalog};
use crate::generator::{GenerationEvent, GenerationReport, JobFailure};
use crate::reconcile::Reconciliation;
use crate::resolver::ResolveError;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `path` relative to `root` when possible, for shorter lines.
fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{} {}", n, if n == 1 { one } else { many })
}

// ============================================================================
// Resolve
// ============================================================================

/// Format one resolution: the `<source>` sets in `<picture>` order, then
/// the `<img src>` fallback.
pub fn format_resolution(
    source: &Path,
    result: &Result<Arc<VariantCatalog>, ResolveError>,
) -> Vec<String> {
    let mut lines = vec![source.display().to_string()];
    match result {
        Err(e) => lines.push(format!("{}error: {}", indent(1), e)),
        Ok(catalog) if catalog.is_empty() => {
            lines.push(format!("{}no variants, using original", indent(1)));
        }
        Ok(catalog) => {
            for set in catalog.source_sets() {
                let label = if set.mime.is_empty() { "default" } else { set.mime.as_str() };
                lines.push(format!("{}{}: {}", indent(1), label, set.srcset()));
            }
            if let Some(largest) = catalog.largest_default() {
                lines.push(format!("{}src: {}", indent(1), largest.url));
            }
        }
    }
    lines
}

pub fn print_resolution(source: &Path, result: &Result<Arc<VariantCatalog>, ResolveError>) {
    for line in format_resolution(source, result) {
        println!("{}", line);
    }
}

/// JSON shape of one resolution for `resolve --json`.
#[derive(Debug, Serialize)]
pub struct ResolutionRecord<'a> {
    pub source: String,
    pub variants: &'a [Variant],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a> ResolutionRecord<'a> {
    pub fn new(source: &Path, result: &'a Result<Arc<VariantCatalog>, ResolveError>) -> Self {
        match result {
            Ok(catalog) => Self {
                source: source.display().to_string(),
                variants: catalog.variants(),
                error: None,
            },
            Err(e) => Self {
                source: source.display().to_string(),
                variants: &[],
                error: Some(e.to_string()),
            },
        }
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Format a reconciliation: one `+`/`-` line per file, then totals.
pub fn format_plan(source_count: usize, plan: &Reconciliation, output_dir: &Path) -> Vec<String> {
    let mut lines = vec![plural(source_count, "source image", "source images")];
    for job in &plan.to_create {
        lines.push(format!("+ {}", display_relative(&job.output, output_dir)));
    }
    for path in &plan.to_delete {
        lines.push(format!("- {}", display_relative(path, output_dir)));
    }
    if plan.is_empty() {
        lines.push("Up to date".to_string());
    } else {
        lines.push(format!(
            "{} to create, {} to delete",
            plan.to_create.len(),
            plan.to_delete.len()
        ));
    }
    lines
}

pub fn print_plan(source_count: usize, plan: &Reconciliation, output_dir: &Path) {
    for line in format_plan(source_count, plan, output_dir) {
        println!("{}", line);
    }
}

// ============================================================================
// Generate
// ============================================================================

fn failure_line(failure: &JobFailure, output_dir: &Path) -> String {
    format!(
        "{}: {}",
        display_relative(&failure.job.output, output_dir),
        failure.message
    )
}

/// Format a single generation progress event.
pub fn format_generation_event(event: &GenerationEvent, output_dir: &Path) -> Vec<String> {
    match event {
        GenerationEvent::Created { job, dimensions } => vec![format!(
            "{} ({}x{})",
            display_relative(&job.output, output_dir),
            dimensions.width,
            dimensions.height
        )],
        GenerationEvent::Failed(failure) => {
            vec![format!("FAILED {}", failure_line(failure, output_dir))]
        }
    }
}

/// Format the end-of-run summary, listing every failed job.
pub fn format_report(report: &GenerationReport, output_dir: &Path) -> Vec<String> {
    let mut lines = vec![format!(
        "Created {}, deleted {}",
        plural(report.created, "variant", "variants"),
        plural(report.deleted, "stale file", "stale files")
    )];
    if report.has_failures() {
        lines.push(format!(
            "{} failed:",
            plural(report.failures.len(), "job", "jobs")
        ));
        for failure in &report.failures {
            lines.push(format!("{}{}", indent(1), failure_line(failure, output_dir)));
        }
    }
    lines
}

pub fn print_report(report: &GenerationReport, output_dir: &Path) {
    for line in format_report(report, output_dir) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DirEntry, parse_listing};
    use crate::imaging::{Dimensions, OutputFormat};
    use crate::reconcile::GenerationJob;
    use crate::source::ListingError;
    use std::path::PathBuf;

    fn catalog(names: &[&str]) -> Arc<VariantCatalog> {
        let entries: Vec<DirEntry> = names.iter().map(|n| DirEntry::file(*n)).collect();
        Arc::new(VariantCatalog::new(parse_listing(&entries, "/g/dawn.1a2b3c4", 2400)))
    }

    fn job(output: &str) -> GenerationJob {
        GenerationJob {
            source: PathBuf::from("static/dawn.jpg"),
            width: 400,
            output: PathBuf::from(output),
            format: OutputFormat::Jpeg,
        }
    }

    #[test]
    fn resolution_lists_typed_sets_first() {
        let result = Ok(catalog(&["800.jpg", "400.jpg", "400.webp"]));
        let lines = format_resolution(Path::new("static/dawn.jpg"), &result);
        assert_eq!(
            lines,
            vec![
                "static/dawn.jpg",
                "    image/webp: /g/dawn.1a2b3c4/400.webp 400w",
                "    default: /g/dawn.1a2b3c4/400.jpg 400w,/g/dawn.1a2b3c4/800.jpg 800w",
                "    src: /g/dawn.1a2b3c4/800.jpg",
            ]
        );
    }

    #[test]
    fn empty_resolution_falls_back() {
        let lines = format_resolution(Path::new("a.jpg"), &Ok(catalog(&[])));
        assert_eq!(lines[1], "    no variants, using original");
    }

    #[test]
    fn failed_resolution_shows_error() {
        let result = Err(ResolveError::Listing(ListingError::Local {
            path: PathBuf::from("gen/a.1234567"),
            message: "permission denied".into(),
        }));
        let lines = format_resolution(Path::new("a.jpg"), &result);
        assert!(lines[1].starts_with("    error: "));
        assert!(lines[1].contains("permission denied"));
    }

    #[test]
    fn resolution_record_serializes() {
        let result = Ok(catalog(&["400.webp"]));
        let record = ResolutionRecord::new(Path::new("a.jpg"), &result);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["source"], "a.jpg");
        assert_eq!(json["variants"][0]["mime"], "image/webp");
        assert_eq!(json["variants"][0]["size"], 400);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn plan_shows_relative_paths_and_totals() {
        let plan = Reconciliation {
            to_create: vec![job("out/dawn.1a2b3c4/400.jpg")],
            to_delete: vec![PathBuf::from("out/dawn.0000000/400.jpg")],
        };
        let lines = format_plan(1, &plan, Path::new("out"));
        assert_eq!(
            lines,
            vec![
                "1 source image",
                "+ dawn.1a2b3c4/400.jpg",
                "- dawn.0000000/400.jpg",
                "1 to create, 1 to delete",
            ]
        );
    }

    #[test]
    fn empty_plan_is_up_to_date() {
        let lines = format_plan(3, &Reconciliation::default(), Path::new("out"));
        assert_eq!(lines, vec!["3 source images", "Up to date"]);
    }

    #[test]
    fn created_event_shows_dimensions() {
        let event = GenerationEvent::Created {
            job: job("out/dawn.1a2b3c4/400.webp"),
            dimensions: Dimensions {
                width: 400,
                height: 300,
            },
        };
        assert_eq!(
            format_generation_event(&event, Path::new("out")),
            vec!["dawn.1a2b3c4/400.webp (400x300)"]
        );
    }

    #[test]
    fn report_lists_failures() {
        let report = GenerationReport {
            created: 3,
            failures: vec![JobFailure {
                job: job("out/dawn.1a2b3c4/600.jpg"),
                message: "decode error".into(),
            }],
            deleted: 1,
        };
        assert_eq!(
            format_report(&report, Path::new("out")),
            vec![
                "Created 3 variants, deleted 1 stale file",
                "1 job failed:",
                "    dawn.1a2b3c4/600.jpg: decode error",
            ]
        );
    }
}
