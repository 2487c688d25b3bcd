//! Breakpoint planning.
//!
//! Every source image gets a ladder of target widths:
//!
//! ```text
//! natural 1000, base 400, interval 200  →  400, 600, 800, 1000
//! natural  450                          →  400, 450
//! natural  300                          →  300
//! ```
//!
//! The natural width is always the last rung, so the full-resolution image
//! is always available and nothing is ever upscaled. Widths above the
//! configured ceiling (`max_width × max_density`) are never planned; a
//! source wider than the ceiling tops out at the ceiling itself.
//!
//! [`plan_sources`] runs the ladder over every source image found below the
//! static directory, in parallel.

use crate::config::Config;
use crate::hashing::{HashError, VariantDirKey};
use crate::imaging::{ImageBackend, SUPPORTED_EXTENSIONS, get_dimensions};
use crate::source::VariantLayout;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("failed to walk source tree: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{} source image(s) could not be planned", .0.len())]
    Sources(Vec<SourceFailure>),
}

/// A source image that could not be hashed or identified.
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Ascending target widths for an image `natural` pixels wide.
///
/// `base`, `base + interval`, … while strictly below `natural`, then
/// `natural` itself. A zero `interval` yields at most `base` and `natural`.
///
/// ```
/// # use picture_gen::planner::plan_breakpoints;
/// assert_eq!(plan_breakpoints(1000, 400, 200), vec![400, 600, 800, 1000]);
/// assert_eq!(plan_breakpoints(300, 400, 200), vec![300]);
/// ```
pub fn plan_breakpoints(natural: u32, base: u32, interval: u32) -> Vec<u32> {
    let mut widths = Vec::new();
    let mut width = base;
    while width < natural {
        widths.push(width);
        match width.checked_add(interval) {
            Some(next) if interval > 0 => width = next,
            _ => break,
        }
    }
    if natural > 0 {
        widths.push(natural);
    }
    widths
}

/// Breakpoint ladder settings plus the width ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointPlanner {
    pub base: u32,
    pub interval: u32,
    pub ceiling: u32,
}

impl BreakpointPlanner {
    pub fn new(base: u32, interval: u32, ceiling: u32) -> Self {
        Self {
            base,
            interval,
            ceiling,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let ceiling = u32::try_from(config.max_size()).unwrap_or(u32::MAX);
        Self::new(config.breakpoints.base, config.breakpoints.interval, ceiling)
    }

    /// Ladder for a source `natural` pixels wide.
    ///
    /// A source wider than the ceiling is planned as if it were exactly
    /// `ceiling` wide, so the ceiling itself becomes the last target even
    /// when it falls between two rungs (base 400, interval 200, ceiling
    /// 2500 ends `..., 2400, 2500`). Stopping at the last rung instead
    /// would leave the widest allowed variant ungenerated.
    pub fn plan(&self, natural: u32) -> Vec<u32> {
        plan_breakpoints(natural.min(self.ceiling), self.base, self.interval)
    }
}

/// A source image with its key and planned widths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSource {
    pub source: PathBuf,
    pub key: VariantDirKey,
    pub width: u32,
    pub height: u32,
    pub breakpoints: Vec<u32>,
}

/// Whether `path` has an extension the imaging backend can decode.
pub fn is_source_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// Every source image below the static directory, sorted by path.
///
/// The generated output tree is skipped even when it lives inside the
/// static directory.
pub fn find_sources(layout: &VariantLayout) -> Result<Vec<PathBuf>, PlanError> {
    let mut sources = Vec::new();
    let walker = WalkDir::new(&layout.static_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !layout.is_generated(entry.path()));

    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && is_source_image(entry.path()) {
            sources.push(entry.into_path());
        }
    }
    Ok(sources)
}

/// Hash, identify and plan every source in parallel.
///
/// All failures are collected; if any source fails, the whole plan fails,
/// since its variants would otherwise be reconciled away as stale.
pub fn plan_sources(
    backend: &impl ImageBackend,
    planner: &BreakpointPlanner,
    sources: &[PathBuf],
) -> Result<Vec<PlannedSource>, PlanError> {
    let results: Vec<Result<PlannedSource, SourceFailure>> = sources
        .par_iter()
        .map(|source| plan_one(backend, planner, source))
        .collect();

    let mut planned = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(p) => planned.push(p),
            Err(f) => failures.push(f),
        }
    }

    if failures.is_empty() {
        Ok(planned)
    } else {
        Err(PlanError::Sources(failures))
    }
}

fn plan_one(
    backend: &impl ImageBackend,
    planner: &BreakpointPlanner,
    source: &Path,
) -> Result<PlannedSource, SourceFailure> {
    let failure = |message: String| SourceFailure {
        path: source.to_path_buf(),
        message,
    };

    let key = VariantDirKey::for_source(source).map_err(|e: HashError| failure(e.to_string()))?;
    let (width, height) = get_dimensions(backend, source).map_err(|e| failure(e.to_string()))?;

    Ok(PlannedSource {
        source: source.to_path_buf(),
        key,
        width,
        height,
        breakpoints: planner.plan(width),
    })
}
