//! Variant generation and stale-file cleanup.
//!
//! [`VariantGenerator`] owns a dedicated rayon pool, sized from
//! `[processing] max_processes` and never larger than the CPU count. Each
//! job is handled by exactly one worker; a failing job is recorded and its
//! siblings carry on. Nothing is rolled back.
//!
//! Progress is reported over an optional `mpsc` channel so the CLI can
//! print lines as jobs finish while the pool is still busy.

use crate::imaging::{Dimensions, ImageBackend, Quality, create_variant};
use crate::reconcile::GenerationJob;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("failed to delete {path}: {source}")]
    Delete { path: PathBuf, source: io::Error },
}

/// A job that could not be completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub job: GenerationJob,
    pub message: String,
}

/// Progress events emitted while jobs run.
#[derive(Debug, Clone)]
pub enum GenerationEvent {
    Created {
        job: GenerationJob,
        dimensions: Dimensions,
    },
    Failed(JobFailure),
}

/// Outcome of a generation run.
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    pub created: usize,
    /// Sorted by output path.
    pub failures: Vec<JobFailure>,
    pub deleted: usize,
}

impl GenerationReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

pub struct VariantGenerator {
    pool: rayon::ThreadPool,
    quality: Quality,
}

impl VariantGenerator {
    pub fn new(threads: usize, quality: Quality) -> Result<Self, GenerationError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("variant-worker-{i}"))
            .build()?;
        Ok(Self { pool, quality })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `op` inside the generator's pool, so any parallel iterators it
    /// uses share the same workers.
    pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        self.pool.install(op)
    }

    /// Generate every job. Never fails as a whole; see
    /// [`GenerationReport::failures`].
    pub fn run(
        &self,
        backend: &impl ImageBackend,
        jobs: &[GenerationJob],
        events: Option<Sender<GenerationEvent>>,
    ) -> GenerationReport {
        info!(jobs = jobs.len(), threads = self.threads(), "generating variants");
        let quality = self.quality;

        let results: Vec<Result<(), JobFailure>> = self.pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    let event = match create_variant(backend, job, quality) {
                        Ok(dimensions) => {
                            debug!(output = %job.output.display(), "created variant");
                            GenerationEvent::Created {
                                job: job.clone(),
                                dimensions,
                            }
                        }
                        Err(e) => {
                            warn!(output = %job.output.display(), error = %e, "variant failed");
                            GenerationEvent::Failed(JobFailure {
                                job: job.clone(),
                                message: e.to_string(),
                            })
                        }
                    };
                    let result = match &event {
                        GenerationEvent::Created { .. } => Ok(()),
                        GenerationEvent::Failed(failure) => Err(failure.clone()),
                    };
                    if let Some(tx) = &events {
                        // Receiver gone means nobody is printing; keep going
                        tx.send(event).ok();
                    }
                    result
                })
                .collect()
        });

        let mut report = GenerationReport::default();
        for result in results {
            match result {
                Ok(()) => report.created += 1,
                Err(failure) => report.failures.push(failure),
            }
        }
        report
            .failures
            .sort_by(|a, b| a.job.output.cmp(&b.job.output));
        report
    }
}

/// Delete stale files, then prune directories left empty.
///
/// Files are removed in order; the first failure stops the cleanup. A file
/// that is already gone counts as deleted. Directory pruning is best
/// effort, deepest first, and never touches `output_root` itself or
/// anything outside it.
pub fn delete_stale(output_root: &Path, paths: &[PathBuf]) -> Result<usize, GenerationError> {
    let mut deleted = 0;
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => deleted += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => deleted += 1,
            Err(source) => {
                return Err(GenerationError::Delete {
                    path: path.clone(),
                    source,
                });
            }
        }
    }

    prune_empty_dirs(output_root, paths);
    Ok(deleted)
}

fn prune_empty_dirs(output_root: &Path, deleted: &[PathBuf]) {
    let mut dirs = BTreeSet::new();
    for path in deleted {
        let mut dir = path.parent();
        while let Some(d) = dir {
            if d == output_root || !d.starts_with(output_root) {
                break;
            }
            dirs.insert(d.to_path_buf());
            dir = d.parent();
        }
    }

    let mut dirs: Vec<PathBuf> = dirs.into_iter().collect();
    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
    for dir in dirs {
        // Non-empty directories are expected to fail here
        if let Err(e) = std::fs::remove_dir(&dir) {
            debug!(dir = %dir.display(), error = %e, "kept directory");
        }
    }
}
