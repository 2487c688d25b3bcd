//! High-level image operations.
//!
//! These functions combine calculations with backend execution: they read
//! the source's natural size, work out the output dimensions and hand a
//! fully specified [`ResizeParams`] to the backend.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::calculate_resize_dimensions;
use super::params::{Quality, ResizeParams};
use crate::reconcile::GenerationJob;
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

/// Produce one variant file for `job`.
///
/// Creates the output's parent directory, then resizes the source to the
/// job's width (never upscaling) and encodes it in the job's format.
/// Returns the dimensions actually written.
pub fn create_variant(
    backend: &impl ImageBackend,
    job: &GenerationJob,
    quality: Quality,
) -> Result<Dimensions> {
    let original = get_dimensions(backend, &job.source)?;
    let (width, height) = calculate_resize_dimensions(original, job.width);
    if width == 0 {
        return Err(BackendError::ProcessingFailed(format!(
            "{} has zero width",
            job.source.display()
        )));
    }

    if let Some(parent) = job.output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    backend.resize(&ResizeParams {
        source: job.source.clone(),
        output: job.output.clone(),
        width,
        height,
        format: job.format,
        quality,
    })?;

    Ok(Dimensions { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::params::OutputFormat;
    use tempfile::TempDir;

    fn job(tmp: &TempDir, width: u32, name: &str, format: OutputFormat) -> GenerationJob {
        GenerationJob {
            source: tmp.path().join("dawn.jpg"),
            width,
            output: tmp.path().join("generated/dawn.1a2b3c4").join(name),
            format,
        }
    }

    #[test]
    fn get_dimensions_calls_backend() {
        let backend = MockBackend::with_dimensions(1920, 1080);
        let dims = get_dimensions(&backend, Path::new("/test.jpg")).unwrap();
        assert_eq!(dims, (1920, 1080));
    }

    #[test]
    fn create_variant_scales_height() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::with_dimensions(2000, 1500);

        let dims = create_variant(
            &backend,
            &job(&tmp, 400, "400.webp", OutputFormat::WebP),
            Quality::new(80),
        )
        .unwrap();
        assert_eq!(
            dims,
            Dimensions {
                width: 400,
                height: 300
            }
        );

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], RecordedOp::Identify(_)));
        assert!(matches!(
            &ops[1],
            RecordedOp::Resize {
                width: 400,
                height: 300,
                format: OutputFormat::WebP,
                quality: 80,
                ..
            }
        ));
    }

    #[test]
    fn create_variant_creates_parent_dir() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::with_dimensions(800, 600);

        create_variant(
            &backend,
            &job(&tmp, 400, "400.jpg", OutputFormat::Jpeg),
            Quality::default(),
        )
        .unwrap();

        assert!(tmp.path().join("generated/dawn.1a2b3c4").is_dir());
    }

    #[test]
    fn create_variant_at_native_width_keeps_size() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::with_dimensions(450, 300);

        let dims = create_variant(
            &backend,
            &job(&tmp, 450, "450.jpg", OutputFormat::Jpeg),
            Quality::default(),
        )
        .unwrap();
        assert_eq!(
            dims,
            Dimensions {
                width: 450,
                height: 300
            }
        );
    }

    #[test]
    fn create_variant_propagates_identify_failure() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::new();

        let result = create_variant(
            &backend,
            &job(&tmp, 400, "400.jpg", OutputFormat::Jpeg),
            Quality::default(),
        );
        assert!(result.is_err());
        assert_eq!(backend.resize_count(), 0);
    }

    #[test]
    fn create_variant_rejects_zero_width_source() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::with_dimensions(0, 0);

        let result = create_variant(
            &backend,
            &job(&tmp, 400, "400.jpg", OutputFormat::Jpeg),
            Quality::default(),
        );
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
    }
}
