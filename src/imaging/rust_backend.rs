//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP) | `image` crate (pure Rust decoders) |
//! | Identify | `image::image_dimensions` (header only, no full decode) |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (lossy, quality-driven) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{OutputFormat, ResizeParams};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Source extensions this backend can decode.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Encode `img` in `format` and write it to `path`.
///
/// Encoding goes to a temporary file next to `path` that is renamed into
/// place only once fully flushed. On any failure nothing is left at `path`.
fn save_image(
    img: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    quality: u8,
) -> Result<(), BackendError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(BackendError::Io)?;
    let mut writer = BufWriter::new(tmp.as_file_mut());
    let encode_err = |e: image::ImageError| {
        BackendError::ProcessingFailed(format!("Failed to encode {}: {}", path.display(), e))
    };

    match format {
        // JPEG has no alpha channel
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality))
                .map_err(encode_err)?;
        }
        OutputFormat::Png => img
            .write_with_encoder(PngEncoder::new(&mut writer))
            .map_err(encode_err)?,
        // The lossless WebP encoder only accepts 8-bit RGB(A)
        OutputFormat::WebP => {
            let pixels = if img.color().has_alpha() {
                DynamicImage::ImageRgba8(img.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            };
            pixels
                .write_with_encoder(WebPEncoder::new_lossless(&mut writer))
                .map_err(encode_err)?;
        }
    }

    writer.flush().map_err(BackendError::Io)?;
    drop(writer);
    tmp.persist(path).map_err(|e| BackendError::Io(e.error))?;
    Ok(())
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!(
                "Failed to read dimensions of {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let resized = img.resize_exact(params.width, params.height, FilterType::Lanczos3);
        let quality = params.quality.value().min(100) as u8;
        save_image(&resized, &params.output, params.format, quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::Quality;
    use image::{ImageEncoder, RgbImage, RgbaImage};

    /// Create a small valid JPEG file with the given dimensions.
    fn create_test_jpeg(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let file = std::fs::File::create(path).unwrap();
        let writer = BufWriter::new(file);
        JpegEncoder::new(writer)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
    }

    fn create_test_png_with_alpha(path: &Path, width: u32, height: u32) {
        let img = RgbaImage::from_fn(width, height, |x, _| {
            image::Rgba([255, 0, 0, (x % 256) as u8])
        });
        img.save(path).unwrap();
    }

    fn params(source: &Path, output: &Path, w: u32, h: u32, format: OutputFormat) -> ResizeParams {
        ResizeParams {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            width: w,
            height: h,
            format,
            quality: Quality::new(85),
        }
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let dims = RustBackend::new().identify(&path).unwrap();
        assert_eq!(
            dims,
            Dimensions {
                width: 200,
                height: 150
            }
        );
    }

    #[test]
    fn identify_nonexistent_file_errors() {
        let result = RustBackend::new().identify(Path::new("/nonexistent/image.jpg"));
        assert!(result.is_err());
    }

    #[test]
    fn resize_jpeg_to_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 400, 300);
        let output = tmp.path().join("200.jpg");

        let backend = RustBackend::new();
        backend
            .resize(&params(&source, &output, 200, 150, OutputFormat::Jpeg))
            .unwrap();

        assert_eq!(

            backend.identify(&output).unwrap(),

            Dimensions {

                width: 200,

                height: 150

            }

        );
    }

    #[test]
    fn resize_jpeg_to_webp() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 400, 300);
        let output = tmp.path().join("200.webp");

        let backend = RustBackend::new();
        backend
            .resize(&params(&source, &output, 200, 150, OutputFormat::WebP))
            .unwrap();

        assert!(std::fs::metadata(&output).unwrap().len() > 0);
        assert_eq!(backend.identify(&output).unwrap().width, 200);
    }

    #[test]
    fn resize_png_with_alpha_to_jpeg_and_webp() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.png");
        create_test_png_with_alpha(&source, 120, 80);

        let backend = RustBackend::new();
        for (name, format) in [("60.jpg", OutputFormat::Jpeg), ("60.webp", OutputFormat::WebP)] {
            let output = tmp.path().join(name);
            backend
                .resize(&params(&source, &output, 60, 40, format))
                .unwrap();
            assert!(output.exists());
        }
    }

    #[test]
    fn resize_missing_source_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("out.jpg");
        let result = RustBackend::new().resize(&params(
            Path::new("/nonexistent/source.jpg"),
            &output,
            10,
            10,
            OutputFormat::Jpeg,
        ));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    #[test]
    fn failed_encode_leaves_no_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("tall.png");
        RgbImage::from_pixel(2, 20000, image::Rgb([10, 20, 30]))
            .save(&source)
            .unwrap();
        let output = tmp.path().join("2.webp");

        // Lossless WebP caps each side at 16384 pixels
        let result =
            RustBackend::new().resize(&params(&source, &output, 2, 20000, OutputFormat::WebP));

        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
        assert!(!output.exists());
        let left: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(left, vec![std::ffi::OsString::from("tall.png")]);
    }

    #[test]
    fn successful_encode_leaves_only_the_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 40, 30);
        let out_dir = tmp.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();
        let output = out_dir.join("20.png");

        RustBackend::new()
            .resize(&params(&source, &output, 20, 15, OutputFormat::Png))
            .unwrap();

        let left: Vec<_> = std::fs::read_dir(&out_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(left, vec![output]);
    }

    #[test]
    fn resize_corrupt_source_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("broken.jpg");
        std::fs::write(&source, b"not an image").unwrap();
        let output = tmp.path().join("out.jpg");

        let result =
            RustBackend::new().resize(&params(&source, &output, 10, 10, OutputFormat::Jpeg));
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
    }
}
