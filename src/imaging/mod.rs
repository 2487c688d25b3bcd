//! Image processing: pure Rust, via the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Resize** | Lanczos3 via `DynamicImage::resize_exact` |
//! | **Encode** | JPEG / PNG / lossless WebP encoders from `image::codecs` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::calculate_resize_dimensions;
pub use operations::{create_variant, get_dimensions};
pub use params::{OutputFormat, Quality, ResizeParams};
pub use rust_backend::{RustBackend, SUPPORTED_EXTENSIONS};
