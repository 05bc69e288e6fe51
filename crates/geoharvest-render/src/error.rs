//! Error types for the render crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while deriving images.
#[derive(Debug, Error)]
pub enum RenderError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Image decoding or encoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Directory traversal error.
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// The preview bands do not share the same raster size.
    #[error("Band {band} is {found:?}, expected {expected:?}")]
    DimensionMismatch {
        /// Offending band.
        band: String,
        /// Size of the first band.
        expected: (u32, u32),
        /// Size of the offending band.
        found: (u32, u32),
    },

    /// A raster has a sample layout that cannot be used here.
    #[error("Unsupported raster layout in {path}: {message}")]
    UnsupportedLayout {
        /// Raster path.
        path: PathBuf,
        /// What was found.
        message: String,
    },
}
