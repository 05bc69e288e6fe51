//! # geoharvest-render
//!
//! Derived images for a geoharvest acquisition tree.
//!
//! - [`PreviewRenderer`] turns the red, green and blue band rasters of a scene
//!   directory into a contrast-stretched `preview.jpg`.
//! - [`GalleryBuilder`] collects every previewable image of the tree into one
//!   flat directory of downsized JPEGs for review and classification.
//!
//! Both skip outputs that already exist unless configured with
//! [`ArtifactPolicy::Overwrite`](geoharvest_common::ArtifactPolicy).
//!
//! ## Examples
//!
//! ```no_run
//! use geoharvest_render::{GalleryBuilder, PreviewOutcome, PreviewRenderer};
//! use std::path::Path;
//!
//! let renderer = PreviewRenderer::new().with_gamma(0.8);
//! match renderer.render(Path::new("data_tiles/S2B_MSIL2A_20240310"))? {
//!     PreviewOutcome::Rendered(path) => println!("wrote {}", path.display()),
//!     PreviewOutcome::AlreadyPresent(_) => {}
//!     PreviewOutcome::MissingBands(bands) => println!("waiting for {:?}", bands),
//! }
//!
//! let report = GalleryBuilder::new("data_tiles", "preview_tiles").build()?;
//! println!("{}", report.summary());
//! # Ok::<(), geoharvest_render::RenderError>(())
//! ```

mod error;
pub mod gallery;
mod jpeg;
pub mod preview;
pub mod raster;
pub mod stretch;

pub use error::RenderError;
pub use gallery::{fit_within, gallery_name, GalleryBuilder};
pub use jpeg::write_jpeg;
pub use preview::{PreviewOutcome, PreviewRenderer, PREVIEW_BANDS, PREVIEW_FILE_NAME};
pub use raster::Band;
pub use stretch::StretchParams;

/// Result type for render operations.
pub type Result<T> = std::result::Result<T, RenderError>;
