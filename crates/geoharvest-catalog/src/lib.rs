//! # geoharvest-catalog
//!
//! Resolves what to download for each geoharvest source:
//!
//! - [`srtm`]: the integer-degree SRTM tile grid covering a bounding box
//! - [`stac`]: STAC scene search with per-asset signing
//! - [`nicfi`]: Planet NICFI monthly mosaic quads
//!
//! Nothing here writes to disk. Each source turns a bounding box into
//! `(identifier, url)` pairs that the orchestrator hands to a
//! `geoharvest_fetch::Fetch` implementation.
//!
//! ## Examples
//!
//! ```rust
//! use geoharvest_catalog::{nicfi_mosaic_name, tiles_for_bbox};
//! use geoharvest_common::BoundingBox;
//!
//! let bbox = BoundingBox::new(-41.65, -12.80, -40.95, -12.10).unwrap();
//! let tiles = tiles_for_bbox(&bbox);
//! assert_eq!(tiles[0].id(), "13S042W.hgt.zip");
//!
//! assert_eq!(nicfi_mosaic_name(2024, 3), "nicfi_monthly_2024_03_mosaic");
//! ```

mod error;
pub mod nicfi;
pub mod srtm;
pub mod stac;

pub use error::CatalogError;
pub use nicfi::{nicfi_mosaic_name, MosaicQuad, MosaicSource, PlanetBasemaps};
pub use srtm::{tiles_for_bbox, SrtmSource, SrtmTile};
pub use stac::{Scene, SceneCatalog, SceneQuery, StacCatalog, StacClient};

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
