//! SRTM 1 arc-second tile grid.
//!
//! Tiles are 1x1 degree cells served from the public AWS bucket:
//! `https://srtm-pds.s3.amazonaws.com/SRTM1/{id}`
//!
//! ## Tile naming
//!
//! A cell is keyed by its integer latitude and longitude. The identifier is the
//! zero-padded magnitude followed by the hemisphere letter, latitude first:
//! - cell (-13, -42) → `13S042W.hgt.zip`
//! - cell (47, 8) → `47N008E.hgt.zip`
//!
//! The same identifier is the remote key suffix and the local file name.

use geoharvest_common::BoundingBox;
use std::fmt;

/// Public HTTPS endpoint of the SRTM bucket (anonymous reads).
pub const SRTM_BASE_URL: &str = "https://srtm-pds.s3.amazonaws.com";

/// Key prefix of the 1 arc-second product inside the bucket.
pub const SRTM_PREFIX: &str = "SRTM1";

/// Extension of every tile file.
const TILE_EXTENSION: &str = ".hgt.zip";

/// One integer-degree SRTM cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SrtmTile {
    /// Integer latitude of the cell.
    pub lat: i32,
    /// Integer longitude of the cell.
    pub lon: i32,
}

impl SrtmTile {
    /// Create a tile for an integer cell.
    pub fn new(lat: i32, lon: i32) -> Self {
        Self { lat, lon }
    }

    /// Hemisphere letter for the latitude (`N` for zero and above).
    pub fn ns(&self) -> char {
        if self.lat >= 0 {
            'N'
        } else {
            'S'
        }
    }

    /// Hemisphere letter for the longitude (`E` for zero and above).
    pub fn ew(&self) -> char {
        if self.lon >= 0 {
            'E'
        } else {
            'W'
        }
    }

    /// Identifier without extension, e.g. `13S042W`.
    pub fn stem(&self) -> String {
        format!(
            "{:02}{}{:03}{}",
            self.lat.unsigned_abs(),
            self.ns(),
            self.lon.unsigned_abs(),
            self.ew()
        )
    }

    /// Full identifier, e.g. `13S042W.hgt.zip`. Also the local file name.
    pub fn id(&self) -> String {
        format!("{}{}", self.stem(), TILE_EXTENSION)
    }

    /// Remote object key, e.g. `SRTM1/13S042W.hgt.zip`.
    pub fn remote_key(&self, prefix: &str) -> String {
        format!("{}/{}", prefix.trim_matches('/'), self.id())
    }

    /// Download URL under `base_url`.
    pub fn url(&self, base_url: &str, prefix: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.remote_key(prefix))
    }
}

impl fmt::Display for SrtmTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// Enumerate the cells covering a bounding box.
///
/// Latitudes run over `floor(south)..=ceil(north)` and longitudes over
/// `floor(west)..=ceil(east)`, both inclusive; the result is their Cartesian
/// product in latitude-major order.
///
/// Because `ceil` is inclusive, a box edge inside a cell also yields the
/// neighbouring cell past it: for the Chapada Diamantina box the two `040W`
/// cells lie east of the box. Those are best-effort fetches that usually
/// answer 404 and are recorded as failed items.
pub fn tiles_for_bbox(bbox: &BoundingBox) -> Vec<SrtmTile> {
    let lat_min = bbox.south().floor() as i32;
    let lat_max = bbox.north().ceil() as i32;
    let lon_min = bbox.west().floor() as i32;
    let lon_max = bbox.east().ceil() as i32;

    (lat_min..=lat_max)
        .flat_map(|lat| (lon_min..=lon_max).map(move |lon| SrtmTile::new(lat, lon)))
        .collect()
}

/// Where SRTM tiles are fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrtmSource {
    base_url: String,
    prefix: String,
}

impl Default for SrtmSource {
    fn default() -> Self {
        Self::new(SRTM_BASE_URL, SRTM_PREFIX)
    }
}

impl SrtmSource {
    /// Create a source for a bucket endpoint and key prefix.
    pub fn new(base_url: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            prefix: prefix.into(),
        }
    }

    /// Tiles covering `bbox`.
    pub fn tiles(&self, bbox: &BoundingBox) -> Vec<SrtmTile> {
        tiles_for_bbox(bbox)
    }

    /// Download URL of a tile.
    pub fn url_for(&self, tile: &SrtmTile) -> String {
        tile.url(&self.base_url, &self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_id_format() {
        assert_eq!(SrtmTile::new(-13, -42).id(), "13S042W.hgt.zip");
        assert_eq!(SrtmTile::new(-12, -41).id(), "12S041W.hgt.zip");
        assert_eq!(SrtmTile::new(47, 8).id(), "47N008E.hgt.zip");
        assert_eq!(SrtmTile::new(0, 0).id(), "00N000E.hgt.zip");
        assert_eq!(SrtmTile::new(-1, -180).id(), "01S180W.hgt.zip");
    }

    #[test]
    fn test_tile_url() {
        let tile = SrtmTile::new(-13, -42);
        assert_eq!(tile.remote_key(SRTM_PREFIX), "SRTM1/13S042W.hgt.zip");
        assert_eq!(
            SrtmSource::default().url_for(&tile),
            "https://srtm-pds.s3.amazonaws.com/SRTM1/13S042W.hgt.zip"
        );
        assert_eq!(
            tile.url("http://localhost:9000/", "/SRTM1/"),
            "http://localhost:9000/SRTM1/13S042W.hgt.zip"
        );
    }

    #[test]
    fn test_reference_box_grid() {
        let bbox = BoundingBox::new(-41.65, -12.80, -40.95, -12.10).unwrap();
        let ids: Vec<String> = tiles_for_bbox(&bbox).iter().map(|t| t.id()).collect();

        // floor(-12.80) = -13, ceil(-12.10) = -12
        // floor(-41.65) = -42, ceil(-40.95) = -40
        assert_eq!(
            ids,
            [
                "13S042W.hgt.zip",
                "13S041W.hgt.zip",
                "13S040W.hgt.zip",
                "12S042W.hgt.zip",
                "12S041W.hgt.zip",
                "12S040W.hgt.zip",
            ]
        );
    }

    #[test]
    fn test_grid_crossing_equator_and_meridian() {
        let bbox = BoundingBox::new(-0.5, -0.5, 0.5, 0.5).unwrap();
        let tiles = tiles_for_bbox(&bbox);

        // lat and lon both span -1..=1
        assert_eq!(tiles.len(), 9);
        assert!(tiles.contains(&SrtmTile::new(-1, -1)));
        assert!(tiles.contains(&SrtmTile::new(0, 0)));
        assert!(tiles.contains(&SrtmTile::new(1, 1)));
        assert_eq!(SrtmTile::new(-1, 1).id(), "01S001E.hgt.zip");
    }

    #[test]
    fn test_integer_edges_are_not_widened() {
        let bbox = BoundingBox::new(10.0, 20.0, 11.0, 21.0).unwrap();
        let tiles = tiles_for_bbox(&bbox);
        assert_eq!(
            tiles,
            vec![
                SrtmTile::new(20, 10),
                SrtmTile::new(20, 11),
                SrtmTile::new(21, 10),
                SrtmTile::new(21, 11),
            ]
        );
    }
}
