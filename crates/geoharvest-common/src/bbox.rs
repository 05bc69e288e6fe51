//! Geographic bounding box.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error returned when a bounding box violates its ordering invariant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundingBoxError {
    /// West edge is not strictly less than the east edge.
    #[error("west ({west}) must be less than east ({east})")]
    InvertedLongitude { west: f64, east: f64 },

    /// South edge is not strictly less than the north edge.
    #[error("south ({south}) must be less than north ({north})")]
    InvertedLatitude { south: f64, north: f64 },

    /// One of the edges is NaN or infinite.
    #[error("bounding box edges must be finite")]
    NonFinite,
}

/// Axis-aligned box in WGS-84 degrees.
///
/// Serialized as the four-element array `[west, south, east, north]`, which is
/// the order STAC and the Planet basemaps API both expect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    west: f64,
    south: f64,
    east: f64,
    north: f64,
}

impl BoundingBox {
    /// Create a bounding box, checking `west < east` and `south < north`.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self, BoundingBoxError> {
        if ![west, south, east, north].iter().all(|v| v.is_finite()) {
            return Err(BoundingBoxError::NonFinite);
        }
        if west >= east {
            return Err(BoundingBoxError::InvertedLongitude { west, east });
        }
        if south >= north {
            return Err(BoundingBoxError::InvertedLatitude { south, north });
        }
        Ok(Self {
            west,
            south,
            east,
            north,
        })
    }

    /// West edge (minimum longitude).
    pub fn west(&self) -> f64 {
        self.west
    }

    /// South edge (minimum latitude).
    pub fn south(&self) -> f64 {
        self.south
    }

    /// East edge (maximum longitude).
    pub fn east(&self) -> f64 {
        self.east
    }

    /// North edge (maximum latitude).
    pub fn north(&self) -> f64 {
        self.north
    }

    /// The edges as `[west, south, east, north]`.
    pub fn to_array(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }

    /// Check if a coordinate is within the box (edges inclusive).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = BoundingBoxError;

    fn try_from(edges: [f64; 4]) -> Result<Self, Self::Error> {
        let [west, south, east, north] = edges;
        Self::new(west, south, east, north)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        bbox.to_array()
    }
}

/// Formats as `west,south,east,north`, the query-string form used by the
/// basemaps quad listing.
impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}
