//! # geoharvest-common
//!
//! Types shared by every stage of the geoharvest pipeline.
//!
//! - [`BoundingBox`]: the validated geographic area of interest.
//! - [`ItemOutcome`] / [`BatchReport`]: the typed per-item result that every
//!   stage (download, preview, gallery, classification) produces instead of
//!   printing and swallowing failures.
//! - [`ArtifactPolicy`]: the explicit "exists means done" rule, stated per
//!   artifact type.

mod bbox;
mod outcome;

pub use bbox::{BoundingBox, BoundingBoxError};
pub use outcome::{ArtifactPolicy, BatchReport, ItemKind, ItemOutcome, ItemStatus, ReportSummary, SkipReason};
