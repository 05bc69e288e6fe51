//! Per-item outcomes and the batch report they aggregate into.
//!
//! Every unit of work in the pipeline (one SRTM tile, one scene band, one
//! preview, one gallery entry, one classified image) ends in exactly one
//! [`ItemOutcome`]. Failures are values here, not log lines: the stages catch
//! errors at the item boundary, record them, and move on to sibling items.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ============================================================================
// Idempotence policy
// ============================================================================

/// What a stage does when its output artifact already exists on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactPolicy {
    /// An existing file is treated as finished work.
    #[default]
    SkipExisting,
    /// The artifact is recomputed and replaced.
    Overwrite,
}

impl ArtifactPolicy {
    /// Returns true if the artifact at `dest` should be (re)written.
    pub fn should_write(&self, dest: &Path) -> bool {
        match self {
            ArtifactPolicy::SkipExisting => !dest.exists(),
            ArtifactPolicy::Overwrite => true,
        }
    }
}

// ============================================================================
// Outcome types
// ============================================================================

/// The kind of work item an outcome refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// One SRTM elevation tile.
    SrtmTile,
    /// The scene catalog query itself.
    SceneSearch,
    /// One band raster of one scene.
    SceneBand,
    /// A scene's metadata document.
    SceneMetadata,
    /// A scene's completeness manifest.
    SceneManifest,
    /// A scene's RGB preview.
    Preview,
    /// The mosaic source as a whole (descriptor and quad listing).
    MosaicSource,
    /// One mosaic quad raster.
    MosaicQuad,
    /// One downsized gallery copy.
    GalleryEntry,
    /// One classifier call.
    Classification,
}

impl ItemKind {
    /// Returns the kind as a snake_case string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ItemKind::SrtmTile => "srtm_tile",
            ItemKind::SceneSearch => "scene_search",
            ItemKind::SceneBand => "scene_band",
            ItemKind::SceneMetadata => "scene_metadata",
            ItemKind::SceneManifest => "scene_manifest",
            ItemKind::Preview => "preview",
            ItemKind::MosaicSource => "mosaic_source",
            ItemKind::MosaicQuad => "mosaic_quad",
            ItemKind::GalleryEntry => "gallery_entry",
            ItemKind::Classification => "classification",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an item was not (re)processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The output artifact already exists.
    AlreadyPresent,
    /// Required inputs are not on disk yet.
    InputsMissing,
    /// The input format is outside what this stage handles.
    Unsupported,
    /// The whole source is switched off (e.g. no credentials).
    SourceDisabled,
    /// A previous run already recorded a result for this item.
    AlreadyRecorded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::AlreadyPresent => "already present",
            SkipReason::InputsMissing => "inputs missing",
            SkipReason::Unsupported => "unsupported input",
            SkipReason::SourceDisabled => "source disabled",
            SkipReason::AlreadyRecorded => "already recorded",
        };
        f.write_str(s)
    }
}

/// Terminal status of a single item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ItemStatus {
    /// Work was performed and succeeded.
    Done,
    /// No work was needed or possible.
    Skipped(SkipReason),
    /// Work was attempted and failed; the message identifies the cause.
    Failed(String),
}

/// The outcome of one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// What kind of item this is.
    pub kind: ItemKind,
    /// Identity of the item (tile id, `scene/band`, file path, ...).
    pub item: String,
    /// How it ended.
    #[serde(flatten)]
    pub status: ItemStatus,
}

impl ItemOutcome {
    /// An item that was processed successfully.
    pub fn done(kind: ItemKind, item: impl Into<String>) -> Self {
        Self {
            kind,
            item: item.into(),
            status: ItemStatus::Done,
        }
    }

    /// An item that was skipped.
    pub fn skipped(kind: ItemKind, item: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            kind,
            item: item.into(),
            status: ItemStatus::Skipped(reason),
        }
    }

    /// An item that failed with the given error.
    pub fn failed(kind: ItemKind, item: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            kind,
            item: item.into(),
            status: ItemStatus::Failed(error.to_string()),
        }
    }

    /// Returns true if the item failed.
    pub fn is_failure(&self) -> bool {
        matches!(self.status, ItemStatus::Failed(_))
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            ItemStatus::Done => write!(f, "[{}] {}: done", self.kind, self.item),
            ItemStatus::Skipped(reason) => {
                write!(f, "[{}] {}: skipped ({})", self.kind, self.item, reason)
            }
            ItemStatus::Failed(err) => write!(f, "[{}] {}: FAILED: {}", self.kind, self.item, err),
        }
    }
}

// ============================================================================
// Batch report
// ============================================================================

/// Per-status counts of a [`BatchReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    /// Items processed successfully.
    pub done: usize,
    /// Items skipped.
    pub skipped: usize,
    /// Items that failed.
    pub failed: usize,
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} done, {} skipped, {} failed",
            self.done, self.skipped, self.failed
        )
    }
}

/// Ordered collection of item outcomes from one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outcome.
    pub fn push(&mut self, outcome: ItemOutcome) {
        self.outcomes.push(outcome);
    }

    /// Append all outcomes of another report, preserving order.
    pub fn merge(&mut self, other: BatchReport) {
        self.outcomes.extend(other.outcomes);
    }

    /// All outcomes in the order they were recorded.
    pub fn outcomes(&self) -> &[ItemOutcome] {
        &self.outcomes
    }

    /// Outcomes of a single kind.
    pub fn of_kind(&self, kind: ItemKind) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(move |o| o.kind == kind)
    }

    /// Failed outcomes only.
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    /// Look up the outcome recorded for an item.
    pub fn find(&self, kind: ItemKind, item: &str) -> Option<&ItemOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.kind == kind && o.item == item)
    }

    /// Count outcomes by status.
    pub fn summary(&self) -> ReportSummary {
        self.outcomes
            .iter()
            .fold(ReportSummary::default(), |mut acc, o| {
                match o.status {
                    ItemStatus::Done => acc.done += 1,
                    ItemStatus::Skipped(_) => acc.skipped += 1,
                    ItemStatus::Failed(_) => acc.failed += 1,
                }
                acc
            })
    }

    /// Number of recorded outcomes.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

impl Extend<ItemOutcome> for BatchReport {
    fn extend<T: IntoIterator<Item = ItemOutcome>>(&mut self, iter: T) {
        self.outcomes.extend(iter);
    }
}
