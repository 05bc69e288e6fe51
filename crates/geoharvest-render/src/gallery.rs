//! Flat gallery of downsized copies of every previewable image.
//!
//! The acquisition tree is walked recursively. JPEGs and 3-band 8-bit RGB
//! TIFFs are copied, downsized, to `<gallery>/preview/<parent>-<stem>.jpg`.
//! Prefixing the parent directory keeps `A/preview.jpg` and `B/preview.jpg`
//! apart.

use crate::jpeg::write_jpeg;
use crate::raster::{color_type, read_rgb8};
use crate::Result;
use geoharvest_common::{ArtifactPolicy, BatchReport, ItemKind, ItemOutcome, SkipReason};
use geoharvest_metrics::metric_defs;
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};
use tiff::ColorType;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Subdirectory of the gallery root that receives the copies.
pub const GALLERY_SUBDIR: &str = "preview";

/// Default bound on the longer edge of a gallery image.
pub const DEFAULT_MAX_EDGE: u32 = 1024;

/// JPEG quality of gallery images.
pub const GALLERY_QUALITY: u8 = 80;

/// Gallery file name for an image `stem` found in directory `parent`.
pub fn gallery_name(parent: &str, stem: &str) -> String {
    format!("{}-{}.jpg", parent, stem)
}

/// Largest size with the same aspect ratio whose edges are at most `max_edge`.
///
/// Images already within bounds are returned unchanged; nothing is upscaled.
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let max_edge = max_edge.max(1);
    if width <= max_edge && height <= max_edge {
        return (width, height);
    }
    let scale = max_edge as f64 / width.max(height) as f64;
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_edge);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_edge);
    (w, h)
}

/// How a file found during the walk is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Candidate {
    Jpeg,
    Tiff,
    Ignored,
}

fn classify_path(path: &Path) -> Candidate {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => Candidate::Jpeg,
        Some("tif") | Some("tiff") => Candidate::Tiff,
        _ => Candidate::Ignored,
    }
}

/// Builds the gallery for one acquisition tree.
#[derive(Debug, Clone)]
pub struct GalleryBuilder {
    source_root: PathBuf,
    gallery_root: PathBuf,
    max_edge: u32,
    quality: u8,
    policy: ArtifactPolicy,
}

impl GalleryBuilder {
    /// Create a builder copying images from `source_root` into `gallery_root`.
    pub fn new(source_root: impl Into<PathBuf>, gallery_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            gallery_root: gallery_root.into(),
            max_edge: DEFAULT_MAX_EDGE,
            quality: GALLERY_QUALITY,
            policy: ArtifactPolicy::SkipExisting,
        }
    }

    /// Set the bound on the longer edge.
    pub fn with_max_edge(mut self, max_edge: u32) -> Self {
        self.max_edge = max_edge.max(1);
        self
    }

    /// Set the JPEG quality (1-100).
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Set what happens when a gallery entry already exists.
    pub fn with_policy(mut self, policy: ArtifactPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Directory the copies are written to.
    pub fn output_dir(&self) -> PathBuf {
        self.gallery_root.join(GALLERY_SUBDIR)
    }

    /// Walk the source tree and write missing gallery entries.
    ///
    /// Per-image failures are recorded in the report. Only failing to create
    /// the output directory or to read the source root is an error.
    pub fn build(&self) -> Result<BatchReport> {
        let output_dir = self.output_dir();
        fs::create_dir_all(&output_dir)?;

        let source = fs::canonicalize(&self.source_root)?;
        let gallery = fs::canonicalize(&self.gallery_root)?;

        let mut report = BatchReport::new();
        let walker = WalkDir::new(&source)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.path() != gallery);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let item = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                    warn!(item = %item, error = %e, "cannot read directory entry");
                    report.push(ItemOutcome::failed(ItemKind::GalleryEntry, item, e));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let candidate = classify_path(path);
            if candidate == Candidate::Ignored {
                continue;
            }

            let item = path
                .strip_prefix(&source)
                .unwrap_or(path)
                .display()
                .to_string();

            match self.copy_one(path, &item, candidate, &output_dir) {
                Ok(outcome) => report.push(outcome),
                Err(e) => {
                    warn!(item = %item, error = %e, "gallery copy failed");
                    report.push(ItemOutcome::failed(ItemKind::GalleryEntry, item, e));
                }
            }
        }

        info!(gallery = %output_dir.display(), summary = %report.summary(), "gallery built");
        Ok(report)
    }

    fn copy_one(
        &self,
        path: &Path,
        item: &str,
        candidate: Candidate,
        output_dir: &Path,
    ) -> Result<ItemOutcome> {
        let parent = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dest = output_dir.join(gallery_name(&parent, &stem));

        if !self.policy.should_write(&dest) {
            debug!(dest = %dest.display(), "gallery entry already present");
            return Ok(ItemOutcome::skipped(
                ItemKind::GalleryEntry,
                item,
                SkipReason::AlreadyPresent,
            ));
        }

        let image: RgbImage = match candidate {
            Candidate::Jpeg => image::open(path)?.to_rgb8(),
            Candidate::Tiff => {
                let color = color_type(path)?;
                if color != ColorType::RGB(8) {
                    debug!(path = %path.display(), ?color, "not an 8-bit RGB raster");
                    return Ok(ItemOutcome::skipped(
                        ItemKind::GalleryEntry,
                        item,
                        SkipReason::Unsupported,
                    ));
                }
                read_rgb8(path)?
            }
            Candidate::Ignored => {
                return Ok(ItemOutcome::skipped(
                    ItemKind::GalleryEntry,
                    item,
                    SkipReason::Unsupported,
                ))
            }
        };

        let (width, height) = image.dimensions();
        let (w, h) = fit_within(width, height, self.max_edge);
        let image = if (w, h) == (width, height) {
            image
        } else {
            imageops::resize(&image, w, h, FilterType::Lanczos3)
        };

        write_jpeg(&image, &dest, self.quality)?;
        metrics::counter!(metric_defs::GALLERY_ENTRIES.name).increment(1);
        info!(dest = %dest.display(), width = w, height = h, "gallery entry written");

        Ok(ItemOutcome::done(ItemKind::GalleryEntry, item))
    }
}
