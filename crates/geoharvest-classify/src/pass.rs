//! One classification pass over a gallery.

use crate::classifier::{Classifier, ImageRequest};
use crate::encode::{encode_image, MAX_UPLOAD_EDGE};
use crate::results::{DetectionRecord, ResultsTable};
use crate::Result;
use geoharvest_common::{BatchReport, ItemKind, ItemOutcome, SkipReason};
use geoharvest_metrics::metric_defs;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A `*.jpg` found in a gallery subfolder.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GalleryImage {
    /// Subfolder name.
    pub folder: String,
    /// File name.
    pub image_name: String,
    /// Full path.
    pub path: PathBuf,
}

impl GalleryImage {
    fn item(&self) -> String {
        format!("{}/{}", self.folder, self.image_name)
    }

    fn record(&self) -> DetectionRecord {
        DetectionRecord {
            folder_name: self.folder.clone(),
            image_name: self.image_name.clone(),
        }
    }
}

/// Every `*.jpg` directly inside a subfolder of `gallery_root`, sorted by
/// folder then file name.
pub fn gallery_images(gallery_root: &Path) -> Result<Vec<GalleryImage>> {
    let mut images = Vec::new();

    for folder in fs::read_dir(gallery_root)? {
        let folder = folder?;
        if !folder.file_type()?.is_dir() {
            continue;
        }
        let folder_name = folder.file_name().to_string_lossy().into_owned();

        for file in fs::read_dir(folder.path())? {
            let file = file?;
            let path = file.path();
            let is_jpg = path.extension().and_then(|e| e.to_str()) == Some("jpg");
            if !is_jpg || !file.file_type()?.is_file() {
                continue;
            }
            images.push(GalleryImage {
                folder: folder_name.clone(),
                image_name: file.file_name().to_string_lossy().into_owned(),
                path,
            });
        }
    }

    images.sort();
    Ok(images)
}

/// Classifies every gallery image and appends positives to the table.
#[derive(Debug, Clone)]
pub struct ClassificationPass {
    gallery_root: PathBuf,
    table: ResultsTable,
    max_edge: u32,
    skip_recorded: bool,
}

impl ClassificationPass {
    /// Create a pass over `gallery_root` writing to `table`.
    pub fn new(gallery_root: impl Into<PathBuf>, table: ResultsTable) -> Self {
        Self {
            gallery_root: gallery_root.into(),
            table,
            max_edge: MAX_UPLOAD_EDGE,
            skip_recorded: false,
        }
    }

    /// Bound on the longer edge of uploaded images.
    pub fn with_max_edge(mut self, max_edge: u32) -> Self {
        self.max_edge = max_edge.max(1);
        self
    }

    /// Do not resubmit images that already have a row in the table.
    pub fn with_skip_recorded(mut self, skip_recorded: bool) -> Self {
        self.skip_recorded = skip_recorded;
        self
    }

    /// The results table.
    pub fn table(&self) -> &ResultsTable {
        &self.table
    }

    /// Run the pass.
    ///
    /// Encoding, model and table failures are recorded per image and count as
    /// negative; only failing to list the gallery is an error.
    pub fn run(&self, classifier: &dyn Classifier) -> Result<BatchReport> {
        let images = gallery_images(&self.gallery_root)?;
        let recorded: HashSet<DetectionRecord> = if self.skip_recorded {
            self.table.recorded()?
        } else {
            HashSet::new()
        };

        info!(gallery = %self.gallery_root.display(), images = images.len(), "classifying");

        let mut report = BatchReport::new();
        for image in &images {
            let item = image.item();

            if recorded.contains(&image.record()) {
                debug!(item = %item, "already recorded");
                report.push(ItemOutcome::skipped(
                    ItemKind::Classification,
                    item,
                    SkipReason::AlreadyRecorded,
                ));
                continue;
            }

            match self.classify_one(image, classifier) {
                Ok(true) => {
                    info!(folder = %image.folder, image = %image.image_name, "water detected");
                    report.push(ItemOutcome::done(ItemKind::Classification, item));
                }
                Ok(false) => {
                    debug!(item = %item, "no water");
                    report.push(ItemOutcome::done(ItemKind::Classification, item));
                }
                Err(e) => {
                    warn!(item = %item, error = %e, "classification failed, treating as negative");
                    metrics::counter!(metric_defs::CLASSIFY_FAILURES.name).increment(1);
                    report.push(ItemOutcome::failed(ItemKind::Classification, item, e));
                }
            }
        }

        info!(summary = %report.summary(), "classification finished");
        Ok(report)
    }

    fn classify_one(&self, image: &GalleryImage, classifier: &dyn Classifier) -> Result<bool> {
        let jpeg_base64 = encode_image(&image.path, self.max_edge)?;

        metrics::counter!(metric_defs::IMAGES_CLASSIFIED.name).increment(1);
        let positive = classifier.classify(&ImageRequest {
            folder: &image.folder,
            image_name: &image.image_name,
            jpeg_base64: &jpeg_base64,
        })?;

        if positive {
            self.table.append(&image.record())?;
            metrics::counter!(metric_defs::POSITIVE_DETECTIONS.name).increment(1);
        }
        Ok(positive)
    }
}
