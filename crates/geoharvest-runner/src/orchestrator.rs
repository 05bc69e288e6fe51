//! Acquisition orchestration.
//!
//! Drives the three sources in order (SRTM tiles, scenes, mosaic quads) into
//! one output root. Every tile, band, preview and quad is its own item: a
//! failure is logged with the item's identity, recorded in the report, and the
//! run moves on to the next item. Only failing to create the output root stops
//! the run.

use crate::RunnerError;
use chrono::{DateTime, Utc};
use geoharvest_catalog::{MosaicSource, Scene, SceneCatalog, SceneQuery, SrtmSource};
use geoharvest_common::{BatchReport, BoundingBox, ItemKind, ItemOutcome, SkipReason};
use geoharvest_fetch::{Fetch, FetchError, FetchOutcome};
use geoharvest_metrics::metric_defs;
use geoharvest_render::{PreviewOutcome, PreviewRenderer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Scene metadata document name.
pub const METADATA_FILE_NAME: &str = "metadata.json";

/// Scene completeness manifest name.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Run report name.
pub const REPORT_FILE_NAME: &str = "report.json";

/// Metric label values per source.
const SOURCE_SRTM: &str = "srtm";
const SOURCE_SCENE: &str = "scene";
const SOURCE_MOSAIC: &str = "mosaic";

// ============================================================================
// Manifest
// ============================================================================

/// State of one band file after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandState {
    /// Transferred during this run.
    Downloaded,
    /// Already on disk.
    Present,
    /// Not on disk; the attempt failed.
    Failed,
}

/// Explicit completeness record written beside each scene's bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneManifest {
    /// Scene identifier.
    pub scene_id: String,
    /// Requested bands and their state.
    pub bands: BTreeMap<String, BandState>,
    /// Whether `preview.jpg` exists.
    pub preview: bool,
    /// True only when every requested band file exists.
    pub complete: bool,
    /// When the manifest was written.
    pub updated: DateTime<Utc>,
}

impl SceneManifest {
    /// Read a scene's manifest.
    pub fn load(scene_dir: &Path) -> Result<Self, RunnerError> {
        let text = fs::read_to_string(scene_dir.join(MANIFEST_FILE_NAME))?;
        Ok(serde_json::from_str(&text)?)
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Collaborators of an acquisition run.
///
/// A source left as `None` is skipped; for the mosaic source this is recorded
/// as [`SkipReason::SourceDisabled`].
#[derive(Clone, Copy)]
pub struct Sources<'a> {
    /// Transport used for every download.
    pub fetcher: &'a dyn Fetch,
    /// Scene catalog.
    pub catalog: Option<&'a dyn SceneCatalog>,
    /// Mosaic quad source.
    pub mosaic: Option<&'a dyn MosaicSource>,
}

/// What an acquisition run fetches.
#[derive(Debug, Clone)]
pub struct AcquisitionPlan {
    /// Acquisition root.
    pub output_dir: PathBuf,
    /// Area of interest.
    pub bbox: BoundingBox,
    /// SRTM tiles, if enabled.
    pub srtm: Option<SrtmSource>,
    /// Scene search, if enabled.
    pub scene_query: Option<SceneQuery>,
    /// Bands downloaded per scene.
    pub bands: Vec<String>,
    /// Preview renderer, if enabled.
    pub preview: Option<PreviewRenderer>,
    /// Mosaic name, if enabled.
    pub mosaic_name: Option<String>,
}

/// One acquisition run.
pub struct Acquisition<'a> {
    plan: AcquisitionPlan,
    sources: Sources<'a>,
}

impl<'a> Acquisition<'a> {
    /// Create a run.
    pub fn new(plan: AcquisitionPlan, sources: Sources<'a>) -> Self {
        Self { plan, sources }
    }

    /// Run every enabled source and write `report.json` into the root.
    pub fn run(&self) -> Result<BatchReport, RunnerError> {
        let root = &self.plan.output_dir;
        fs::create_dir_all(root).map_err(|source| RunnerError::OutputRoot {
            path: root.clone(),
            source,
        })?;

        let mut report = BatchReport::new();

        if let Some(srtm) = &self.plan.srtm {
            self.fetch_srtm(srtm, &mut report);
        }
        if let Some(query) = &self.plan.scene_query {
            match self.sources.catalog {
                Some(catalog) => self.fetch_scenes(catalog, query, &mut report),
                None => debug!("no scene catalog configured"),
            }
        }
        if let Some(name) = &self.plan.mosaic_name {
            self.fetch_mosaic(name, &mut report);
        }

        write_report(root, &report)?;
        info!(root = %root.display(), summary = %report.summary(), "acquisition finished");
        Ok(report)
    }

    // ------------------------------------------------------------------------
    // SRTM
    // ------------------------------------------------------------------------

    fn fetch_srtm(&self, srtm: &SrtmSource, report: &mut BatchReport) {
        let tiles = srtm.tiles(&self.plan.bbox);
        info!(count = tiles.len(), "fetching SRTM tiles");

        for tile in tiles {
            let id = tile.id();
            let dest = self.plan.output_dir.join(&id);
            let outcome = match self.fetch(SOURCE_SRTM, &srtm.url_for(&tile), &dest) {
                Ok(fetched) => fetched_outcome(ItemKind::SrtmTile, &id, fetched),
                Err(e) => {
                    warn!(tile = %id, error = %e, "SRTM tile failed");
                    ItemOutcome::failed(ItemKind::SrtmTile, &id, e)
                }
            };
            report.push(outcome);
        }
    }

    // ------------------------------------------------------------------------
    // Scenes
    // ------------------------------------------------------------------------

    fn fetch_scenes(&self, catalog: &dyn SceneCatalog, query: &SceneQuery, report: &mut BatchReport) {
        let scenes = match catalog.search(query) {
            Ok(scenes) => {
                report.push(ItemOutcome::done(ItemKind::SceneSearch, query.datetime()));
                scenes
            }
            Err(e) => {
                warn!(error = %e, "scene search failed");
                report.push(ItemOutcome::failed(ItemKind::SceneSearch, query.datetime(), e));
                return;
            }
        };

        for scene in &scenes {
            self.fetch_scene(catalog, scene, report);
        }
    }

    fn fetch_scene(&self, catalog: &dyn SceneCatalog, scene: &Scene, report: &mut BatchReport) {
        let scene_dir = match create_child_dir(&self.plan.output_dir, &scene.id) {
            Ok(dir) => dir,
            Err(e) => {
                warn!(scene = %scene.id, error = %e, "cannot create scene directory");
                for band in &self.plan.bands {
                    let item = format!("{}/{}", scene.id, band);
                    report.push(ItemOutcome::failed(ItemKind::SceneBand, item, &e));
                }
                return;
            }
        };

        let mut bands = BTreeMap::new();
        for band in &self.plan.bands {
            let item = format!("{}/{}", scene.id, band);
            let dest = scene_dir.join(format!("{}.tif", band));

            let state = match self.fetch_band(catalog, scene, band, &dest) {
                Ok(FetchOutcome::Downloaded { .. }) => {
                    report.push(ItemOutcome::done(ItemKind::SceneBand, item));
                    BandState::Downloaded
                }
                Ok(FetchOutcome::AlreadyPresent) => {
                    report.push(ItemOutcome::skipped(
                        ItemKind::SceneBand,
                        item,
                        SkipReason::AlreadyPresent,
                    ));
                    BandState::Present
                }
                Err(e) => {
                    warn!(scene = %scene.id, band = %band, error = %e, "band download failed");
                    report.push(ItemOutcome::failed(ItemKind::SceneBand, item, e));
                    BandState::Failed
                }
            };
            bands.insert(band.clone(), state);
        }

        if let Some(renderer) = &self.plan.preview {
            report.push(self.render_preview(renderer, scene, &scene_dir));
        }

        // Metadata is written even when bands failed.
        let metadata = scene_dir.join(METADATA_FILE_NAME);
        match write_json(&metadata, &scene.metadata) {
            Ok(()) => report.push(ItemOutcome::done(ItemKind::SceneMetadata, &scene.id)),
            Err(e) => {
                warn!(scene = %scene.id, error = %e, "cannot write metadata");
                report.push(ItemOutcome::failed(ItemKind::SceneMetadata, &scene.id, e));
            }
        }

        let manifest = SceneManifest {
            scene_id: scene.id.clone(),
            complete: bands.values().all(|s| *s != BandState::Failed),
            bands,
            preview: scene_dir.join(geoharvest_render::PREVIEW_FILE_NAME).exists(),
            updated: Utc::now(),
        };
        match write_json(&scene_dir.join(MANIFEST_FILE_NAME), &manifest) {
            Ok(()) => report.push(ItemOutcome::done(ItemKind::SceneManifest, &scene.id)),
            Err(e) => {
                warn!(scene = %scene.id, error = %e, "cannot write manifest");
                report.push(ItemOutcome::failed(ItemKind::SceneManifest, &scene.id, e));
            }
        }
    }

    /// Sign and download one band. An existing file needs no signature.
    fn fetch_band(
        &self,
        catalog: &dyn SceneCatalog,
        scene: &Scene,
        band: &str,
        dest: &Path,
    ) -> Result<FetchOutcome, BandError> {
        if dest.exists() {
            return Ok(self.fetch(SOURCE_SCENE, "", dest)?);
        }
        let href = scene
            .asset_href(band)
            .ok_or_else(|| BandError::MissingAsset(band.to_string()))?;
        let url = catalog.sign(href)?;
        Ok(self.fetch(SOURCE_SCENE, &url, dest)?)
    }

    fn render_preview(
        &self,
        renderer: &PreviewRenderer,
        scene: &Scene,
        scene_dir: &Path,
    ) -> ItemOutcome {
        match renderer.render(scene_dir) {
            Ok(PreviewOutcome::Rendered(_)) => ItemOutcome::done(ItemKind::Preview, &scene.id),
            Ok(PreviewOutcome::AlreadyPresent(_)) => {
                ItemOutcome::skipped(ItemKind::Preview, &scene.id, SkipReason::AlreadyPresent)
            }
            Ok(PreviewOutcome::MissingBands(missing)) => {
                debug!(scene = %scene.id, ?missing, "preview deferred");
                ItemOutcome::skipped(ItemKind::Preview, &scene.id, SkipReason::InputsMissing)
            }
            Err(e) => {
                warn!(scene = %scene.id, error = %e, "preview failed");
                ItemOutcome::failed(ItemKind::Preview, &scene.id, e)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Mosaic
    // ------------------------------------------------------------------------

    fn fetch_mosaic(&self, name: &str, report: &mut BatchReport) {
        let Some(source) = self.sources.mosaic else {
            info!(mosaic = name, "no API key, skipping mosaic quads");
            report.push(ItemOutcome::skipped(
                ItemKind::MosaicSource,
                name,
                SkipReason::SourceDisabled,
            ));
            return;
        };

        let quads = match source.quads(name, &self.plan.bbox) {
            Ok(quads) => {
                report.push(ItemOutcome::done(ItemKind::MosaicSource, name));
                quads
            }
            Err(e) => {
                warn!(mosaic = name, error = %e, "mosaic source unusable");
                report.push(ItemOutcome::failed(ItemKind::MosaicSource, name, e));
                return;
            }
        };

        for quad in quads {
            if !is_plain_name(&quad.id) {
                warn!(quad = %quad.id, "quad id is not a plain file name");
                report.push(ItemOutcome::failed(
                    ItemKind::MosaicQuad,
                    &quad.id,
                    format!("'{}' is not a plain file name", quad.id),
                ));
                continue;
            }
            let dest = self.plan.output_dir.join(quad.file_name());
            let outcome = match self.fetch(SOURCE_MOSAIC, &quad.download_url, &dest) {
                Ok(fetched) => fetched_outcome(ItemKind::MosaicQuad, &quad.id, fetched),
                Err(e) => {
                    warn!(quad = %quad.id, error = %e, "quad download failed");
                    ItemOutcome::failed(ItemKind::MosaicQuad, &quad.id, e)
                }
            };
            report.push(outcome);
        }
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    /// Fetch through the transport and record per-source metrics.
    fn fetch(&self, source: &'static str, url: &str, dest: &Path) -> Result<FetchOutcome, FetchError> {
        let result = self.sources.fetcher.fetch(url, dest);
        match &result {
            Ok(FetchOutcome::Downloaded { bytes }) => {
                metrics::counter!(metric_defs::FETCH_DOWNLOADS.name, "source" => source).increment(1);
                metrics::counter!(metric_defs::FETCH_BYTES.name, "source" => source).increment(*bytes);
            }
            Ok(FetchOutcome::AlreadyPresent) => {
                metrics::counter!(metric_defs::FETCH_SKIPPED.name, "source" => source).increment(1);
            }
            Err(_) => {
                metrics::counter!(metric_defs::FETCH_FAILURES.name, "source" => source).increment(1);
            }
        }
        result
    }
}

/// Why a band could not be obtained.
#[derive(Debug, thiserror::Error)]
enum BandError {
    #[error("scene has no '{0}' asset")]
    MissingAsset(String),
    #[error(transparent)]
    Catalog(#[from] geoharvest_catalog::CatalogError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// True when `name` is exactly one ordinary path component.
fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    !name.contains(['/', '\\'])
        && matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        )
}

/// Create `root/<name>`, refusing names that would leave `root`.
fn create_child_dir(root: &Path, name: &str) -> io::Result<PathBuf> {
    if !is_plain_name(name) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{}' is not a plain file name", name),
        ));
    }
    let dir = root.join(name);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn fetched_outcome(kind: ItemKind, item: &str, fetched: FetchOutcome) -> ItemOutcome {
    match fetched {
        FetchOutcome::Downloaded { .. } => ItemOutcome::done(kind, item),
        FetchOutcome::AlreadyPresent => ItemOutcome::skipped(kind, item, SkipReason::AlreadyPresent),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RunnerError> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text)?;
    Ok(())
}

/// Write a run report as `report.json` under `root`.
pub fn write_report(root: &Path, report: &BatchReport) -> Result<PathBuf, RunnerError> {
    let path = root.join(REPORT_FILE_NAME);
    write_json(&path, report)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manifest_document() {
        let manifest = SceneManifest {
            scene_id: "S2A_1".to_string(),
            bands: BTreeMap::from([
                ("B02".to_string(), BandState::Present),
                ("B03".to_string(), BandState::Failed),
                ("B04".to_string(), BandState::Downloaded),
            ]),
            preview: false,
            complete: false,
            updated: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        };

        let doc = serde_json::to_value(&manifest).unwrap();
        assert_eq!(doc["scene_id"], "S2A_1");
        assert_eq!(doc["bands"]["B02"], "present");
        assert_eq!(doc["bands"]["B03"], "failed");
        assert_eq!(doc["bands"]["B04"], "downloaded");
        assert_eq!(doc["complete"], false);
        assert_eq!(doc["updated"], "2024-03-01T12:00:00Z");
    }

    #[test]
    fn test_plain_names() {
        assert!(is_plain_name("S2A_MSIL2A_20240301T125311_R138_T24LTM"));
        assert!(is_plain_name("748-962"));
        assert!(!is_plain_name(""));
        assert!(!is_plain_name("."));
        assert!(!is_plain_name(".."));
        assert!(!is_plain_name("../escape"));
        assert!(!is_plain_name("a/b"));
        assert!(!is_plain_name("a\\b"));
        assert!(!is_plain_name("/etc"));
    }

    #[test]
    fn test_fetched_outcome() {
        assert_eq!(
            fetched_outcome(ItemKind::SrtmTile, "t", FetchOutcome::Downloaded { bytes: 3 }).status,
            geoharvest_common::ItemStatus::Done
        );
        assert_eq!(
            fetched_outcome(ItemKind::MosaicQuad, "q", FetchOutcome::AlreadyPresent).status,
            geoharvest_common::ItemStatus::Skipped(SkipReason::AlreadyPresent)
        );
    }
}
