//! Commands wired to the real HTTP clients.

use crate::config::HarvestConfig;
use crate::orchestrator::{write_report, Acquisition, AcquisitionPlan, Sources};
use crate::RunnerError;
use geoharvest_catalog::{MosaicSource, PlanetBasemaps, SceneCatalog, StacClient};
use geoharvest_classify::{ClassificationPass, ClassifyError, OpenAiClassifier, ResultsTable};
use geoharvest_common::BatchReport;
use geoharvest_fetch::HttpFetcher;
use geoharvest_render::GalleryBuilder;
use tracing::info;

fn http_client() -> Result<reqwest::blocking::Client, RunnerError> {
    reqwest::blocking::Client::builder()
        .user_agent(concat!("geoharvest/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| RunnerError::Fetch(e.into()))
}

/// The acquisition plan described by `config`.
pub fn plan(config: &HarvestConfig) -> Result<AcquisitionPlan, RunnerError> {
    Ok(AcquisitionPlan {
        output_dir: config.output_dir.clone(),
        bbox: config.bbox()?,
        srtm: config.srtm_source(),
        scene_query: config.scene_query()?,
        bands: config.scenes.bands.clone(),
        preview: config.preview_renderer(),
        mosaic_name: config.mosaic_name(),
    })
}

/// Download every enabled source into the output root.
///
/// Without a Planet key the mosaic source is recorded as disabled.
pub fn acquire(config: &HarvestConfig, pl_api_key: Option<&str>) -> Result<BatchReport, RunnerError> {
    let plan = plan(config)?;
    let fetcher = HttpFetcher::new()?;
    let stac = StacClient::new(config.stac_catalog())?;
    let planet = match pl_api_key.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => Some(PlanetBasemaps::with_client(
            &config.mosaic.api_url,
            key,
            http_client()?,
        )),
        None => None,
    };

    let sources = Sources {
        fetcher: &fetcher,
        catalog: Some(&stac as &dyn SceneCatalog),
        mosaic: planet.as_ref().map(|p| p as &dyn MosaicSource),
    };
    let report = Acquisition::new(plan, sources).run()?;

    let stats = fetcher.download_stats();
    info!(
        files = stats.files_downloaded,
        bytes = stats.bytes_downloaded,
        skipped = stats.files_skipped,
        "transfer totals"
    );
    Ok(report)
}

/// Copy previews from the output root into the flat gallery.
pub fn build_gallery(config: &HarvestConfig) -> Result<BatchReport, RunnerError> {
    let builder = GalleryBuilder::new(&config.output_dir, &config.gallery.dir)
        .with_max_edge(config.gallery.max_edge)
        .with_quality(config.gallery.quality)
        .with_policy(config.gallery_policy());
    let report = builder.build()?;
    info!(gallery = %builder.output_dir().display(), summary = %report.summary(), "gallery finished");
    Ok(report)
}

/// Classify every gallery image with the OpenAI vision model.
pub fn classify(config: &HarvestConfig, openai_api_key: Option<&str>) -> Result<BatchReport, RunnerError> {
    let key = openai_api_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(ClassifyError::MissingApiKey)?;
    let settings = &config.classify;
    let classifier = OpenAiClassifier::with_client(&settings.api_url, key, http_client()?)
        .with_model(&settings.model)
        .with_max_tokens(settings.max_tokens);

    let table = ResultsTable::open(&settings.results_file)?;
    let report = ClassificationPass::new(&config.gallery.dir, table)
        .with_max_edge(settings.max_edge)
        .with_skip_recorded(settings.skip_recorded)
        .run(&classifier)?;
    Ok(report)
}

/// Acquire, then build the gallery. The combined report replaces the
/// acquisition's `report.json`.
pub fn run(config: &HarvestConfig, pl_api_key: Option<&str>) -> Result<BatchReport, RunnerError> {
    let mut report = acquire(config, pl_api_key)?;
    report.merge(build_gallery(config)?);
    write_report(&config.output_dir, &report)?;
    Ok(report)
}
