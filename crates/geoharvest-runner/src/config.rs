//! Run configuration.
//!
//! Every field has a default, so an empty YAML document (or no file at all)
//! describes the Chapada Diamantina search box run:
//!
//! ```yaml
//! bbox: [-41.65, -12.80, -40.95, -12.10]
//! output_dir: data_tiles
//! scenes:
//!   max_cloud_cover: 20
//!   start_date: 2024-01-01
//!   limit: 20
//!   bands: [B04, B03, B02]
//! mosaic:
//!   year: 2024
//!   month: 3
//! gallery:
//!   dir: preview_tiles
//! ```

use chrono::{NaiveDate, Utc};
use geoharvest_catalog::{SceneQuery, SrtmSource, StacCatalog};
use geoharvest_common::{ArtifactPolicy, BoundingBox};
use geoharvest_render::{PreviewRenderer, StretchParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Cannot read config {path}: {source}")]
    Read {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid YAML for this schema.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A value is out of range.
    #[error("Configuration error: {0}")]
    Invalid(String),
}

// ============================================================================
// Sections
// ============================================================================

/// SRTM elevation tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SrtmConfig {
    /// Download SRTM tiles.
    pub enabled: bool,
    /// Bucket endpoint.
    pub base_url: String,
    /// Key prefix inside the bucket.
    pub prefix: String,
}

impl Default for SrtmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: geoharvest_catalog::srtm::SRTM_BASE_URL.to_string(),
            prefix: geoharvest_catalog::srtm::SRTM_PREFIX.to_string(),
        }
    }
}

/// Multispectral scene search and band download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SceneConfig {
    /// Search and download scenes.
    pub enabled: bool,
    /// `pc`, `earth-search` or a STAC API URL.
    pub catalog: String,
    /// Collections searched.
    pub collections: Vec<String>,
    /// First acquisition day.
    pub start_date: NaiveDate,
    /// Last acquisition day; today (UTC) when unset.
    pub end_date: Option<NaiveDate>,
    /// Upper bound (exclusive) on cloud cover, percent.
    pub max_cloud_cover: f64,
    /// Maximum number of scenes.
    pub limit: usize,
    /// Band assets downloaded per scene.
    pub bands: Vec<String>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            catalog: "pc".to_string(),
            collections: vec![geoharvest_catalog::stac::SENTINEL_2_L2A.to_string()],
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            end_date: None,
            max_cloud_cover: 20.0,
            limit: 20,
            bands: vec!["B04".into(), "B03".into(), "B02".into()],
        }
    }
}

/// Per-scene RGB preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreviewConfig {
    /// Render previews after band downloads.
    pub enabled: bool,
    /// Red, green and blue band names; each must be a downloaded band.
    pub bands: Vec<String>,
    /// Multiplier from stored values to reflectance.
    pub scale: f64,
    /// Lower stretch percentile.
    pub low_percentile: f64,
    /// Upper stretch percentile.
    pub high_percentile: f64,
    /// Gamma exponent.
    pub gamma: f64,
    /// JPEG quality.
    pub quality: u8,
    /// Re-render existing previews.
    pub overwrite: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        let stretch = StretchParams::default();
        Self {
            enabled: true,
            bands: geoharvest_render::PREVIEW_BANDS.map(String::from).to_vec(),
            scale: stretch.scale,
            low_percentile: stretch.low_percentile,
            high_percentile: stretch.high_percentile,
            gamma: stretch.gamma,
            quality: geoharvest_render::preview::PREVIEW_QUALITY,
            overwrite: false,
        }
    }
}

/// NICFI monthly mosaic quads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MosaicConfig {
    /// Download quads when an API key is available.
    pub enabled: bool,
    /// Mosaic year.
    pub year: i32,
    /// Mosaic month (1-12).
    pub month: u32,
    /// Basemaps API root.
    pub api_url: String,
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            year: 2024,
            month: 3,
            api_url: geoharvest_catalog::nicfi::PLANET_BASEMAPS_URL.to_string(),
        }
    }
}

/// Flat preview gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Gallery root.
    pub dir: PathBuf,
    /// Bound on the longer edge.
    pub max_edge: u32,
    /// JPEG quality.
    pub quality: u8,
    /// Rewrite existing entries.
    pub overwrite: bool,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("preview_tiles"),
            max_edge: geoharvest_render::gallery::DEFAULT_MAX_EDGE,
            quality: geoharvest_render::gallery::GALLERY_QUALITY,
            overwrite: false,
        }
    }
}

/// Water classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifyConfig {
    /// Chat completions endpoint.
    pub api_url: String,
    /// Model name.
    pub model: String,
    /// Completion budget.
    pub max_tokens: u32,
    /// Bound on the longer edge of uploads.
    pub max_edge: u32,
    /// Results table.
    pub results_file: PathBuf,
    /// Skip images already present in the results table.
    pub skip_recorded: bool,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            api_url: geoharvest_classify::classifier::OPENAI_CHAT_URL.to_string(),
            model: geoharvest_classify::classifier::DEFAULT_MODEL.to_string(),
            max_tokens: geoharvest_classify::classifier::DEFAULT_MAX_TOKENS,
            max_edge: geoharvest_classify::encode::MAX_UPLOAD_EDGE,
            results_file: PathBuf::from(geoharvest_classify::RESULTS_FILE_NAME),
            skip_recorded: false,
        }
    }
}

// ============================================================================
// Top level
// ============================================================================

/// Complete run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    /// `[west, south, east, north]` in degrees.
    pub bbox: [f64; 4],
    /// Acquisition root.
    pub output_dir: PathBuf,
    /// SRTM section.
    pub srtm: SrtmConfig,
    /// Scene section.
    pub scenes: SceneConfig,
    /// Preview section.
    pub preview: PreviewConfig,
    /// Mosaic section.
    pub mosaic: MosaicConfig,
    /// Gallery section.
    pub gallery: GalleryConfig,
    /// Classification section.
    pub classify: ClassifyConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            bbox: [-41.65, -12.80, -40.95, -12.10],
            output_dir: PathBuf::from("data_tiles"),
            srtm: SrtmConfig::default(),
            scenes: SceneConfig::default(),
            preview: PreviewConfig::default(),
            mosaic: MosaicConfig::default(),
            gallery: GalleryConfig::default(),
            classify: ClassifyConfig::default(),
        }
    }
}

impl HarvestConfig {
    /// Load and validate a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse and validate a YAML document. An empty document yields defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: HarvestConfig = if text.trim().is_empty() {
            HarvestConfig::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.validate()?;
        Ok(config)
    }

    /// The validated bounding box.
    pub fn bbox(&self) -> Result<BoundingBox, ConfigError> {
        BoundingBox::try_from(self.bbox)
            .map_err(|e| ConfigError::Invalid(format!("bbox: {}", e)))
    }

    /// Last acquisition day, resolving "today".
    pub fn end_date(&self) -> NaiveDate {
        self.scenes
            .end_date
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Check ranges and cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bbox()?;

        let scenes = &self.scenes;
        if !(0.0..=100.0).contains(&scenes.max_cloud_cover) {
            return Err(ConfigError::Invalid(format!(
                "scenes.max_cloud_cover must be within 0..=100, got {}",
                scenes.max_cloud_cover
            )));
        }
        if scenes.enabled && scenes.bands.is_empty() {
            return Err(ConfigError::Invalid("scenes.bands must not be empty".into()));
        }
        if scenes.enabled && scenes.collections.is_empty() {
            return Err(ConfigError::Invalid("scenes.collections must not be empty".into()));
        }
        if scenes.limit == 0 {
            return Err(ConfigError::Invalid("scenes.limit must be at least 1".into()));
        }
        if let Some(end) = scenes.end_date {
            if end < scenes.start_date {
                return Err(ConfigError::Invalid(format!(
                    "scenes.end_date {} is before start_date {}",
                    end, scenes.start_date
                )));
            }
        }

        let preview = &self.preview;
        if preview.enabled {
            if preview.bands.len() != 3 {
                return Err(ConfigError::Invalid(format!(
                    "preview.bands must name exactly three bands (red, green, blue), got {}",
                    preview.bands.len()
                )));
            }
            if scenes.enabled {
                if let Some(band) = preview.bands.iter().find(|b| !scenes.bands.contains(b)) {
                    return Err(ConfigError::Invalid(format!(
                        "preview band '{}' is not in scenes.bands",
                        band
                    )));
                }
            }
        }
        if !(0.0..=100.0).contains(&preview.low_percentile)
            || !(0.0..=100.0).contains(&preview.high_percentile)
            || preview.low_percentile >= preview.high_percentile
        {
            return Err(ConfigError::Invalid(format!(
                "preview percentiles must satisfy 0 <= low < high <= 100, got {} and {}",
                preview.low_percentile, preview.high_percentile
            )));
        }
        if !(preview.gamma > 0.0 && preview.gamma.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "preview.gamma must be positive, got {}",
                preview.gamma
            )));
        }

        if !(1..=12).contains(&self.mosaic.month) {
            return Err(ConfigError::Invalid(format!(
                "mosaic.month must be within 1..=12, got {}",
                self.mosaic.month
            )));
        }

        if self.gallery.max_edge == 0 || self.classify.max_edge == 0 {
            return Err(ConfigError::Invalid("max_edge must be at least 1".into()));
        }

        Ok(())
    }

    /// SRTM source, when enabled.
    pub fn srtm_source(&self) -> Option<SrtmSource> {
        self.srtm
            .enabled
            .then(|| SrtmSource::new(&self.srtm.base_url, &self.srtm.prefix))
    }

    /// STAC catalog endpoint.
    pub fn stac_catalog(&self) -> StacCatalog {
        StacCatalog::from_str_or_url(&self.scenes.catalog)
    }

    /// Scene query, when scenes are enabled.
    pub fn scene_query(&self) -> Result<Option<SceneQuery>, ConfigError> {
        if !self.scenes.enabled {
            return Ok(None);
        }
        Ok(Some(SceneQuery {
            collections: self.scenes.collections.clone(),
            bbox: self.bbox()?,
            start: self.scenes.start_date,
            end: self.end_date(),
            max_cloud_cover: self.scenes.max_cloud_cover,
            limit: self.scenes.limit,
        }))
    }

    /// Preview renderer, when previews are enabled.
    pub fn preview_renderer(&self) -> Option<PreviewRenderer> {
        let p = &self.preview;
        p.enabled.then(|| {
            let renderer = PreviewRenderer::new()
                .with_params(StretchParams {
                    scale: p.scale,
                    low_percentile: p.low_percentile,
                    high_percentile: p.high_percentile,
                    gamma: p.gamma,
                })
                .with_quality(p.quality)
                .with_policy(policy(p.overwrite));
            match <[String; 3]>::try_from(p.bands.clone()) {
                Ok(bands) => renderer.with_bands(bands),
                Err(_) => renderer,
            }
        })
    }

    /// Mosaic name, when the mosaic section is enabled.
    pub fn mosaic_name(&self) -> Option<String> {
        self.mosaic
            .enabled
            .then(|| geoharvest_catalog::nicfi_mosaic_name(self.mosaic.year, self.mosaic.month))
    }

    /// Idempotence policy for gallery entries.
    pub fn gallery_policy(&self) -> ArtifactPolicy {
        policy(self.gallery.overwrite)
    }
}

fn policy(overwrite: bool) -> ArtifactPolicy {
    if overwrite {
        ArtifactPolicy::Overwrite
    } else {
        ArtifactPolicy::SkipExisting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarvestConfig::from_yaml_str("").unwrap();
        assert_eq!(config, HarvestConfig::default());
        assert_eq!(config.bbox().unwrap().to_string(), "-41.65,-12.8,-40.95,-12.1");
        assert_eq!(config.scenes.max_cloud_cover, 20.0);
        assert_eq!(config.scenes.limit, 20);
        assert_eq!(config.scenes.bands, ["B04", "B03", "B02"]);
        assert_eq!(config.mosaic_name().unwrap(), "nicfi_monthly_2024_03_mosaic");
        assert_eq!(config.output_dir, PathBuf::from("data_tiles"));
        assert_eq!(config.gallery.dir, PathBuf::from("preview_tiles"));
        assert_eq!(config.classify.model, "gpt-4o-mini");
        assert_eq!(config.classify.max_tokens, 300);
        assert_eq!(config.stac_catalog(), StacCatalog::PlanetaryComputer);
    }

    #[test]
    fn test_partial_yaml() {
        let config = HarvestConfig::from_yaml_str(
            "bbox: [10.0, 20.0, 11.0, 21.0]\n\
             scenes:\n  start_date: 2023-05-01\n  end_date: 2023-06-01\n  limit: 3\n\
             preview:\n  gamma: 1.0\n\
             mosaic:\n  enabled: false\n",
        )
        .unwrap();

        let query = config.scene_query().unwrap().unwrap();
        assert_eq!(query.datetime(), "2023-05-01/2023-06-01");
        assert_eq!(query.limit, 3);
        assert_eq!(config.preview_renderer().unwrap().params().gamma, 1.0);
        assert!(config.mosaic_name().is_none());
        assert!(config.srtm_source().is_some());
    }

    #[test]
    fn test_validation_errors() {
        let bad = [
            "bbox: [1.0, 0.0, 0.0, 1.0]",
            "scenes:\n  max_cloud_cover: 120",
            "scenes:\n  bands: []",
            "scenes:\n  start_date: 2024-02-01\n  end_date: 2024-01-01",
            "preview:\n  low_percentile: 98\n  high_percentile: 2",
            "mosaic:\n  month: 13",
            "gallery:\n  max_edge: 0",
            "preview:\n  bands: [B04, B03]",
            "preview:\n  bands: [red, green, blue]",
            "scenes:\n  bands: [B04, B03, B08]",
        ];
        for text in bad {
            assert!(
                matches!(HarvestConfig::from_yaml_str(text), Err(ConfigError::Invalid(_))),
                "accepted: {}",
                text
            );
        }
    }

    #[test]
    fn test_preview_bands_follow_scene_bands() {
        let config = HarvestConfig::from_yaml_str(
            "scenes:\n  catalog: earth-search\n  bands: [red, green, blue, nir]\n\
             preview:\n  bands: [red, green, blue]\n",
        )
        .unwrap();
        assert_eq!(
            config.preview_renderer().unwrap().bands(),
            &["red", "green", "blue"].map(String::from)
        );

        let defaults = HarvestConfig::default();
        assert_eq!(
            defaults.preview_renderer().unwrap().bands(),
            &["B04", "B03", "B02"].map(String::from)
        );

        // Without scene downloads the preview bands are not cross-checked.
        assert!(HarvestConfig::from_yaml_str(
            "scenes:\n  enabled: false\npreview:\n  bands: [red, green, blue]\n"
        )
        .is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            HarvestConfig::from_yaml_str("sceens:\n  limit: 3"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
