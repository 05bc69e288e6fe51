//! True-colour scene previews.
//!
//! A preview is derived from the red, green and blue band rasters of one scene
//! directory (`B04.tif`, `B03.tif`, `B02.tif` unless other band names are
//! configured with [`PreviewRenderer::with_bands`]). Missing bands are not an
//! error: the scene simply has no preview yet, and a later run that completes
//! the downloads will produce it.

use crate::jpeg::write_jpeg;
use crate::raster::{read_band, Band};
use crate::stretch::{stretch_channel, to_byte, StretchParams};
use crate::{RenderError, Result};
use geoharvest_common::ArtifactPolicy;
use geoharvest_metrics::metric_defs;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Default bands composited into a preview, in R, G, B order.
pub const PREVIEW_BANDS: [&str; 3] = ["B04", "B03", "B02"];

/// File name of the preview inside a scene directory.
pub const PREVIEW_FILE_NAME: &str = "preview.jpg";

/// JPEG quality of previews.
pub const PREVIEW_QUALITY: u8 = 85;

/// Path of a band raster inside a scene directory.
pub fn band_path(scene_dir: &Path, band: &str) -> PathBuf {
    scene_dir.join(format!("{}.tif", band))
}

/// What a render call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewOutcome {
    /// A new preview was written.
    Rendered(PathBuf),
    /// A preview already existed and the policy says to keep it.
    AlreadyPresent(PathBuf),
    /// These bands are not on disk yet; nothing was written.
    MissingBands(Vec<String>),
}

/// Renders `preview.jpg` for scene directories.
#[derive(Debug, Clone)]
pub struct PreviewRenderer {
    bands: [String; 3],
    params: StretchParams,
    quality: u8,
    policy: ArtifactPolicy,
}

impl Default for PreviewRenderer {
    fn default() -> Self {
        Self {
            bands: PREVIEW_BANDS.map(String::from),
            params: StretchParams::default(),
            quality: PREVIEW_QUALITY,
            policy: ArtifactPolicy::SkipExisting,
        }
    }
}

impl PreviewRenderer {
    /// Create a renderer with default stretch parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the red, green and blue band names.
    pub fn with_bands<S: Into<String>>(mut self, bands: [S; 3]) -> Self {
        self.bands = bands.map(Into::into);
        self
    }

    /// Band names in R, G, B order.
    pub fn bands(&self) -> &[String; 3] {
        &self.bands
    }

    /// Set the stretch parameters.
    pub fn with_params(mut self, params: StretchParams) -> Self {
        self.params = params;
        self
    }

    /// Set only the gamma exponent.
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.params.gamma = gamma;
        self
    }

    /// Set the JPEG quality (1-100).
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Set what happens when a preview already exists.
    pub fn with_policy(mut self, policy: ArtifactPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Stretch parameters in use.
    pub fn params(&self) -> &StretchParams {
        &self.params
    }

    /// Render the preview of `scene_dir` if its bands are present.
    pub fn render(&self, scene_dir: &Path) -> Result<PreviewOutcome> {
        let dest = scene_dir.join(PREVIEW_FILE_NAME);
        if !self.policy.should_write(&dest) {
            debug!(dest = %dest.display(), "preview already present");
            return Ok(PreviewOutcome::AlreadyPresent(dest));
        }

        let missing: Vec<String> = self
            .bands
            .iter()
            .filter(|band| !band_path(scene_dir, band).exists())
            .cloned()
            .collect();
        if !missing.is_empty() {
            debug!(scene = %scene_dir.display(), ?missing, "bands missing, no preview");
            return Ok(PreviewOutcome::MissingBands(missing));
        }

        let started = Instant::now();
        let [red, green, blue] = &self.bands;
        let bands = [
            read_band(&band_path(scene_dir, red))?,
            read_band(&band_path(scene_dir, green))?,
            read_band(&band_path(scene_dir, blue))?,
        ];
        let image = self.compose(&bands)?;
        write_jpeg(&image, &dest, self.quality)?;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        metrics::counter!(metric_defs::PREVIEWS_RENDERED.name).increment(1);
        metrics::histogram!(metric_defs::PREVIEW_RENDER_TIME.name).record(elapsed_ms);
        info!(dest = %dest.display(), elapsed_ms, "rendered preview");

        Ok(PreviewOutcome::Rendered(dest))
    }

    /// Stretch three bands and interleave them into an RGB image.
    pub fn compose(&self, bands: &[Band; 3]) -> Result<RgbImage> {
        let (width, height) = bands[0].dimensions();
        for (band, name) in bands.iter().zip(&self.bands) {
            if band.dimensions() != (width, height) {
                return Err(RenderError::DimensionMismatch {
                    band: name.clone(),
                    expected: (width, height),
                    found: band.dimensions(),
                });
            }
        }

        let channels: Vec<Vec<f64>> = bands
            .iter()
            .map(|band| stretch_channel(&band.data, &self.params))
            .collect();

        let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
        for i in 0..width as usize * height as usize {
            for channel in &channels {
                pixels.push(to_byte(channel[i]));
            }
        }

        RgbImage::from_raw(width, height, pixels).ok_or_else(|| RenderError::UnsupportedLayout {
            path: PathBuf::new(),
            message: format!("{} samples do not fill {}x{}", bands[0].data.len(), width, height),
        })
    }
}
