//! Percentile contrast stretch.
//!
//! Each channel is scaled to reflectance, clipped to its own 2nd..98th
//! percentile window, normalised to `[0, 1]` and gamma corrected:
//!
//! ```text
//! v' = clip((v - p_lo) / (p_hi - p_lo + eps), 0, 1) ^ gamma
//! ```

/// Sentinel-2 L2A digital numbers to surface reflectance.
pub const REFLECTANCE_SCALE: f64 = 0.0001;

/// Added to the window width so flat channels do not divide by zero.
pub const STRETCH_EPSILON: f64 = 1e-6;

/// Parameters of the stretch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StretchParams {
    /// Multiplier applied to every sample first.
    pub scale: f64,
    /// Lower percentile of the window (0-100).
    pub low_percentile: f64,
    /// Upper percentile of the window (0-100).
    pub high_percentile: f64,
    /// Exponent applied after normalisation. Values below 1 brighten midtones.
    pub gamma: f64,
}

impl Default for StretchParams {
    fn default() -> Self {
        Self {
            scale: REFLECTANCE_SCALE,
            low_percentile: 2.0,
            high_percentile: 98.0,
            gamma: 0.8,
        }
    }
}

/// Percentile of already sorted values, interpolating linearly between the
/// two closest ranks. Returns `None` for an empty slice.
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// The `(low, high)` window of a channel, computed over finite samples only.
pub fn window(samples: &[f32], params: &StretchParams) -> (f64, f64) {
    let mut finite: Vec<f64> = samples
        .iter()
        .map(|&v| v as f64 * params.scale)
        .filter(|v| v.is_finite())
        .collect();
    finite.sort_by(|a, b| a.total_cmp(b));

    let low = percentile(&finite, params.low_percentile).unwrap_or(0.0);
    let high = percentile(&finite, params.high_percentile).unwrap_or(0.0);
    (low, high)
}

/// Stretch one channel to `[0, 1]`. Non-finite samples stay non-finite.
pub fn stretch_channel(samples: &[f32], params: &StretchParams) -> Vec<f64> {
    let (low, high) = window(samples, params);
    let width = high - low + STRETCH_EPSILON;

    samples
        .iter()
        .map(|&v| {
            let norm = (v as f64 * params.scale - low) / width;
            norm.clamp(0.0, 1.0).powf(params.gamma)
        })
        .collect()
}

/// Convert a stretched value to a byte: `* 255` then truncate.
///
/// NaN maps to 0.
pub fn to_byte(v: f64) -> u8 {
    (v * 255.0) as u8
}
