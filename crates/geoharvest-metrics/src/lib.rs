//! Metrics declarations for the geoharvest pipeline.
//!
//! This crate describes every metric the pipeline records. It re-exports the
//! `metrics` crate for convenience and defines each metric as a structured
//! [`Metric`] constant to avoid typos and keep name, unit, and labels together.
//!
//! Recording goes through the `metrics` facade, so it is a no-op unless the
//! binary installs a recorder.
//!
//! # Example
//!
//! ```rust
//! use geoharvest_metrics::{metric_defs, Metric, MetricKind};
//!
//! assert_eq!(metric_defs::FETCH_DOWNLOADS.kind, MetricKind::Counter);
//!
//! metrics::counter!(metric_defs::FETCH_DOWNLOADS.name, "source" => "srtm").increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// Use the const constructors to declare metrics at compile time:
///
/// ```rust
/// use geoharvest_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const BYTES: Metric = Metric::counter("geoharvest.example.bytes")
///     .with_description("Bytes moved")
///     .with_unit(Unit::Bytes)
///     .with_labels(&["source"]);
///
/// assert_eq!(BYTES.name, "geoharvest.example.bytes");
/// assert_eq!(BYTES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "geoharvest.fetch.downloads").
    pub name: &'static str,
    /// The kind of metric (counter, gauge, histogram).
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Counter,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Gauge,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Histogram,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the metrics recorder.
    ///
    /// This should be called once at startup for each metric.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the pipeline.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Transport
    // ========================================================================

    /// Files downloaded.
    ///
    /// Labels: source (srtm, scene, mosaic)
    pub const FETCH_DOWNLOADS: Metric = Metric::counter("geoharvest.fetch.downloads")
        .with_description("Files downloaded")
        .with_unit(Unit::Count)
        .with_labels(&["source"]);

    /// Bytes written to disk by downloads.
    pub const FETCH_BYTES: Metric = Metric::counter("geoharvest.fetch.bytes")
        .with_description("Bytes written to disk by downloads")
        .with_unit(Unit::Bytes)
        .with_labels(&["source"]);

    /// Downloads skipped because the destination already existed.
    pub const FETCH_SKIPPED: Metric = Metric::counter("geoharvest.fetch.skipped")
        .with_description("Downloads skipped because the file already existed")
        .with_unit(Unit::Count)
        .with_labels(&["source"]);

    /// Downloads that failed.
    pub const FETCH_FAILURES: Metric = Metric::counter("geoharvest.fetch.failures")
        .with_description("Downloads that failed")
        .with_unit(Unit::Count)
        .with_labels(&["source"]);

    // ========================================================================
    // Derivation
    // ========================================================================

    /// Preview images rendered.
    pub const PREVIEWS_RENDERED: Metric = Metric::counter("geoharvest.render.previews")
        .with_description("Preview images rendered")
        .with_unit(Unit::Count);

    /// Time spent rendering one preview.
    pub const PREVIEW_RENDER_TIME: Metric = Metric::histogram("geoharvest.render.preview_time_ms")
        .with_description("Time spent rendering one preview in milliseconds")
        .with_unit(Unit::Milliseconds);

    /// Gallery entries written.
    pub const GALLERY_ENTRIES: Metric = Metric::counter("geoharvest.gallery.entries")
        .with_description("Gallery entries written")
        .with_unit(Unit::Count);

    // ========================================================================
    // Classification
    // ========================================================================

    /// Images submitted to the classifier.
    pub const IMAGES_CLASSIFIED: Metric = Metric::counter("geoharvest.classify.images")
        .with_description("Images submitted to the classifier")
        .with_unit(Unit::Count);

    /// Positive detections appended to the results table.
    pub const POSITIVE_DETECTIONS: Metric = Metric::counter("geoharvest.classify.positives")
        .with_description("Positive detections appended to the results table")
        .with_unit(Unit::Count);

    /// Classifier calls that failed and were treated as negative.
    pub const CLASSIFY_FAILURES: Metric = Metric::counter("geoharvest.classify.failures")
        .with_description("Classifier calls that failed and were treated as negative")
        .with_unit(Unit::Count);

    /// Every metric defined above.
    pub const ALL: &[&Metric] = &[
        &FETCH_DOWNLOADS,
        &FETCH_BYTES,
        &FETCH_SKIPPED,
        &FETCH_FAILURES,
        &PREVIEWS_RENDERED,
        &PREVIEW_RENDER_TIME,
        &GALLERY_ENTRIES,
        &IMAGES_CLASSIFIED,
        &POSITIVE_DETECTIONS,
        &CLASSIFY_FAILURES,
    ];
}

/// Describes all metrics used in the pipeline.
///
/// Call once at startup, after installing a recorder, to register metric
/// descriptions for exporters.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
