//! Error types for the runner.

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a command.
///
/// Per-item failures never surface here; they are recorded in the
/// [`BatchReport`](geoharvest_common::BatchReport) of the run.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The acquisition root could not be created.
    #[error("Cannot create output directory {path}: {source}")]
    OutputRoot {
        /// Requested root.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// I/O error outside any single item.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport setup error.
    #[error("Fetch error: {0}")]
    Fetch(#[from] geoharvest_fetch::FetchError),

    /// Catalog client setup error.
    #[error("Catalog error: {0}")]
    Catalog(#[from] geoharvest_catalog::CatalogError),

    /// Gallery setup error.
    #[error("Render error: {0}")]
    Render(#[from] geoharvest_render::RenderError),

    /// Classifier setup error.
    #[error("Classification error: {0}")]
    Classify(#[from] geoharvest_classify::ClassifyError),
}
