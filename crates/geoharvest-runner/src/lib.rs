//! Runner for the geoharvest acquisition pipeline.
//!
//! Loads a [`HarvestConfig`], drives the sources through an [`Acquisition`],
//! and wires the gallery and classification stages. Every stage returns a
//! [`BatchReport`](geoharvest_common::BatchReport); only setup problems are
//! errors.
//!
//! # Example
//!
//! ```rust,no_run
//! use geoharvest_runner::{pipeline, HarvestConfig};
//!
//! let config = HarvestConfig::default();
//! let report = pipeline::run(&config, std::env::var("PL_API_KEY").ok().as_deref())?;
//! println!("{}", report.summary());
//! # Ok::<(), geoharvest_runner::RunnerError>(())
//! ```

pub mod config;
mod error;
pub mod orchestrator;
pub mod pipeline;

pub use config::{ConfigError, HarvestConfig};
pub use error::RunnerError;
pub use orchestrator::{
    Acquisition, AcquisitionPlan, BandState, SceneManifest, Sources, MANIFEST_FILE_NAME,
    METADATA_FILE_NAME, REPORT_FILE_NAME,
};

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
