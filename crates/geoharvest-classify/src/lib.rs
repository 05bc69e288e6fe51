//! # geoharvest-classify
//!
//! Asks a vision model whether each gallery image shows lakes or rivers and
//! appends positive answers to `water_detections.csv`.
//!
//! Each image is independent: a failed encode or model call is logged,
//! recorded in the [`BatchReport`](geoharvest_common::BatchReport) and counted
//! as negative, and the pass moves on. Rows are appended as soon as they are
//! known, so an interrupted pass keeps everything found so far.
//!
//! ## Examples
//!
//! ```no_run
//! use geoharvest_classify::{ClassificationPass, OpenAiClassifier, ResultsTable};
//!
//! let classifier = OpenAiClassifier::new(std::env::var("OPENAI_API_KEY").unwrap_or_default())?;
//! let table = ResultsTable::open("water_detections.csv")?;
//! let report = ClassificationPass::new("preview_tiles", table).run(&classifier)?;
//! println!("{}", report.summary());
//! # Ok::<(), geoharvest_classify::ClassifyError>(())
//! ```

pub mod classifier;
pub mod encode;
mod error;
pub mod pass;
pub mod results;

pub use classifier::{Classifier, ImageRequest, MockClassifier, OpenAiClassifier, WATER_PROMPT};
pub use encode::encode_image;
pub use error::ClassifyError;
pub use pass::{gallery_images, ClassificationPass, GalleryImage};
pub use results::{DetectionRecord, ResultsTable, RESULTS_FILE_NAME};

/// Result type for classification operations.
pub type Result<T> = std::result::Result<T, ClassifyError>;
