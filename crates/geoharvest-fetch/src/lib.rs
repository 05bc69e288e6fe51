//! # geoharvest-fetch
//!
//! Idempotent streaming downloads for every geoharvest source.
//!
//! A fetch of an existing destination is a no-op that always succeeds. This
//! single rule is what makes the pipeline safe to kill and restart: completed
//! files are skipped and work resumes at the first missing file.
//!
//! ## Examples
//!
//! ```no_run
//! use geoharvest_fetch::{Fetch, FetchOutcome, HttpFetcher};
//! use std::path::Path;
//!
//! let fetcher = HttpFetcher::new()?;
//! let dest = Path::new("data_tiles/13S042W.hgt.zip");
//!
//! match fetcher.fetch("https://srtm-pds.s3.amazonaws.com/SRTM1/13S042W.hgt.zip", dest)? {
//!     FetchOutcome::Downloaded { bytes } => println!("downloaded {} bytes", bytes),
//!     FetchOutcome::AlreadyPresent => println!("already on disk"),
//! }
//!
//! // The second call never touches the network.
//! assert_eq!(fetcher.fetch("https://unused.invalid/", dest)?, FetchOutcome::AlreadyPresent);
//! # Ok::<(), geoharvest_fetch::FetchError>(())
//! ```

mod error;
mod fetcher;

pub use error::FetchError;
pub use fetcher::{
    part_path, redact_query, write_atomically, DownloadStats, Fetch, FetchOutcome, HttpFetcher,
    DEFAULT_CHUNK_SIZE,
};

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;
