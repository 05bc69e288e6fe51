//! Conditional streaming downloads.
//!
//! The whole pipeline is re-runnable because of one rule enforced here: if the
//! destination file exists, a fetch is a no-op. To make "exists" trustworthy,
//! bodies are streamed into a sibling `*.part` file that is renamed over the
//! destination only after the last chunk is written. An interrupted or failed
//! transfer never leaves a file at the destination path.

use crate::{FetchError, Result};
use std::fs;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Size of the buffer used to stream response bodies to disk.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Suffix appended to the destination file name while a transfer is running.
const PART_SUFFIX: &str = ".part";

/// Result of a successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The file was transferred and written.
    Downloaded {
        /// Number of bytes written.
        bytes: u64,
    },
    /// The destination already existed; nothing was transferred.
    AlreadyPresent,
}

/// A transport that can materialise a URL at a local path.
///
/// Implementations must treat an existing destination as finished work and
/// must either write the complete file or leave the destination untouched.
pub trait Fetch {
    /// Download `url` to `dest` unless `dest` already exists.
    fn fetch(&self, url: &str, dest: &Path) -> Result<FetchOutcome>;
}

/// Download statistics for a fetcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadStats {
    /// Number of files downloaded this session.
    pub files_downloaded: usize,
    /// Total bytes downloaded this session.
    pub bytes_downloaded: u64,
    /// Number of fetches skipped because the file was already present.
    pub files_skipped: usize,
}

/// Blocking HTTP fetcher.
///
/// No request timeout is configured: large band rasters can take minutes to
/// stream, so the connection handling of the underlying client governs.
pub struct HttpFetcher {
    /// HTTP client for downloading files.
    client: reqwest::blocking::Client,
    /// Buffer size used when streaming bodies to disk.
    chunk_size: usize,
    /// Number of files downloaded this session.
    files_downloaded: AtomicUsize,
    /// Total bytes downloaded this session.
    bytes_downloaded: AtomicU64,
    /// Number of fetches skipped this session.
    files_skipped: AtomicUsize,
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("chunk_size", &self.chunk_size)
            .field("stats", &self.download_stats())
            .finish()
    }
}

impl HttpFetcher {
    /// Create a fetcher with the default chunk size.
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(None::<Duration>)
            .user_agent(concat!("geoharvest/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client))
    }

    /// Create a fetcher around an existing client.
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self {
            client,
            chunk_size: DEFAULT_CHUNK_SIZE,
            files_downloaded: AtomicUsize::new(0),
            bytes_downloaded: AtomicU64::new(0),
            files_skipped: AtomicUsize::new(0),
        }
    }

    /// Set the streaming buffer size (minimum 1 byte).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Get download statistics for this session.
    pub fn download_stats(&self) -> DownloadStats {
        DownloadStats {
            files_downloaded: self.files_downloaded.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
        }
    }

    /// Reset download statistics.
    pub fn reset_download_stats(&self) {
        self.files_downloaded.store(0, Ordering::Relaxed);
        self.bytes_downloaded.store(0, Ordering::Relaxed);
        self.files_skipped.store(0, Ordering::Relaxed);
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<FetchOutcome> {
        // Fast path: existing file means the work is done.
        if dest.exists() {
            self.files_skipped.fetch_add(1, Ordering::Relaxed);
            debug!(dest = %dest.display(), "already present, skipping download");
            return Ok(FetchOutcome::AlreadyPresent);
        }

        info!(dest = %dest.display(), "downloading");
        let response = self.client.get(url).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: redact_query(url),
                status: status.as_u16(),
            });
        }

        let bytes = write_atomically(response, dest, self.chunk_size)?;

        self.files_downloaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);

        Ok(FetchOutcome::Downloaded { bytes })
    }
}

/// Stream `reader` into `dest` through a temporary `*.part` sibling.
///
/// Parent directories are created as needed. On success the part file is
/// renamed over `dest` and the number of bytes written is returned; on failure
/// the part file is removed and `dest` is left untouched.
pub fn write_atomically<R: Read>(mut reader: R, dest: &Path, chunk_size: usize) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let part = part_path(dest)?;
    match stream_to_file(&mut reader, &part, chunk_size.max(1)) {
        Ok(bytes) => {
            fs::rename(&part, dest)?;
            Ok(bytes)
        }
        Err(e) => {
            // Best effort: the part file is garbage either way.
            let _ = fs::remove_file(&part);
            Err(e)
        }
    }
}

/// Path of the temporary file used while `dest` is being written.
pub fn part_path(dest: &Path) -> Result<PathBuf> {
    let name = dest
        .file_name()
        .ok_or_else(|| FetchError::InvalidDestination(dest.display().to_string()))?;
    let mut part_name = name.to_os_string();
    part_name.push(PART_SUFFIX);
    Ok(dest.with_file_name(part_name))
}

fn stream_to_file<R: Read>(reader: &mut R, path: &Path, chunk_size: usize) -> Result<u64> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::with_capacity(chunk_size, file);
    let mut buf = vec![0u8; chunk_size];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(total)
}

/// Strip the query string so signed URLs and API keys stay out of logs.
pub fn redact_query(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{}?…", base),
        None => url.to_string(),
    }
}
