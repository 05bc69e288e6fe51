//! Error types for the fetch crate.

use thiserror::Error;

/// Errors that can occur while downloading a file.
#[derive(Debug, Error)]
pub enum FetchError {
    /// I/O error writing the destination file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request error (connection, TLS, body read). The request URL is
    /// stripped so query-string credentials never reach logs or reports.
    #[error("HTTP request error: {0}")]
    Request(reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    Http {
        /// Requested URL.
        url: String,
        /// Status code returned by the server.
        status: u16,
    },

    /// The destination path has no parent directory or file name.
    #[error("Invalid destination path: {0}")]
    InvalidDestination(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Request(e.without_url())
    }
}

impl FetchError {
    /// Returns the HTTP status if the failure was a non-success response.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            FetchError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
