//! Error types for the classify crate.

use thiserror::Error;

/// Maximum number of response-body characters kept in an error.
const MAX_RAW_CHARS: usize = 500;

/// Errors that can occur while classifying images.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image could not be decoded or re-encoded.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// HTTP request error (connection, TLS, body read). The request URL is
    /// stripped so query-string credentials never reach logs or reports.
    #[error("HTTP request error: {0}")]
    Request(reqwest::Error),

    /// The model API answered with a non-success status.
    #[error("Model API returned HTTP {status}: {raw}")]
    Http {
        /// Status code.
        status: u16,
        /// Start of the response body.
        raw: String,
    },

    /// A response or model answer was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response had no message content.
    #[error("Response has no message content: {raw}")]
    MissingContent {
        /// Start of the response body.
        raw: String,
    },

    /// Results table error.
    #[error("Results table error: {0}")]
    Csv(#[from] csv::Error),

    /// No API key was configured.
    #[error("No API key configured (set OPENAI_API_KEY)")]
    MissingApiKey,
}

impl From<reqwest::Error> for ClassifyError {
    fn from(e: reqwest::Error) -> Self {
        ClassifyError::Request(e.without_url())
    }
}

impl ClassifyError {
    pub(crate) fn http(status: u16, raw: &str) -> Self {
        ClassifyError::Http {
            status,
            raw: raw.chars().take(MAX_RAW_CHARS).collect(),
        }
    }

    pub(crate) fn missing_content(raw: &str) -> Self {
        ClassifyError::MissingContent {
            raw: raw.chars().take(MAX_RAW_CHARS).collect(),
        }
    }
}
