//! Error types for the catalog crate.

use thiserror::Error;

/// Maximum number of response-body characters kept in an error.
pub(crate) const MAX_RAW_CHARS: usize = 500;

/// Errors that can occur when querying a catalog collaborator.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request error (connection, TLS, body read). The request URL is
    /// stripped so query-string credentials never reach logs or reports.
    #[error("HTTP request error: {0}")]
    Request(reqwest::Error),

    /// The service answered with a non-success status.
    #[error("{context} returned HTTP {status}: {raw}")]
    Http {
        /// Which call failed.
        context: String,
        /// Status code returned by the service.
        status: u16,
        /// Start of the response body.
        raw: String,
    },

    /// A response lacks the structure the source depends on (e.g. a mosaic
    /// descriptor without a quads link). Fatal for the source that hit it.
    #[error("Configuration error: {message}; response was: {raw}")]
    Configuration {
        /// What was expected.
        message: String,
        /// Start of the response body.
        raw: String,
    },

    /// A response could not be parsed.
    #[error("Malformed response: {message}; response was: {raw}")]
    Malformed {
        /// What went wrong.
        message: String,
        /// Start of the response body.
        raw: String,
    },
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        CatalogError::Request(e.without_url())
    }
}

impl CatalogError {
    pub(crate) fn http(context: impl Into<String>, status: u16, raw: &str) -> Self {
        CatalogError::Http {
            context: context.into(),
            status,
            raw: truncate_raw(raw),
        }
    }

    pub(crate) fn configuration(message: impl Into<String>, raw: &str) -> Self {
        CatalogError::Configuration {
            message: message.into(),
            raw: truncate_raw(raw),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>, raw: &str) -> Self {
        CatalogError::Malformed {
            message: message.into(),
            raw: truncate_raw(raw),
        }
    }
}

/// Keep the first [`MAX_RAW_CHARS`] characters of a response body.
pub(crate) fn truncate_raw(raw: &str) -> String {
    if raw.chars().count() > MAX_RAW_CHARS {
        let mut s: String = raw.chars().take(MAX_RAW_CHARS).collect();
        s.push('…');
        s
    } else {
        raw.to_string()
    }
}
