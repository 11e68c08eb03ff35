//! Error types raised while fetching state statistics.

use thiserror::Error;

/// Errors raised by a single retrieval operation.
///
/// Every failure aborts only the operation that produced it. Nothing is
/// retried automatically; the alternate data source is consulted for stale
/// data, never for errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// The feature service answered with a structured `error` object.
    #[error("provider error for {url}: {payload}")]
    Provider {
        /// The provider's `error` payload, unchanged.
        payload: serde_json::Value,
        /// The request URL that produced the error.
        url: String,
    },

    /// The request could not be sent or the body could not be read.
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Fully qualified request URL.
        url: String,
        /// Source error from `reqwest`.
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status and no `error` body.
    #[error("request to {url} failed with status {status}")]
    Status {
        /// Fully qualified request URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The body was not a feature-query document of the expected shape.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        /// Fully qualified request URL.
        url: String,
        /// Source error from `serde_json`.
        #[source]
        source: serde_json::Error,
    },

    /// A response needed for its as-of date contained no features.
    #[error("response from {url} contained no features to read a Datenstand from")]
    MissingTimestamp {
        /// Fully qualified request URL.
        url: String,
    },

    /// A provider date could not be parsed.
    #[error("unrecognised date {raw:?}")]
    InvalidDate {
        /// The raw value as received.
        raw: String,
    },

    /// An attribute held a value that cannot be mapped to the output schema.
    #[error("attribute {field} has unusable value {value:?}")]
    InvalidAttribute {
        /// Provider attribute name.
        field: &'static str,
        /// The raw value as received.
        value: String,
    },

    /// The data was stale but no alternate source is configured.
    #[error("primary data is stale and no alternate data source is configured")]
    AlternateUnavailable,
}

impl FetchError {
    /// Whether this error came from the provider itself rather than the network.
    pub fn is_provider_error(&self) -> bool {
        matches!(self, FetchError::Provider { .. })
    }

    /// The request URL associated with this error, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            FetchError::Provider { url, .. }
            | FetchError::Transport { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Decode { url, .. }
            | FetchError::MissingTimestamp { url } => Some(url),
            FetchError::InvalidDate { .. }
            | FetchError::InvalidAttribute { .. }
            | FetchError::AlternateUnavailable => None,
        }
    }
}
