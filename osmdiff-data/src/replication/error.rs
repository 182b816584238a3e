//! Error types produced by the replication source.

use std::io;

use thiserror::Error;

/// Failures of a single upstream request.
///
/// Every variant is transient from the source's point of view: the
/// request is retried after the configured delay.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The server returned an HTTP error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Fully qualified request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short error description supplied by the server.
        message: String,
    },
    /// The requested sequence has not been published yet.
    #[error("{url} has not been published yet")]
    NotPublished {
        /// Fully qualified request URL.
        url: String,
    },
    /// The request failed due to an I/O error.
    #[error("network error contacting {url}: {source}")]
    Network {
        /// Fully qualified request URL.
        url: String,
        /// I/O error reported by the transport.
        source: io::Error,
    },
    /// The response body could not be interpreted.
    #[error("unexpected response body from {url}: {message}")]
    Body {
        /// Fully qualified request URL.
        url: String,
        /// What was wrong with the body.
        message: String,
    },
    /// A gzip-compressed payload could not be inflated.
    #[error("failed to decompress sequence {sequence}: {source}")]
    Decompress {
        /// Sequence whose payload was corrupt.
        sequence: u64,
        /// Decoder error.
        source: io::Error,
    },
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    Client {
        /// Builder error.
        source: reqwest::Error,
    },
}

impl TransportError {
    /// Whether the error means "not published yet" rather than failure.
    #[must_use]
    pub const fn is_not_published(&self) -> bool {
        matches!(self, Self::NotPublished { .. })
    }
}

/// Non-transient failures that stop the source.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReplicationError {
    /// A relative start offset reaches before sequence zero.
    #[error("start offset {offset} is further back than latest sequence {latest}")]
    InvalidStart {
        /// Configured relative offset.
        offset: i64,
        /// Latest sequence reported upstream.
        latest: u64,
    },
    /// The configured retry limit was exceeded.
    #[error("giving up after {attempts} consecutive failures: {source}")]
    RetriesExhausted {
        /// Failed attempts, including the last.
        attempts: u32,
        /// Error of the last attempt.
        source: TransportError,
    },
}
