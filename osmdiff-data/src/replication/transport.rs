//! Upstream access for the replication feed.

use std::{io, time::Duration};

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};

use super::{BaseUrl, TransportError};

/// Default user agent for feed requests.
pub const DEFAULT_USER_AGENT: &str = "osmdiff/0.1";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Status endpoint path served by Overpass.
pub const DEFAULT_STATUS_PATH: &str = "api/augmented_diff_status";

/// Payload endpoint path served by Overpass.
pub const DEFAULT_DIFF_PATH: &str = "api/augmented_diff";

/// Requests issued by the replication source.
#[async_trait(?Send)]
pub trait ReplicationTransport {
    /// Fetch the most recent published sequence number.
    async fn fetch_latest_sequence(&self) -> Result<u64, TransportError>;
    /// Fetch the raw, possibly compressed, payload for `sequence`.
    async fn fetch_diff(&self, sequence: u64) -> Result<Vec<u8>, TransportError>;
}

/// Configuration for [`HttpReplicationTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    /// Feed base URL.
    pub base_url: BaseUrl,
    /// Path of the latest-sequence endpoint, relative to `base_url`.
    pub status_path: String,
    /// Path of the payload endpoint, relative to `base_url`.
    pub diff_path: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            base_url: BaseUrl::default(),
            status_path: DEFAULT_STATUS_PATH.to_owned(),
            diff_path: DEFAULT_DIFF_PATH.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HttpTransportConfig {
    /// Create a configuration for the given feed.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: BaseUrl::new(base_url),
            ..Self::default()
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the status and payload endpoint paths.
    #[must_use]
    pub fn with_endpoints(
        mut self,
        status_path: impl Into<String>,
        diff_path: impl Into<String>,
    ) -> Self {
        self.status_path = status_path.into();
        self.diff_path = diff_path.into();
        self
    }

    /// URL answering with the latest published sequence.
    ///
    /// # Examples
    /// ```
    /// # use osmdiff_data::HttpTransportConfig;
    /// let config = HttpTransportConfig::default();
    /// assert_eq!(
    ///     config.status_url(),
    ///     "https://overpass-api.de/api/augmented_diff_status"
    /// );
    /// ```
    #[must_use]
    pub fn status_url(&self) -> String {
        self.base_url.join(&self.status_path)
    }

    /// URL serving the payload for `sequence`.
    #[must_use]
    pub fn diff_url(&self, sequence: u64) -> String {
        format!("{}?id={sequence}", self.base_url.join(&self.diff_path))
    }
}

/// HTTP implementation of [`ReplicationTransport`].
///
/// Issues `GET {base}/{status_path}` for the latest sequence and
/// `GET {base}/{diff_path}?id={sequence}` for payloads. A 404 on a payload
/// is reported as [`TransportError::NotPublished`].
#[derive(Debug)]
pub struct HttpReplicationTransport {
    client: Client,
    config: HttpTransportConfig,
}

impl HttpReplicationTransport {
    /// Build a transport from `config`.
    ///
    /// # Errors
    /// Returns [`TransportError::Client`] when the HTTP client cannot be
    /// constructed.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(config.timeout))
            .timeout(config.timeout)
            .build()
            .map_err(|source| TransportError::Client { source })?;
        Ok(Self { client, config })
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| convert_reqwest_error(err, url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(TransportError::NotPublished {
                url: url.to_owned(),
            });
        }
        let bytes = response
            .error_for_status()
            .map_err(|err| convert_reqwest_error(err, url))?
            .bytes()
            .await
            .map_err(|err| convert_reqwest_error(err, url))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait(?Send)]
impl ReplicationTransport for HttpReplicationTransport {
    async fn fetch_latest_sequence(&self) -> Result<u64, TransportError> {
        let url = self.config.status_url();
        let body = self.get(&url).await?;
        parse_latest_sequence(&body, &url)
    }

    async fn fetch_diff(&self, sequence: u64) -> Result<Vec<u8>, TransportError> {
        self.get(&self.config.diff_url(sequence)).await
    }
}

/// Parse the plain-text body of the status endpoint.
pub(crate) fn parse_latest_sequence(body: &[u8], url: &str) -> Result<u64, TransportError> {
    let invalid = |message: String| TransportError::Body {
        url: url.to_owned(),
        message,
    };
    let text = std::str::from_utf8(body).map_err(|err| invalid(err.to_string()))?;
    let trimmed = text.trim();
    trimmed
        .parse()
        .map_err(|_| invalid(format!("expected a sequence number, got {trimmed:?}")))
}

fn convert_reqwest_error(error: reqwest::Error, url: &str) -> TransportError {
    if let Some(status) = error.status() {
        return TransportError::Http {
            url: url.to_owned(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }

    let kind = if error.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    TransportError::Network {
        url: url.to_owned(),
        source: io::Error::new(kind, error),
    }
}
