//! Typed wrapper for the replication endpoint.

use std::fmt;

/// Host used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://overpass-api.de";

/// Base URL of an augmented diff feed.
///
/// # Examples
/// ```
/// # use osmdiff_data::replication::BaseUrl;
/// let url = BaseUrl::new("https://example.org/adiff/");
/// assert_eq!(url.as_ref(), "https://example.org/adiff");
/// assert_eq!(url.join("status"), "https://example.org/adiff/status");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    /// Trim trailing slashes and fall back to [`DEFAULT_BASE_URL`] when
    /// nothing remains.
    pub fn new(value: impl Into<String>) -> Self {
        let raw = value.into();
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            Self(DEFAULT_BASE_URL.to_owned())
        } else {
            Self(trimmed.to_owned())
        }
    }

    /// Append a path segment.
    #[must_use]
    pub fn join(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }
}

impl Default for BaseUrl {
    fn default() -> Self {
        Self(DEFAULT_BASE_URL.to_owned())
    }
}

impl AsRef<str> for BaseUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
