//! Configuration for the native adapter.

use std::time::Duration;

/// Tuning knobs for [`NativeAdapter`](crate::NativeAdapter).
#[derive(Debug, Clone)]
pub struct NativeAdapterConfig {
    /// Maximum number of repositories whose tags are listed concurrently.
    pub tag_list_concurrency: usize,

    /// Page size requested from `/v2/_catalog`.
    pub page_size: usize,

    /// Per-request timeout.
    pub request_timeout: Duration,

    /// User agent string.
    pub user_agent: String,
}

impl Default for NativeAdapterConfig {
    fn default() -> Self {
        Self {
            tag_list_concurrency: 5,
            page_size: 100,
            request_timeout: Duration::from_secs(30),
            user_agent: format!("ferry-adapter/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl NativeAdapterConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tag listing concurrency.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferry_adapter::NativeAdapterConfig;
    ///
    /// let config = NativeAdapterConfig::new().with_tag_list_concurrency(2);
    /// assert_eq!(config.tag_list_concurrency, 2);
    /// ```
    #[must_use]
    pub const fn with_tag_list_concurrency(mut self, concurrency: usize) -> Self {
        self.tag_list_concurrency = concurrency;
        self
    }

    /// Sets the catalog page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NativeAdapterConfig::default();
        assert_eq!(config.tag_list_concurrency, 5);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("ferry-adapter/"));
    }
}
