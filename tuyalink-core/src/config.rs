//! Client configuration.
//!
//! [`ClientConfig`] carries the three credentials the cloud issues to a
//! project (base URL, client id, client secret) plus the tuning knobs for
//! timeouts and fan-out. Loading it from files or the environment is the
//! caller's concern.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ClientError, Result};
use crate::secret::Secret;

/// Default cloud data center.
pub const DEFAULT_BASE_URL: &str = "https://openapi.tuyaeu.com";

/// Maximum number of status fetches in flight during aggregation.
pub const CONCURRENCY_LIMIT: usize = 5;

/// Default page size for the device listing call.
pub const DEFAULT_DEVICE_PAGE_SIZE: u32 = 20;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_AGGREGATE_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for a [`TuyaClient`](crate::TuyaClient).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the cloud API, without a trailing slash.
    pub base_url: String,

    /// Project access id.
    pub client_id: String,

    /// Project access secret. Keys every request signature.
    pub client_secret: Secret,

    /// Per-call timeout applied by the HTTP client.
    #[serde(default = "default_request_timeout", with = "duration_secs")]
    pub request_timeout: Duration,

    /// TCP connect timeout.
    #[serde(default = "default_connect_timeout", with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Upper bound on concurrent status fetches.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// `page_size` sent to the device listing endpoint.
    #[serde(default = "default_device_page_size")]
    pub device_page_size: u32,

    /// Deadline for one whole aggregate call.
    #[serde(default = "default_aggregate_timeout", with = "duration_secs")]
    pub aggregate_timeout: Duration,
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_concurrency_limit() -> usize {
    CONCURRENCY_LIMIT
}

fn default_device_page_size() -> u32 {
    DEFAULT_DEVICE_PAGE_SIZE
}

fn default_aggregate_timeout() -> Duration {
    DEFAULT_AGGREGATE_TIMEOUT
}

impl ClientConfig {
    /// Create a configuration with default tuning.
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<Secret>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            client_id: client_id.into().trim().to_string(),
            client_secret: client_secret.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            concurrency_limit: CONCURRENCY_LIMIT,
            device_page_size: DEFAULT_DEVICE_PAGE_SIZE,
            aggregate_timeout: DEFAULT_AGGREGATE_TIMEOUT,
        }
    }

    /// Set the per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the TCP connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the fan-out bound used by the aggregator.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// Set the page size for the device listing call.
    pub fn with_device_page_size(mut self, page_size: u32) -> Self {
        self.device_page_size = page_size;
        self
    }

    /// Set the deadline for one aggregate call.
    pub fn with_aggregate_timeout(mut self, timeout: Duration) -> Self {
        self.aggregate_timeout = timeout;
        self
    }

    /// Check that every required value is present and usable.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::config("base URL is missing"));
        }
        let url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::config(format!("invalid base URL {:?}: {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::config(format!(
                "base URL must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.client_id.trim().is_empty() {
            return Err(ClientError::config("client id is missing"));
        }
        if self.client_secret.is_blank() {
            return Err(ClientError::config("client secret is missing"));
        }
        if self.concurrency_limit == 0 {
            return Err(ClientError::config("concurrency limit must be at least 1"));
        }
        if self.device_page_size == 0 {
            return Err(ClientError::config("device page size must be at least 1"));
        }
        for (name, timeout) in [
            ("request timeout", self.request_timeout),
            ("connect timeout", self.connect_timeout),
            ("aggregate timeout", self.aggregate_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ClientError::config(format!("{} must be greater than zero", name)));
            }
        }
        Ok(())
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_base_url() {
        let config = ClientConfig::new(" https://openapi.tuyaeu.com/ ", "id", "secret");
        assert_eq!(config.base_url, "https://openapi.tuyaeu.com");
        assert_eq!(config.concurrency_limit, CONCURRENCY_LIMIT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_values() {
        let missing_id = ClientConfig::new(DEFAULT_BASE_URL, "", "secret");
        assert!(matches!(missing_id.validate(), Err(ClientError::Config { .. })));

        let missing_secret = ClientConfig::new(DEFAULT_BASE_URL, "id", "  ");
        assert!(matches!(missing_secret.validate(), Err(ClientError::Config { .. })));

        let missing_url = ClientConfig::new("", "id", "secret");
        assert!(matches!(missing_url.validate(), Err(ClientError::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_url_and_limits() {
        let bad_scheme = ClientConfig::new("ftp://example.com", "id", "secret");
        assert!(bad_scheme.validate().is_err());

        let garbage = ClientConfig::new("not a url", "id", "secret");
        assert!(garbage.validate().is_err());

        let zero_limit = ClientConfig::new(DEFAULT_BASE_URL, "id", "secret").with_concurrency_limit(0);
        assert!(zero_limit.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let base = ClientConfig::new(DEFAULT_BASE_URL, "id", "secret");

        let zero_request = base.clone().with_request_timeout(Duration::ZERO);
        assert!(matches!(zero_request.validate(), Err(ClientError::Config { .. })));

        let zero_connect = base.clone().with_connect_timeout(Duration::ZERO);
        assert!(matches!(zero_connect.validate(), Err(ClientError::Config { .. })));

        let zero_aggregate = base.clone().with_aggregate_timeout(Duration::ZERO);
        let err = zero_aggregate.validate().unwrap_err();
        assert!(err.to_string().contains("aggregate timeout"));

        let sub_second = base.with_request_timeout(Duration::from_millis(200));
        assert!(sub_second.validate().is_ok());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"base_url": "https://example.com", "client_id": "id", "client_secret": "s", "request_timeout": 5}"#,
        )
        .unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.device_page_size, DEFAULT_DEVICE_PAGE_SIZE);
    }
}
