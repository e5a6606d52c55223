//! Client configuration.
//!
//! Everything has a default except the base URL. Configs load from JSON:
//!
//! ```json
//! {
//!   "base_url": "https://maps.bouldercolorado.gov/arcgis2/rest/services/osmp/Trails/MapServer/",
//!   "default_layer": 4,
//!   "page_size": 1000,
//!   "timeout_secs": 30,
//!   "retry": { "max_attempts": 3 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::identifiers::LayerId;
use crate::models::query::DEFAULT_RESULT_LIMIT;
use crate::retry::RetryPolicy;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest GET URL sent before switching to a form-encoded POST.
pub const DEFAULT_MAX_GET_URL_LEN: usize = 2048;

pub const DEFAULT_OUT_SR: u32 = 4326;

const DEFAULT_USER_AGENT: &str = concat!("arcgis-mapserver/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// MapServer root, e.g. `.../rest/services/osmp/Trails/MapServer/`.
    pub base_url: String,
    pub default_layer: Option<LayerId>,
    /// Page size the server advertises (`maxRecordCount`).
    pub page_size: u32,
    /// Per-request timeout, covering connect through the last body byte.
    #[serde(rename = "timeout_secs", with = "duration_secs")]
    pub timeout: Duration,
    /// Output spatial reference (wkid) requested for geometries.
    pub out_sr: u32,
    pub max_get_url_len: usize,
    pub user_agent: String,
    /// Used by callers wrapping requests in [`RetryPolicy::run`]; the client
    /// itself never retries.
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            default_layer: None,
            page_size: DEFAULT_RESULT_LIMIT,
            timeout: DEFAULT_TIMEOUT,
            out_sr: DEFAULT_OUT_SR,
            max_get_url_len: DEFAULT_MAX_GET_URL_LEN,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_default_layer(mut self, layer: LayerId) -> Self {
        self.default_layer = Some(layer);
        self
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the config and return the base URL with a trailing slash, so
    /// layer paths can be joined onto it.
    pub fn validate(&self) -> Result<Url, ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        let invalid = |message: &str| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            message: message.to_string(),
        };

        let mut url = Url::parse(self.base_url.trim()).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if url.query().is_some() {
            return Err(invalid("must not carry a query string"));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_appends_trailing_slash() {
        let config = ClientConfig::new("https://example.com/rest/services/osmp/Trails/MapServer");
        let url = config.validate().unwrap();
        assert_eq!(url.as_str(), "https://example.com/rest/services/osmp/Trails/MapServer/");
        assert_eq!(
            url.join("4/query").unwrap().as_str(),
            "https://example.com/rest/services/osmp/Trails/MapServer/4/query"
        );
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        assert!(matches!(
            ClientConfig::new("not a url").validate(),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            ClientConfig::new("ftp://example.com/MapServer").validate(),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            ClientConfig::new("https://example.com/MapServer?f=json").validate(),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            ClientConfig::new("https://example.com/").with_page_size(0).validate(),
            Err(ConfigError::ZeroPageSize)
        ));
        assert!(matches!(
            ClientConfig::new("https://example.com/")
                .with_timeout(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroTimeout)
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"base_url": "https://example.com/MapServer/", "timeout_secs": 2.5, "default_layer": 7}"#,
        )
        .unwrap();

        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.default_layer, Some(LayerId::new(7)));
        assert_eq!(config.page_size, DEFAULT_RESULT_LIMIT);
        assert_eq!(config.out_sr, 4326);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_negative_timeout_is_rejected() {
        let result: Result<ClientConfig, _> =
            serde_json::from_str(r#"{"base_url": "https://example.com/", "timeout_secs": -1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file_reports_path() {
        let err = ClientConfig::from_file("/nonexistent/mapserver.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/mapserver.json"));
    }
}
