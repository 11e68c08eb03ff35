//! Runtime configuration, read from the environment.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::data_sources::transport::DEFAULT_USER_AGENT;
use crate::data_sources::{DEFAULT_BASE_URL, DailyCutoff, HttpTransport, MirrorSource, Transport};
use crate::retriever::StatesRetriever;

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 3000;

/// Default UTC hour after which yesterday's data counts as stale.
pub const DEFAULT_STALE_AFTER_HOUR: u32 = 4;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Port the HTTP API listens on (`RKI_PORT`).
    pub port: u16,

    /// Root of the primary feature services (`RKI_ARCGIS_BASE_URL`).
    pub arcgis_base_url: String,

    /// Root of the alternate data source (`RKI_ALTERNATE_BASE_URL`).
    ///
    /// The staleness fallback is disabled when unset.
    pub alternate_base_url: Option<String>,

    /// UTC hour after which a `Datenstand` not dated today is stale (`RKI_STALE_AFTER_HOUR`).
    pub stale_after_hour: u32,

    /// Timeout for each outgoing request (`RKI_HTTP_TIMEOUT_SECS`).
    pub request_timeout: Duration,

    /// User agent for outgoing requests (`RKI_USER_AGENT`).
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            arcgis_base_url: DEFAULT_BASE_URL.to_string(),
            alternate_base_url: None,
            stale_after_hour: DEFAULT_STALE_AFTER_HOUR,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Unset or unparseable values fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            port: non_empty("RKI_PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            arcgis_base_url: non_empty("RKI_ARCGIS_BASE_URL").unwrap_or(defaults.arcgis_base_url),
            alternate_base_url: non_empty("RKI_ALTERNATE_BASE_URL"),
            stale_after_hour: non_empty("RKI_STALE_AFTER_HOUR")
                .and_then(|h| h.trim().parse().ok())
                .filter(|h| *h < 24)
                .unwrap_or(defaults.stale_after_hour),
            request_timeout: non_empty("RKI_HTTP_TIMEOUT_SECS")
                .and_then(|s| s.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            user_agent: non_empty("RKI_USER_AGENT").unwrap_or(defaults.user_agent),
        }
    }

    /// Build a retriever over HTTP, with the fallback enabled when an
    /// alternate base URL is configured.
    pub fn retriever(&self) -> reqwest::Result<StatesRetriever> {
        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(self.request_timeout, &self.user_agent)?);
        let retriever = StatesRetriever::new(transport.clone()).with_base_url(&self.arcgis_base_url);

        Ok(match &self.alternate_base_url {
            Some(mirror) => retriever.with_fallback(
                Arc::new(DailyCutoff::new(self.stale_after_hour)),
                Arc::new(MirrorSource::new(transport, &self.arcgis_base_url, mirror)),
            ),
            None => retriever,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(Config::from_lookup(lookup(&[])), Config::default());
    }

    #[test]
    fn test_reads_every_variable() {
        let config = Config::from_lookup(lookup(&[
            ("RKI_PORT", "8080"),
            ("RKI_ARCGIS_BASE_URL", "https://primary.test"),
            ("RKI_ALTERNATE_BASE_URL", "https://mirror.test"),
            ("RKI_STALE_AFTER_HOUR", "6"),
            ("RKI_HTTP_TIMEOUT_SECS", "5"),
            ("RKI_USER_AGENT", "tests/1.0"),
        ]));

        assert_eq!(config.port, 8080);
        assert_eq!(config.arcgis_base_url, "https://primary.test");
        assert_eq!(config.alternate_base_url.as_deref(), Some("https://mirror.test"));
        assert_eq!(config.stale_after_hour, 6);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "tests/1.0");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("RKI_PORT", "not-a-port"),
            ("RKI_STALE_AFTER_HOUR", "25"),
            ("RKI_ALTERNATE_BASE_URL", "  "),
        ]));

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.stale_after_hour, DEFAULT_STALE_AFTER_HOUR);
        assert_eq!(config.alternate_base_url, None);
    }
}
