//! Client configuration
//!
//! Settings can be built explicitly or loaded from `NAUTOBOT_*` environment
//! variables.

use crate::error::{NautobotError, Result};
use std::env;
use std::time::Duration;

/// Default number of concurrent page fetches when threading is enabled
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Default request timeout handed to the HTTP client
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`crate::NautobotClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server URL without the `/api` suffix (e.g. `http://nautobot:8080`)
    pub url: String,
    /// API token sent as `Authorization: Token <token>`
    pub token: Option<String>,
    /// Fetch pages 2..N of list calls concurrently
    pub threading: bool,
    /// Pages in flight at once when threading
    pub max_workers: usize,
    /// Overrides the REST API version negotiated through the Accept header
    pub api_version: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Filters added to every list, get and count call unless overridden
    pub default_filters: Vec<(String, String)>,
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the URL and token
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            url: url.into(),
            token,
            threading: false,
            max_workers: DEFAULT_MAX_WORKERS,
            api_version: None,
            timeout: DEFAULT_TIMEOUT,
            default_filters: Vec::new(),
        }
    }

    /// Load configuration from the process environment
    ///
    /// Reads `NAUTOBOT_URL`, `NAUTOBOT_TOKEN`, `NAUTOBOT_API_VERSION`,
    /// `NAUTOBOT_THREADING`, `NAUTOBOT_MAX_WORKERS`, `NAUTOBOT_TIMEOUT_SECS`
    /// and `NAUTOBOT_EXCLUDE_M2M`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("NAUTOBOT_URL").unwrap_or_else(|| "http://localhost:8000".to_string());
        let mut config = Self::new(url, lookup("NAUTOBOT_TOKEN"));

        config.api_version = lookup("NAUTOBOT_API_VERSION");

        if let Some(raw) = lookup("NAUTOBOT_THREADING") {
            config.threading = parse_bool("NAUTOBOT_THREADING", &raw)?;
        }
        if let Some(raw) = lookup("NAUTOBOT_MAX_WORKERS") {
            let workers: usize = raw.parse().map_err(|_| {
                NautobotError::Config(format!(
                    "NAUTOBOT_MAX_WORKERS must be an integer, got {raw:?}"
                ))
            })?;
            if workers == 0 {
                return Err(NautobotError::Config(
                    "NAUTOBOT_MAX_WORKERS must be at least 1".to_string(),
                ));
            }
            config.max_workers = workers;
        }
        if let Some(raw) = lookup("NAUTOBOT_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                NautobotError::Config(format!(
                    "NAUTOBOT_TIMEOUT_SECS must be an integer, got {raw:?}"
                ))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup("NAUTOBOT_EXCLUDE_M2M") {
            config = config.exclude_m2m(parse_bool("NAUTOBOT_EXCLUDE_M2M", &raw)?);
        }

        Ok(config)
    }

    /// Fetch pages concurrently
    pub fn threading(mut self, threading: bool) -> Self {
        self.threading = threading;
        self
    }

    /// Concurrent page limit, at least 1
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Pin every request to an API version
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a filter sent with every list, get and count call
    pub fn default_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.default_filters.retain(|(k, _)| *k != key);
        self.default_filters.push((key, value.into()));
        self
    }

    /// Ask the server to leave many-to-many fields out of responses
    pub fn exclude_m2m(self, exclude: bool) -> Self {
        if exclude {
            self.default_filter("exclude_m2m", "true")
        } else {
            let mut config = self;
            config.default_filters.retain(|(k, _)| k != "exclude_m2m");
            config
        }
    }

    /// Base URL of the REST API (`<url>/api`)
    pub fn api_url(&self) -> String {
        let url = self.url.strip_suffix('/').unwrap_or(&self.url);
        format!("{url}/api")
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(NautobotError::Config(format!(
            "{name} must be a boolean, got {raw:?}"
        ))),
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
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.url, "http://localhost:8000");
        assert!(config.token.is_none());
        assert!(!config.threading);
        assert_eq!(config.max_workers, DEFAULT_MAX_WORKERS);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.default_filters.is_empty());
    }

    #[test]
    fn test_from_lookup_reads_everything() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("NAUTOBOT_URL", "https://nautobot.example.com/"),
            ("NAUTOBOT_TOKEN", "abc123"),
            ("NAUTOBOT_API_VERSION", "2.4"),
            ("NAUTOBOT_THREADING", "yes"),
            ("NAUTOBOT_MAX_WORKERS", "8"),
            ("NAUTOBOT_TIMEOUT_SECS", "5"),
            ("NAUTOBOT_EXCLUDE_M2M", "true"),
        ]))
        .unwrap();

        assert_eq!(config.api_url(), "https://nautobot.example.com/api");
        assert_eq!(config.token.as_deref(), Some("abc123"));
        assert_eq!(config.api_version.as_deref(), Some("2.4"));
        assert!(config.threading);
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(
            config.default_filters,
            vec![("exclude_m2m".to_string(), "true".to_string())]
        );
    }

    #[test]
    fn test_malformed_values_are_config_errors() {
        let err =
            ClientConfig::from_lookup(lookup(&[("NAUTOBOT_MAX_WORKERS", "many")])).unwrap_err();
        assert!(matches!(err, NautobotError::Config(_)));

        let err = ClientConfig::from_lookup(lookup(&[("NAUTOBOT_MAX_WORKERS", "0")])).unwrap_err();
        assert!(matches!(err, NautobotError::Config(_)));

        let err =
            ClientConfig::from_lookup(lookup(&[("NAUTOBOT_THREADING", "maybe")])).unwrap_err();
        assert!(matches!(err, NautobotError::Config(_)));
    }

    #[test]
    fn test_default_filter_replaces_same_key() {
        let config = ClientConfig::new("http://nb", None)
            .default_filter("status", "active")
            .default_filter("status", "planned")
            .exclude_m2m(true)
            .exclude_m2m(false);
        assert_eq!(
            config.default_filters,
            vec![("status".to_string(), "planned".to_string())]
        );
    }
}
