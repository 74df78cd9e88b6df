//! Client configuration.
//!
//! `ClientConfig` is read from an optional JSON file and then overridden by
//! `SPENDSYNC_*` environment variables.

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::db::DEFAULT_NAMESPACE;
use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option, parse_flag};

const ENV_API_URL: &str = "SPENDSYNC_API_URL";
const ENV_FORCE_OFFLINE: &str = "SPENDSYNC_FORCE_OFFLINE";
const ENV_PROBE_TIMEOUT_SECS: &str = "SPENDSYNC_PROBE_TIMEOUT_SECS";
const ENV_REQUEST_TIMEOUT_SECS: &str = "SPENDSYNC_REQUEST_TIMEOUT_SECS";
const ENV_MAX_SUBMIT_ATTEMPTS: &str = "SPENDSYNC_MAX_SUBMIT_ATTEMPTS";
const ENV_NAMESPACE: &str = "SPENDSYNC_NAMESPACE";

const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 4;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Runtime settings for the reconciliation core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct ClientConfig {
    /// Expense server base URL, e.g. `https://api.example.com`
    pub api_base_url: Option<String>,
    /// Start in forced offline mode regardless of the network
    pub force_offline: bool,
    pub probe_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Stop resubmitting a queued expense after this many rejections
    pub max_submit_attempts: Option<u32>,
    /// Storage scope, so several accounts can share one database file
    pub storage_namespace: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            force_offline: false,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_submit_attempts: None,
            storage_namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl ClientConfig {
    /// Load from `path` when given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        base.with_overrides(|key| env::var(key).ok())
    }

    /// Parse a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw).map_err(|error| {
            Error::Config(format!("failed to parse {}: {error}", path.display()))
        })?;
        config.normalize()
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| normalize_text_option(lookup(key));

        if let Some(url) = get(ENV_API_URL) {
            self.api_base_url = Some(url);
        }
        if let Some(value) = get(ENV_FORCE_OFFLINE) {
            self.force_offline = parse_flag(&value).ok_or_else(|| {
                Error::Config(format!("{ENV_FORCE_OFFLINE} must be a boolean, got '{value}'"))
            })?;
        }
        if let Some(value) = get(ENV_PROBE_TIMEOUT_SECS) {
            self.probe_timeout_secs = parse_number(ENV_PROBE_TIMEOUT_SECS, &value)?;
        }
        if let Some(value) = get(ENV_REQUEST_TIMEOUT_SECS) {
            self.request_timeout_secs = parse_number(ENV_REQUEST_TIMEOUT_SECS, &value)?;
        }
        if let Some(value) = get(ENV_MAX_SUBMIT_ATTEMPTS) {
            self.max_submit_attempts = Some(parse_number(ENV_MAX_SUBMIT_ATTEMPTS, &value)?);
        }
        if let Some(namespace) = get(ENV_NAMESPACE) {
            self.storage_namespace = namespace;
        }

        self.normalize()
    }

    fn normalize(mut self) -> Result<Self> {
        self.api_base_url = match normalize_text_option(self.api_base_url) {
            Some(url) if is_http_url(&url) => Some(url.trim_end_matches('/').to_string()),
            Some(url) => {
                return Err(Error::Config(format!(
                    "api_base_url must include http:// or https://, got '{url}'"
                )))
            }
            None => None,
        };
        if self.probe_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(Error::Config("timeouts must be at least one second".to_string()));
        }
        if self.max_submit_attempts == Some(0) {
            return Err(Error::Config(
                "max_submit_attempts must be at least 1 when set".to_string(),
            ));
        }
        self.storage_namespace = normalize_text_option(Some(self.storage_namespace))
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        Ok(self)
    }

    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got '{value}'")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_overrides() {
        let config = ClientConfig::default().with_overrides(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.probe_timeout(), Duration::from_secs(4));
    }

    #[test]
    fn overrides_are_applied_and_normalized() {
        let config = ClientConfig::default()
            .with_overrides(lookup(&[
                (ENV_API_URL, " http://192.168.0.193:8000/ "),
                (ENV_FORCE_OFFLINE, "yes"),
                (ENV_MAX_SUBMIT_ATTEMPTS, "5"),
                (ENV_NAMESPACE, "alice"),
            ]))
            .unwrap();

        assert_eq!(
            config.api_base_url.as_deref(),
            Some("http://192.168.0.193:8000")
        );
        assert!(config.force_offline);
        assert_eq!(config.max_submit_attempts, Some(5));
        assert_eq!(config.storage_namespace, "alice");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_url = ClientConfig::default().with_overrides(lookup(&[(ENV_API_URL, "example.com")]));
        assert!(matches!(bad_url, Err(Error::Config(_))));

        let bad_flag =
            ClientConfig::default().with_overrides(lookup(&[(ENV_FORCE_OFFLINE, "sometimes")]));
        assert!(matches!(bad_flag, Err(Error::Config(_))));

        let zero_attempts =
            ClientConfig::default().with_overrides(lookup(&[(ENV_MAX_SUBMIT_ATTEMPTS, "0")]));
        assert!(matches!(zero_attempts, Err(Error::Config(_))));
    }

    #[test]
    fn config_file_rejects_unknown_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"api_base_url": "https://api.example.com", "colour": "red"}"#)
            .unwrap();

        assert!(matches!(ClientConfig::from_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn config_file_fills_missing_fields_with_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"api_base_url": "https://api.example.com/"}"#).unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.api_base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.storage_namespace, "default");
    }
}
