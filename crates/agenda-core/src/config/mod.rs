//! Sync configuration for client apps.
//!
//! Values come from the environment (after the binary loads `.env`) and fall
//! back to defaults suitable for a dashboard polling a nearby backend.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;


const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

pub const ENV_API_URL: &str = "AGENDA_API_URL";
pub const ENV_API_TOKEN: &str = "AGENDA_API_TOKEN";
pub const ENV_SYNC_INTERVAL_SECS: &str = "AGENDA_SYNC_INTERVAL_SECS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "AGENDA_REQUEST_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "AGENDA_MAX_RETRIES";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidNumber { key: String, value: String },
    #[error("{key} must include http:// or https://")]
    InvalidUrl { key: String },
    #[error("{0} is not configured")]
    Missing(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for the sync engine and its HTTP collaborator
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Backend base URL, without trailing slash
    #[serde(default)]
    pub remote_base_url: Option<String>,
    /// Bearer token sent with every dispatch
    #[serde(default)]
    pub auth_token: Option<String>,
    pub sync_interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Dead-letter a mutation after this many failed dispatches; `None` retries forever
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_base_url: None,
            auth_token: None,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: None,
        }
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncConfig")
            .field("remote_base_url", &self.remote_base_url)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("sync_interval_secs", &self.sync_interval_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl SyncConfig {
    /// Load from process environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variable names
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let defaults = Self::default();

        let remote_base_url = non_empty(lookup(ENV_API_URL))
            .map(|url| normalize_base_url(&url, ENV_API_URL))
            .transpose()?;

        Ok(Self {
            remote_base_url,
            auth_token: non_empty(lookup(ENV_API_TOKEN)),
            sync_interval_secs: parse_positive(&lookup, ENV_SYNC_INTERVAL_SECS)?
                .unwrap_or(defaults.sync_interval_secs),
            request_timeout_secs: parse_positive(&lookup, ENV_REQUEST_TIMEOUT_SECS)?
                .unwrap_or(defaults.request_timeout_secs),
            max_retries: parse_positive(&lookup, ENV_MAX_RETRIES)?
                .map(|value| u32::try_from(value).unwrap_or(u32::MAX)),
        })
    }

    /// Set the remote base URL
    pub fn with_remote_base_url(mut self, url: &str) -> ConfigResult<Self> {
        self.remote_base_url = Some(normalize_base_url(url, "remote_base_url")?);
        Ok(self)
    }

    /// Set the periodic sync interval, rounded down to whole seconds (at least one)
    #[must_use]
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval_secs = interval.as_secs().max(1);
        self
    }

    /// Dead-letter mutations after `max_retries` failures
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Base URL or a `Missing` error naming the variable to set
    pub fn require_remote_base_url(&self) -> ConfigResult<&str> {
        self.remote_base_url
            .as_deref()
            .ok_or_else(|| ConfigError::Missing(ENV_API_URL.to_string()))
    }
}

/// Trimmed value, or `None` when unset or blank
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn normalize_base_url(raw: &str, key: &str) -> ConfigResult<String> {
    let url = raw.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(ConfigError::InvalidUrl {
            key: key.to_string(),
        })
    }
}

fn parse_positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> ConfigResult<Option<u64>> {
    let Some(raw) = non_empty(lookup(key)) else {
        return Ok(None);
    };

    match raw.parse::<u64>() {
        Ok(value) if value > 0 => Ok(Some(value)),
        _ => Err(ConfigError::InvalidNumber {
            key: key.to_string(),
            value: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = SyncConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.sync_interval(), Duration::from_secs(30));
        assert!(config.require_remote_base_url().is_err());
    }

    #[test]
    fn reads_and_normalizes_values() {
        let config = SyncConfig::from_lookup(lookup(&[
            (ENV_API_URL, " https://api.example.com/v1/ "),
            (ENV_API_TOKEN, "secret"),
            (ENV_SYNC_INTERVAL_SECS, "5"),
            (ENV_MAX_RETRIES, "8"),
        ]))
        .unwrap();

        assert_eq!(
            config.remote_base_url.as_deref(),
            Some("https://api.example.com/v1")
        );
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.sync_interval_secs, 5);
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.max_retries, Some(8));
    }

    #[test]
    fn rejects_invalid_values() {
        let error = SyncConfig::from_lookup(lookup(&[(ENV_API_URL, "api.example.com")])).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidUrl { .. }));

        let error =
            SyncConfig::from_lookup(lookup(&[(ENV_SYNC_INTERVAL_SECS, "0")])).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidNumber { .. }));

        let error = SyncConfig::from_lookup(lookup(&[(ENV_MAX_RETRIES, "many")])).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidNumber { .. }));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = SyncConfig::from_lookup(lookup(&[
            (ENV_API_URL, "   "),
            (ENV_API_TOKEN, ""),
            (ENV_MAX_RETRIES, " "),
        ]))
        .unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn base_url_requires_http_scheme() {
        assert_eq!(
            normalize_base_url("http://localhost:8080/", "k").unwrap(),
            "http://localhost:8080"
        );
        assert!(normalize_base_url("ftp://example.com", "k").is_err());
    }

    #[test]
    fn sync_interval_override_never_drops_to_zero() {
        let config = SyncConfig::default().with_sync_interval(Duration::from_secs(7));
        assert_eq!(config.sync_interval(), Duration::from_secs(7));

        let config = SyncConfig::default().with_sync_interval(Duration::from_millis(200));
        assert_eq!(config.sync_interval(), Duration::from_secs(1));
    }

    #[test]
    fn debug_redacts_token() {
        let config = SyncConfig {
            auth_token: Some("secret".to_string()),
            ..SyncConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
