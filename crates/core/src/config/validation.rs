//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `cache_version` or `origin` is empty,
    /// and `ConfigError::Invalid` if:
    /// - `origin` is not an http(s) URL
    /// - a precache path or exclusion prefix does not start with `/`
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `max_redirects` exceeds 10
    /// - `install_retry_ms` is outside 10ms..=10 minutes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.origin.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "origin".into(),
                hint: "Set STREAKS_OFFLINE_ORIGIN to the application's base URL".into(),
            });
        }
        if !(self.origin.starts_with("http://") || self.origin.starts_with("https://")) {
            return Err(invalid("origin", "must be an http:// or https:// URL"));
        }

        if self.cache_version.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "cache_version".into(),
                hint: "Set STREAKS_OFFLINE_CACHE_VERSION".into(),
            });
        }

        if let Some(path) = self.precache.iter().find(|p| !p.starts_with('/')) {
            return Err(invalid("precache", format!("path {path:?} must start with '/'")));
        }

        for (field, prefix) in [("live_prefix", &self.live_prefix), ("api_prefix", &self.api_prefix)] {
            if !prefix.starts_with('/') {
                return Err(invalid(field, "must start with '/'"));
            }
        }
        if self.websocket_marker.is_empty() {
            return Err(invalid("websocket_marker", "must not be empty"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.max_redirects > 10 {
            return Err(invalid("max_redirects", "must not exceed 10"));
        }

        if !(10..=600_000).contains(&self.install_retry_ms) {
            return Err(invalid("install_retry_ms", "must be between 10ms and 10 minutes (600000ms)"));
        }

        if self.precache.is_empty() {
            tracing::warn!("precache manifest is empty; offline navigation has no app shell fallback");
        }

        Ok(())
    }
}
