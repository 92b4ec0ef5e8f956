//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (STREAKS_OFFLINE_*)
//! 2. TOML config file (if STREAKS_OFFLINE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Paths fetched into the current store at install time.
pub const DEFAULT_PRECACHE: &[&str] =
    &["/", "/streaks", "/manifest.json", "/favicon.svg", "/images/icon-192.png", "/images/icon-512.png"];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (STREAKS_OFFLINE_*)
/// 2. TOML config file (if STREAKS_OFFLINE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the server-rendered application being cached.
    ///
    /// Set via STREAKS_OFFLINE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Address the proxy listens on.
    ///
    /// Set via STREAKS_OFFLINE_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Path to SQLite cache database.
    ///
    /// Set via STREAKS_OFFLINE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Name of the current cache store. Bumping it on deploy invalidates
    /// every previously cached entry once the new version activates.
    ///
    /// Set via STREAKS_OFFLINE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Paths that must be cached at install time.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Path prefix of the realtime channel; never cached.
    #[serde(default = "default_live_prefix")]
    pub live_prefix: String,

    /// Path prefix of API traffic; never cached.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Substring marking websocket endpoints; never cached.
    #[serde(default = "default_websocket_marker")]
    pub websocket_marker: String,

    /// User-Agent string for upstream requests.
    ///
    /// Set via STREAKS_OFFLINE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upstream request timeout in milliseconds.
    ///
    /// Set via STREAKS_OFFLINE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Redirects followed upstream. 0 hands redirects back to the browser.
    #[serde(default)]
    pub max_redirects: usize,

    /// Delay before the first install retry after a failed startup, in
    /// milliseconds. Later retries back off exponentially.
    ///
    /// Set via STREAKS_OFFLINE_INSTALL_RETRY_MS environment variable.
    #[serde(default = "default_install_retry_ms")]
    pub install_retry_ms: u64,
}

fn default_origin() -> String {
    "http://127.0.0.1:4000".into()
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./streaks-offline.sqlite")
}

fn default_cache_version() -> String {
    "streaks-v1".into()
}

fn default_precache() -> Vec<String> {
    DEFAULT_PRECACHE.iter().map(|p| p.to_string()).collect()
}

fn default_live_prefix() -> String {
    "/live".into()
}

fn default_api_prefix() -> String {
    "/api".into()
}

fn default_websocket_marker() -> String {
    "websocket".into()
}

fn default_user_agent() -> String {
    "streaks-offline/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_install_retry_ms() -> u64 {
    1_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            listen_addr: default_listen_addr(),
            db_path: default_db_path(),
            cache_version: default_cache_version(),
            precache: default_precache(),
            live_prefix: default_live_prefix(),
            api_prefix: default_api_prefix(),
            websocket_marker: default_websocket_marker(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_redirects: 0,
            install_retry_ms: default_install_retry_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Initial install retry delay.
    pub fn install_retry(&self) -> Duration {
        Duration::from_millis(self.install_retry_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `STREAKS_OFFLINE_`
    /// 2. TOML file from `STREAKS_OFFLINE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("STREAKS_OFFLINE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("STREAKS_OFFLINE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
