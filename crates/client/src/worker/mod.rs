//! Offline cache manager.
//!
//! Drives one cache version through its lifecycle and intercepts requests
//! once active:
//!
//! - **install**: open the versioned store and precache the app shell. Every
//!   manifest fetch must succeed; entries are written in one transaction.
//!   Precache goes through its own [`Fetcher`] so it can follow redirects
//!   while proxied traffic does not.
//! - **activate**: delete every store that is not the current version, then
//!   take control of all traffic.
//! - **handle**: route each request (see [`crate::routing`]). HTML goes
//!   network-first with cache and app-shell fallback; assets go cache-first
//!   with a background refresh.
//!
//! Concurrent requests for the same resource may race to write the same
//! entry; the last write wins.

pub mod lifecycle;

use std::fmt;
use std::sync::Arc;

use futures_util::future::try_join_all;
use streaks_offline_core::{AppConfig, CacheDb, CacheRequest, CachedResponse, Error};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use url::Url;

use crate::fetch::{Fetcher, canonicalize, resolve, root_of, same_origin};
use crate::routing::{BypassReason, Route, RoutePolicy};

pub use lifecycle::Lifecycle;

/// Settings for one manager instance (one cache version).
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name of the current store.
    pub cache_version: String,
    /// Origin whose traffic is cached. Precache paths resolve against it.
    pub origin: Url,
    /// Paths precached at install.
    pub precache: Vec<String>,
    pub routes: RoutePolicy,
}

impl WorkerConfig {
    pub fn new(cache_version: impl Into<String>, origin: Url) -> Self {
        Self {
            cache_version: cache_version.into(),
            origin: root_of(&origin),
            precache: Vec::new(),
            routes: RoutePolicy::default(),
        }
    }

    pub fn with_precache<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache = paths.into_iter().map(Into::into).collect();
        self
    }
}

impl TryFrom<&AppConfig> for WorkerConfig {
    type Error = Error;

    fn try_from(config: &AppConfig) -> Result<Self, Error> {
        let origin = canonicalize(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            routes: RoutePolicy::from(config),
            ..Self::new(config.cache_version.clone(), origin).with_precache(config.precache.iter().cloned())
        })
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Live response from the origin.
    Network,
    /// Stored entry for this exact request.
    Cache,
    /// Stored root document, served for a navigation the cache never saw.
    Shell,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::Shell => "shell",
        }
    }
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response produced by the manager.
#[derive(Debug)]
pub struct Served {
    pub response: CachedResponse,
    pub source: ResponseSource,
    /// Background refresh started for a cache hit. Dropping the handle
    /// detaches the task; it still runs to completion.
    pub refresh: Option<JoinHandle<()>>,
}

/// Outcome of intercepting a request.
#[derive(Debug)]
pub enum Interception {
    /// Not handled; the caller sends the request to the network untouched.
    Passthrough(BypassReason),
    Respond(Served),
}

/// Versioned offline cache manager.
pub struct OfflineCacheManager {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    precache_fetcher: Arc<dyn Fetcher>,
    config: WorkerConfig,
    state: RwLock<Lifecycle>,
}

impl OfflineCacheManager {
    pub fn new(db: CacheDb, fetcher: Arc<dyn Fetcher>, config: WorkerConfig) -> Self {
        let precache_fetcher = Arc::clone(&fetcher);
        Self { db, fetcher, precache_fetcher, config, state: RwLock::new(Lifecycle::Uninstalled) }
    }

    /// Use a separate fetcher for install. Responses it returns are stored
    /// under the manifest URL that was requested.
    pub fn with_precache_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.precache_fetcher = fetcher;
        self
    }

    /// Current store name.
    pub fn version(&self) -> &str {
        &self.config.cache_version
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub async fn state(&self) -> Lifecycle {
        *self.state.read().await
    }

    /// Open the current store and precache the manifest.
    ///
    /// # Errors
    ///
    /// `PrecacheFailed` if any manifest URL cannot be fetched or answers with
    /// a non-2xx status; nothing is written in that case and the manager stays
    /// `Uninstalled`.
    pub async fn install(&self) -> Result<(), Error> {
        let mut state = self.state.write().await;
        state.expect(Lifecycle::Uninstalled, "install")?;

        let version = self.version();
        self.db.open_store(version).await?;

        tracing::info!(version, entries = self.config.precache.len(), "precaching app shell");

        let requests = self
            .config
            .precache
            .iter()
            .map(|path| {
                resolve(&self.config.origin, path)
                    .map(|url| CacheRequest::get(url.as_str()))
                    .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let responses = try_join_all(requests.iter().map(|request| self.precache_one(request))).await?;
        let entries: Vec<_> = requests.into_iter().zip(responses).collect();
        self.db.put_all(version, &entries).await?;

        *state = Lifecycle::Installed;
        Ok(())
    }

    async fn precache_one(&self, request: &CacheRequest) -> Result<CachedResponse, Error> {
        let response = self
            .precache_fetcher
            .fetch(request)
            .await
            .map_err(|e| Error::PrecacheFailed { url: request.url.clone(), reason: e.to_string() })?;

        if !response.is_success() {
            return Err(Error::PrecacheFailed { url: request.url.clone(), reason: format!("status {}", response.status) });
        }
        Ok(response)
    }

    /// Delete every store but the current one and take control of traffic.
    ///
    /// Returns the names of the deleted stores.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        let mut state = self.state.write().await;
        state.expect(Lifecycle::Installed, "activate")?;

        let version = self.version();
        let mut deleted = Vec::new();
        for name in self.db.store_names().await? {
            if name == version {
                continue;
            }
            tracing::info!(store = %name, "deleting old cache");
            self.db.delete_store(&name).await?;
            deleted.push(name);
        }

        *state = Lifecycle::Active;
        tracing::info!(version, "cache manager active");
        Ok(deleted)
    }

    /// Intercept a request.
    ///
    /// Until the manager is active every request passes through.
    pub async fn handle(&self, request: &CacheRequest) -> Result<Interception, Error> {
        if *self.state.read().await != Lifecycle::Active {
            return Ok(Interception::Passthrough(BypassReason::Inactive));
        }

        let url = canonicalize(&request.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let route = self.config.routes.classify(request, &url);

        if let Route::Bypass(reason) = route {
            return Ok(Interception::Passthrough(reason));
        }
        if !same_origin(&url, &self.config.origin) {
            return Ok(Interception::Passthrough(BypassReason::CrossOrigin));
        }

        let request = CacheRequest { url: url.to_string(), ..request.clone() };
        let served = match route {
            Route::NetworkFirst => self.network_first(&request, &url).await?,
            _ => self.cache_first(request).await?,
        };
        Ok(Interception::Respond(served))
    }

    async fn network_first(&self, request: &CacheRequest, url: &Url) -> Result<Served, Error> {
        let err = match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.store(request, &response).await;
                return Ok(Served { response, source: ResponseSource::Network, refresh: None });
            }
            Err(err) => err,
        };

        tracing::debug!(url = %request.url, error = %err, "navigation fetch failed, falling back to cache");

        let version = self.version();
        if let Some(response) = self.db.match_request(version, request).await? {
            return Ok(Served { response, source: ResponseSource::Cache, refresh: None });
        }

        let shell = CacheRequest::get(root_of(url).as_str());
        if let Some(response) = self.db.match_request(version, &shell).await? {
            return Ok(Served { response, source: ResponseSource::Shell, refresh: None });
        }

        Err(err)
    }

    async fn cache_first(&self, request: CacheRequest) -> Result<Served, Error> {
        if let Some(response) = self.db.match_request(self.version(), &request).await? {
            tracing::debug!(url = %request.url, "cache hit");
            let refresh = self.spawn_refresh(request);
            return Ok(Served { response, source: ResponseSource::Cache, refresh: Some(refresh) });
        }

        let response = self.fetcher.fetch(&request).await?;
        self.store(&request, &response).await;
        Ok(Served { response, source: ResponseSource::Network, refresh: None })
    }

    /// Refetch a cached asset so the next request sees the new copy.
    /// Failures leave the stored entry untouched, and a store deleted in the
    /// meantime is not recreated.
    fn spawn_refresh(&self, request: CacheRequest) -> JoinHandle<()> {
        let db = self.db.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let store = self.config.cache_version.clone();

        tokio::spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(response) if response.is_success() => match db.put_existing(&store, &request, &response).await {
                    Ok(true) => tracing::debug!(url = %request.url, "refreshed cached entry"),
                    Ok(false) => tracing::debug!(url = %request.url, %store, "store gone, refresh dropped"),
                    Err(e) => tracing::warn!(url = %request.url, error = %e, "failed to store refreshed entry"),
                },
                Ok(response) => {
                    tracing::debug!(url = %request.url, status = response.status, "refresh not stored");
                }
                Err(e) => {
                    tracing::debug!(url = %request.url, error = %e, "background refresh failed");
                }
            }
        })
    }

    /// Store a copy of a live response. Only 2xx responses are kept, and a
    /// failed write never fails the request.
    async fn store(&self, request: &CacheRequest, response: &CachedResponse) {
        if !response.is_success() {
            tracing::debug!(url = %request.url, status = response.status, "not caching response");
            return;
        }
        match self.db.put_existing(self.version(), request, response).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(url = %request.url, store = self.version(), "store gone, not caching"),
            Err(e) => tracing::warn!(url = %request.url, error = %e, "failed to cache response"),
        }
    }
}
