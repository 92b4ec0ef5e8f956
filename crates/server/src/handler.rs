//! Proxy server state and router.
//!
//! The router exposes the status endpoint and sends every other request
//! through the offline cache manager.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use streaks_offline_client::{FetchClient, FetchConfig, Lifecycle, OfflineCacheManager, WorkerConfig};
use streaks_offline_core::{AppConfig, CacheDb, Error};
use tokio::task::JoinHandle;
use url::Url;

use crate::routes::{proxy, status};

/// Path of the informational status endpoint.
pub const STATUS_PATH: &str = "/__offline/status";

/// Upper bound for the install retry backoff.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Shared state for all proxy routes.
#[derive(Clone)]
pub struct ProxyServer {
    pub(crate) manager: Arc<OfflineCacheManager>,
    pub(crate) client: Arc<FetchClient>,
    pub(crate) origin: Url,
}

impl ProxyServer {
    /// Build the fetch clients and the cache manager for a configuration.
    ///
    /// Proxied traffic uses the configured redirect policy; precaching
    /// always follows redirects.
    pub fn build(config: &AppConfig, db: CacheDb) -> Result<Self, Error> {
        let fetch = FetchConfig::from(config);
        let client = Arc::new(FetchClient::new(fetch.clone())?);
        let precache = Arc::new(FetchClient::new(fetch.following_redirects())?);

        let manager =
            OfflineCacheManager::new(db, client.clone(), WorkerConfig::try_from(config)?).with_precache_fetcher(precache);
        let manager = Arc::new(manager);
        let origin = manager.config().origin.clone();

        Ok(Self { manager, client, origin })
    }

    pub fn router(self) -> Router {
        Router::new()
            .route(STATUS_PATH, get(status::status_impl))
            .fallback(proxy::proxy_impl)
            .with_state(self)
    }
}

/// Install and activate a freshly started manager.
///
/// If startup fails the proxy passes every request through, and a
/// background task keeps retrying with exponential backoff starting at
/// `retry` until the manager is active. That task is returned.
pub async fn bootstrap(manager: Arc<OfflineCacheManager>, retry: Duration) -> Option<JoinHandle<()>> {
    match start(&manager).await {
        Ok(()) => None,
        Err(e) => {
            tracing::error!(version = manager.version(), error = %e, "startup failed; passing all traffic through");
            Some(tokio::spawn(retry_start(manager, retry)))
        }
    }
}

/// Run whichever lifecycle phases are still pending.
async fn start(manager: &OfflineCacheManager) -> Result<(), Error> {
    if manager.state().await == Lifecycle::Uninstalled {
        manager.install().await?;
    }
    let deleted = manager.activate().await?;
    tracing::info!(version = manager.version(), deleted = deleted.len(), "offline cache ready");
    Ok(())
}

async fn retry_start(manager: Arc<OfflineCacheManager>, initial: Duration) {
    let mut delay = initial;
    loop {
        tokio::time::sleep(delay).await;
        match start(&manager).await {
            Ok(()) => return,
            Err(e) => {
                delay = (delay * 2).min(MAX_RETRY_DELAY);
                tracing::warn!(
                    version = manager.version(),
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "startup retry failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{Origin, app_routes, origin_router, spawn_proxy, test_config};
    use streaks_offline_core::CacheRequest;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_bootstrap_activates_when_origin_up() {
        let origin = Origin::spawn().await;
        let proxy = spawn_proxy(&origin.base, "streaks-v1").await;

        assert!(proxy.startup.is_none());
        assert_eq!(proxy.manager.state().await, Lifecycle::Active);
    }

    #[tokio::test]
    async fn test_startup_retries_until_origin_comes_up() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let proxy = spawn_proxy(&format!("http://{addr}"), "streaks-v1").await;
        assert_eq!(proxy.manager.state().await, Lifecycle::Uninstalled);
        let startup = proxy.startup.expect("failed startup schedules a retry");

        let _origin = Origin::spawn_on(addr, origin_router()).await;
        tokio::time::timeout(Duration::from_secs(10), startup).await.unwrap().unwrap();

        assert_eq!(proxy.manager.state().await, Lifecycle::Active);
        assert_eq!(proxy.manager.db().keys("streaks-v1").await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_precache_follows_redirects() {
        let router = app_routes().route(
            "/",
            get(|| async { (axum::http::StatusCode::FOUND, [("location", "/streaks")], "") }),
        );
        let origin = Origin::spawn_router(router).await;
        let proxy = spawn_proxy(&origin.base, "streaks-v1").await;

        assert_eq!(proxy.manager.state().await, Lifecycle::Active);
        let root = proxy
            .manager
            .db()
            .match_request("streaks-v1", &CacheRequest::get(format!("{}/", origin.base)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(root.status, 200);
        assert_eq!(root.body, b"<main>streaks</main>");
    }

    #[tokio::test]
    async fn test_retry_resumes_at_activation() {
        let origin = Origin::spawn().await;
        let config = test_config(&origin.base, "streaks-v1");
        let db = CacheDb::open_in_memory().await.unwrap();
        let server = ProxyServer::build(&config, db).unwrap();
        server.manager.install().await.unwrap();

        assert!(bootstrap(server.manager.clone(), config.install_retry()).await.is_none());
        assert_eq!(server.manager.state().await, Lifecycle::Active);
    }

    #[tokio::test]
    async fn test_build_rejects_bad_origin() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(matches!(ProxyServer::build(&config, db), Err(Error::InvalidUrl(_))));
    }
}
