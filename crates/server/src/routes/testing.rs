//! Test fixtures: a throwaway origin and a proxy in front of it.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use streaks_offline_client::OfflineCacheManager;
use streaks_offline_core::{AppConfig, CacheDb};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::handler::{ProxyServer, bootstrap};

const HTML: [(&str, &str); 1] = [("content-type", "text/html; charset=utf-8")];

/// Full application: app shell at `/` plus [`app_routes`].
pub(crate) fn origin_router() -> Router {
    app_routes().route("/", get(|| async { (HTML, "<main>shell</main>") }))
}

/// Every origin route except `/`.
pub(crate) fn app_routes() -> Router {
    Router::new()
        .route("/streaks", get(|| async { (HTML, "<main>streaks</main>") }))
        .route("/manifest.json", get(|| async { ([("content-type", "application/json")], "{}") }))
        .route("/favicon.svg", get(|| async { ([("content-type", "image/svg+xml")], "<svg/>") }))
        .route("/images/icon-192.png", get(|| async { "png192" }))
        .route("/images/icon-512.png", get(|| async { "png512" }))
        .route(
            "/assets/app.css",
            get(|| async { ([("content-type", "text/css"), ("set-cookie", "_session=alice; HttpOnly")], "body{}") }),
        )
        .route("/api/echo", post(|body: String| async move { body }))
        .route("/live/ping", get(|| async { "pong" }))
        .route("/broken", get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }))
}

/// Application server the proxy talks to.
pub(crate) struct Origin {
    pub base: String,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Origin {
    pub async fn spawn() -> Self {
        Self::spawn_router(origin_router()).await
    }

    pub async fn spawn_router(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Self::serve(listener, router)
    }

    /// Serve on a fixed address, e.g. one a proxy already points at.
    pub async fn spawn_on(addr: SocketAddr, router: Router) -> Self {
        let listener = TcpListener::bind(addr).await.unwrap();
        Self::serve(listener, router)
    }

    fn serve(listener: TcpListener, router: Router) -> Self {
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (shutdown, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });
        Self { base, shutdown, task }
    }

    /// Take the origin offline; later connections are refused.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        self.task.await.unwrap();
    }
}

/// Running proxy in front of an origin.
pub(crate) struct Proxy {
    pub base: String,
    pub manager: Arc<OfflineCacheManager>,
    /// Install retry task, present when startup failed.
    pub startup: Option<JoinHandle<()>>,
}

pub(crate) fn test_config(origin: &str, version: &str) -> AppConfig {
    AppConfig {
        origin: origin.to_string(),
        cache_version: version.to_string(),
        install_retry_ms: 20,
        ..Default::default()
    }
}

pub(crate) async fn spawn_proxy(origin: &str, version: &str) -> Proxy {
    let config = test_config(origin, version);
    let db = CacheDb::open_in_memory().await.unwrap();
    let server = ProxyServer::build(&config, db).unwrap();
    let manager = server.manager.clone();
    let startup = bootstrap(manager.clone(), config.install_retry()).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let router = server.router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    Proxy { base, manager, startup }
}
