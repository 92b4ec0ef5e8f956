//! Upstream HTTP fetch.
//!
//! ### Fetcher
//! The cache manager only sees the [`Fetcher`] trait: any response, whatever
//! its status, is `Ok`; only transport failures (refused, reset, timeout)
//! are `Err`. That mirrors how a browser `fetch` resolves.
//!
//! ### Redirects
//! Proxied traffic hands redirects back to the browser by default. Precache
//! fetches follow them like a browser `fetch` does, and the final response
//! is stored under the manifest URL.
//!
//! ### Header hygiene
//! Hop-by-hop headers are dropped in both directions, and
//! `accept-encoding` is left to reqwest, which decodes bodies itself.

pub mod url;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};

pub use self::url::{UrlError, canonicalize, resolve, root_of, same_origin};

use streaks_offline_core::{AppConfig, CacheRequest, CachedResponse, Error};

/// Headers that describe a single connection rather than the resource.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
    "accept-encoding",
];

/// Whether a header must not be forwarded or stored.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Redirect limit for precache fetches.
pub const PRECACHE_MAX_REDIRECTS: usize = 10;

/// Source of network responses for the cache manager.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a request from the network.
    async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "streaks-offline/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 0, hand them back)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "streaks-offline/0.1".to_string(), timeout: Duration::from_millis(20000), max_redirects: 0 }
    }
}

impl FetchConfig {
    /// Same settings, but following up to [`PRECACHE_MAX_REDIRECTS`]
    /// redirects.
    pub fn following_redirects(self) -> Self {
        Self { max_redirects: PRECACHE_MAX_REDIRECTS, ..self }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), max_redirects: config.max_redirects }
    }
}

/// reqwest-backed client talking to the origin.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let redirect = if config.max_redirects == 0 {
            reqwest::redirect::Policy::none()
        } else {
            reqwest::redirect::Policy::limited(config.max_redirects)
        };

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(redirect)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Send a request upstream, with an optional body for pass-through
    /// traffic.
    pub async fn send(&self, request: &CacheRequest, body: Option<Bytes>) -> Result<CachedResponse, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {}", request.method)))?;
        let url = canonicalize(&request.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut builder = self.http.request(method, url.as_str()).headers(forward_headers(&request.headers));
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!("fetched {} {} -> {} in {}ms ({} bytes)", request.method, url, status, fetch_ms, bytes.len());

        Ok(CachedResponse { status, headers, body: bytes.to_vec() })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, Error> {
        self.send(request, None).await
    }
}

fn forward_headers(headers: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        if is_hop_by_hop(name) {
            continue;
        }
        let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) else {
            tracing::debug!(header = %name, "dropping malformed request header");
            continue;
        };
        map.append(name, value);
    }
    map
}

fn map_reqwest_error(err: reqwest::Error) -> Error {
    if err.is_timeout() { Error::FetchTimeout(err.to_string()) } else { Error::Network(err.to_string()) }
}
