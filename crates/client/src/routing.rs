//! Request routing policy.
//!
//! Decides, per request, whether the cache manager intercepts it and with
//! which strategy. Rules are evaluated in order; the first match wins.

use std::fmt;

use streaks_offline_core::{AppConfig, CacheRequest};
use url::Url;

/// Why a request is passed straight through to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    /// Only GET requests are cached.
    Method,
    /// Realtime channel traffic must always hit the live server.
    Realtime,
    /// API and websocket traffic must never be served stale.
    Api,
    /// The request targets a different origin.
    CrossOrigin,
    /// The manager has not activated yet, so it controls no clients.
    Inactive,
}

impl fmt::Display for BypassReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BypassReason::Method => "method",
            BypassReason::Realtime => "realtime",
            BypassReason::Api => "api",
            BypassReason::CrossOrigin => "cross-origin",
            BypassReason::Inactive => "inactive",
        };
        f.write_str(s)
    }
}

/// Strategy chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted.
    Bypass(BypassReason),
    /// HTML navigation: network first, cache fallback, app shell last.
    NetworkFirst,
    /// Static asset: cache first, refreshed in the background.
    CacheFirst,
}

/// Path exclusions for traffic that must bypass the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePolicy {
    pub live_prefix: String,
    pub api_prefix: String,
    pub websocket_marker: String,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for RoutePolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            live_prefix: config.live_prefix.clone(),
            api_prefix: config.api_prefix.clone(),
            websocket_marker: config.websocket_marker.clone(),
        }
    }
}

impl RoutePolicy {
    /// Classify a request whose URL has already been parsed.
    pub fn classify(&self, request: &CacheRequest, url: &Url) -> Route {
        if !request.is_get() {
            return Route::Bypass(BypassReason::Method);
        }

        let path = url.path();
        if path.starts_with(&self.live_prefix) {
            return Route::Bypass(BypassReason::Realtime);
        }
        if path.starts_with(&self.api_prefix) || path.contains(&self.websocket_marker) {
            return Route::Bypass(BypassReason::Api);
        }

        if request.accepts_html() { Route::NetworkFirst } else { Route::CacheFirst }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(method: &str, url: &str, accept: Option<&str>) -> Route {
        let mut request = CacheRequest::new(method, url);
        if let Some(accept) = accept {
            request = request.with_header("Accept", accept);
        }
        let parsed = Url::parse(url).unwrap();
        RoutePolicy::default().classify(&request, &parsed)
    }

    const HTML: Option<&str> = Some("text/html,application/xhtml+xml");

    #[test]
    fn test_non_get_bypasses() {
        assert_eq!(classify("POST", "https://example.com/streaks", HTML), Route::Bypass(BypassReason::Method));
        assert_eq!(classify("DELETE", "https://example.com/app.css", None), Route::Bypass(BypassReason::Method));
    }

    #[test]
    fn test_live_prefix_bypasses() {
        assert_eq!(classify("GET", "https://example.com/live/longpoll", HTML), Route::Bypass(BypassReason::Realtime));
        assert_eq!(classify("GET", "https://example.com/live", None), Route::Bypass(BypassReason::Realtime));
    }

    #[test]
    fn test_api_and_websocket_bypass() {
        assert_eq!(classify("GET", "https://example.com/api/habits", HTML), Route::Bypass(BypassReason::Api));
        assert_eq!(classify("GET", "https://example.com/socket/websocket", None), Route::Bypass(BypassReason::Api));
        assert_eq!(classify("GET", "https://example.com/phoenix/websocket?vsn=2", HTML), Route::Bypass(BypassReason::Api));
    }

    #[test]
    fn test_method_checked_before_paths() {
        assert_eq!(classify("PUT", "https://example.com/api/habits", None), Route::Bypass(BypassReason::Method));
    }

    #[test]
    fn test_html_is_network_first() {
        assert_eq!(classify("GET", "https://example.com/streaks", HTML), Route::NetworkFirst);
        assert_eq!(classify("get", "https://example.com/", Some("TEXT/HTML")), Route::NetworkFirst);
    }

    #[test]
    fn test_assets_are_cache_first() {
        assert_eq!(classify("GET", "https://example.com/assets/app.js", Some("*/*")), Route::CacheFirst);
        assert_eq!(classify("GET", "https://example.com/favicon.svg", None), Route::CacheFirst);
    }

    #[test]
    fn test_prefix_is_not_substring() {
        assert_eq!(classify("GET", "https://example.com/docs/api", None), Route::CacheFirst);
        assert_eq!(classify("GET", "https://example.com/images/live.png", None), Route::CacheFirst);
    }

    #[test]
    fn test_custom_policy() {
        let policy = RoutePolicy {
            live_prefix: "/realtime".into(),
            api_prefix: "/v1".into(),
            websocket_marker: "ws".into(),
        };
        let url = Url::parse("https://example.com/v1/habits").unwrap();
        let request = CacheRequest::get(url.as_str());
        assert_eq!(policy.classify(&request, &url), Route::Bypass(BypassReason::Api));

        let url = Url::parse("https://example.com/live").unwrap();
        let request = CacheRequest::get(url.as_str());
        assert_eq!(policy.classify(&request, &url), Route::CacheFirst);
    }

    #[test]
    fn test_bypass_reason_display() {
        assert_eq!(BypassReason::Realtime.to_string(), "realtime");
        assert_eq!(BypassReason::CrossOrigin.to_string(), "cross-origin");
    }
}
