//! Proxy fallback route.
//!
//! Turns an incoming request into a cache request against the origin, lets
//! the manager intercept it, and forwards whatever it passes through.

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use streaks_offline_client::fetch::{is_hop_by_hop, resolve};
use streaks_offline_client::Interception;
use streaks_offline_core::{CacheRequest, CachedResponse, Error};

use crate::error::ProxyError;
use crate::handler::ProxyServer;

/// Response header naming where the body came from.
pub const SOURCE_HEADER: &str = "x-offline-source";

/// Largest request body forwarded upstream.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub async fn proxy_impl(State(server): State<ProxyServer>, request: Request) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();

    let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let url = resolve(&server.origin, path_and_query).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect();
    let cache_request = CacheRequest { method: parts.method.as_str().to_string(), url: url.to_string(), headers };

    match server.manager.handle(&cache_request).await? {
        Interception::Respond(served) => {
            tracing::debug!(url = %cache_request.url, source = %served.source, "served");
            Ok(into_response(served.response, served.source.as_str()))
        }
        Interception::Passthrough(reason) => {
            tracing::debug!(method = %cache_request.method, url = %cache_request.url, %reason, "passing through");
            let body = to_bytes(body, MAX_BODY_BYTES)
                .await
                .map_err(|e| Error::InvalidInput(format!("failed to read request body: {e}")))?;
            let body = (!body.is_empty()).then_some(body);
            let response = server.client.send(&cache_request, body).await?;
            Ok(into_response(response, "bypass"))
        }
    }
}

fn into_response(response: CachedResponse, source: &'static str) -> Response {
    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let headers = out.headers_mut();
    for (name, value) in &response.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            headers.append(name, value);
        }
    }
    headers.insert(SOURCE_HEADER, HeaderValue::from_static(source));
    out
}
