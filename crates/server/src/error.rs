//! Structured errors for the proxy server.
//!
//! Cache and fetch errors map onto HTTP statuses the way a gateway reports
//! upstream trouble.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use streaks_offline_core::Error;

/// Error returned by proxy routes.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ProxyError(#[from] pub Error);

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::FetchTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Network(_) => StatusCode::BAD_GATEWAY,
            Error::InvalidInput(_) | Error::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!(code = self.0.code(), status = status.as_u16(), "{}", self.0);
        (status, self.0.to_string()).into_response()
    }
}
