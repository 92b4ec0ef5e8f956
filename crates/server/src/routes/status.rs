//! Status endpoint.
//!
//! Reports the manager's version and lifecycle state plus every store in
//! the database with its entry count.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::error::ProxyError;
use crate::handler::ProxyServer;

/// One store as reported by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStatus {
    pub name: String,
    pub entries: u64,
    pub created_at: String,
    /// Whether this store belongs to the running version.
    pub current: bool,
}

/// Output of the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusOutput {
    pub version: String,
    pub state: String,
    pub origin: String,
    pub stores: Vec<StoreStatus>,
}

pub async fn status_impl(State(server): State<ProxyServer>) -> Result<Json<StatusOutput>, ProxyError> {
    let manager = &server.manager;
    let version = manager.version().to_string();

    let stores = manager
        .db()
        .store_summaries()
        .await?
        .into_iter()
        .map(|s| StoreStatus { current: s.name == version, name: s.name, entries: s.entries, created_at: s.created_at })
        .collect();

    Ok(Json(StatusOutput {
        state: manager.state().await.to_string(),
        origin: server.origin.to_string(),
        version,
        stores,
    }))
}
