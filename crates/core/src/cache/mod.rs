//! SQLite-backed versioned cache stores.
//!
//! Persistent request/response cache using SQLite with async access via
//! tokio-rusqlite. It supports:
//!
//! - Named stores, one per cache version
//! - Request identity keys using SHA-256 hashing
//! - Atomic multi-entry writes for precaching
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod request;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use request::{CacheRequest, CachedResponse};
pub use stores::StoreSummary;
