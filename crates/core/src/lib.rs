//! Core types and shared functionality for streaks-offline.
//!
//! This crate provides:
//! - Versioned cache stores with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheRequest, CachedResponse, StoreSummary};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
