//! Client code for streaks-offline.
//!
//! This crate provides the upstream fetch pipeline, the request routing
//! policy, and the offline cache manager that ties them to the cache store.

pub mod fetch;
pub mod routing;
pub mod worker;

pub use fetch::{FetchClient, FetchConfig, Fetcher};
pub use routing::{BypassReason, Route, RoutePolicy};
pub use worker::{Interception, Lifecycle, OfflineCacheManager, ResponseSource, Served, WorkerConfig};
