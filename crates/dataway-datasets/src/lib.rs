//! Dataset and data-source services plus the serving engine.
//!
//! Operators register data sources (backend connections) and publish
//! datasets: parameterized query templates exposed as read endpoints. The
//! [`ServeEngine`] answers those endpoints through a periodically rebuilt
//! path trie, with optional cache-aside result caching per parameter set.

pub mod dataset;
pub mod datasource;
pub mod keys;
pub mod serve;
pub mod store;
pub mod sync;

pub use dataset::DatasetService;
pub use datasource::DataSourceService;
pub use serve::ServeEngine;
pub use store::{DataSourceStore, DatasetStore, MemoryDataSourceStore, MemoryDatasetStore};
pub use sync::{build_router, spawn_router_sync, RouterHandle, SYNC_INTERVAL};
