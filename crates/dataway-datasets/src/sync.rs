//! Background reconciliation: the serving router is rebuilt from the
//! dataset list on a fixed interval and swapped in wholesale. Requests
//! read the handle lock-free apart from one cheap `Arc` clone.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, warn};

use dataway_entities::Dataset;
use dataway_router::PathTrie;

use crate::dataset::DatasetService;

/// Interval between router rebuilds; a mutation becomes routable within
/// one tick.
pub const SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Shared handle to the current route trie.
#[derive(Default)]
pub struct RouterHandle {
    current: RwLock<Arc<PathTrie>>,
}

impl RouterHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Arc<PathTrie> {
        self.current.read().clone()
    }

    pub fn swap(&self, trie: PathTrie) {
        *self.current.write() = Arc::new(trie);
    }
}

/// Build a fresh trie from the published datasets. A dataset whose path
/// cannot be added (duplicate, wildcard conflict) is skipped with a
/// warning; one bad record never takes down the rest of the routes.
pub fn build_router(datasets: &[Dataset]) -> PathTrie {
    let mut trie = PathTrie::new();
    for dataset in datasets {
        if !dataset.publish_status {
            continue;
        }
        if let Err(e) = trie.add(&dataset.path, &dataset.id) {
            warn!(id = %dataset.id, path = %dataset.path, error = %e,
                "dataset route rejected");
        }
    }
    trie
}

/// Spawn the rebuild loop. The task runs until the handle is dropped by
/// process shutdown.
pub fn spawn_router_sync(
    datasets: Arc<DatasetService>,
    handle: Arc<RouterHandle>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match datasets.all().await {
                Ok(list) => {
                    let trie = build_router(&list);
                    debug!(routes = trie.len(), "router rebuilt");
                    handle.swap(trie);
                }
                Err(e) => warn!(error = %e, "dataset listing failed, keeping current routes"),
            }
        }
    })
}
