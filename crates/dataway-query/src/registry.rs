//! Live adapter pool and backend-type factory registry.
//!
//! Both are explicit service objects constructed at process start and shared
//! by `Arc`; tests instantiate isolated copies.

use crate::error::{DataError, Result};
use crate::traits::{Adapter, AdapterFactory};
use dataway_core::Dict;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Live adapters keyed by data-source id.
///
/// `put` closes the superseded adapter before installing the new one, so no
/// connection pool leaks and no request observes both generations.
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn Adapter>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: RwLock::new(HashMap::new()),
        }
    }

    /// Get the live adapter for a data-source id.
    pub async fn get(&self, id: &str) -> Result<Arc<dyn Adapter>> {
        let adapters = self.adapters.read().await;
        adapters
            .get(id)
            .cloned()
            .ok_or_else(|| DataError::AdapterNotFound(id.to_string()))
    }

    /// Install an adapter, replacing and closing any prior instance for the
    /// same id. The new adapter is visible to subsequent `get` calls the
    /// moment the write lock is released.
    pub async fn put(&self, id: &str, adapter: Arc<dyn Adapter>) {
        let previous = {
            let mut adapters = self.adapters.write().await;
            adapters.insert(id.to_string(), adapter)
        };
        if let Some(old) = previous {
            debug!(id, "closing superseded adapter");
            if let Err(e) = old.close().await {
                warn!(id, error = %e, "failed to close superseded adapter");
            }
        }
    }

    /// Close and remove the adapter for an id.
    pub async fn del(&self, id: &str) -> Result<()> {
        let removed = {
            let mut adapters = self.adapters.write().await;
            adapters.remove(id)
        };
        match removed {
            Some(adapter) => adapter.close().await,
            None => Err(DataError::AdapterNotFound(id.to_string())),
        }
    }

    /// Ids with a live adapter.
    pub async fn ids(&self) -> Vec<String> {
        self.adapters.read().await.keys().cloned().collect()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Backend-type constructors, populated once at process start and read-only
/// afterwards.
pub struct FactoryRegistry {
    factories: HashMap<String, Arc<dyn AdapterFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, factory: Arc<dyn AdapterFactory>) {
        let backend = factory.backend_type();
        debug!(backend, name = factory.display_name(), "registered adapter factory");
        if self
            .factories
            .insert(backend.to_string(), factory)
            .is_some()
        {
            warn!(backend, "overwrote existing adapter factory");
        }
    }

    pub fn get(&self, backend: &str) -> Result<Arc<dyn AdapterFactory>> {
        self.factories
            .get(backend)
            .cloned()
            .ok_or_else(|| DataError::UnsupportedBackend(backend.to_string()))
    }

    /// Supported backend types for discovery endpoints, sorted by tag.
    pub fn backend_types(&self) -> Vec<Dict> {
        let mut list: Vec<Dict> = self
            .factories
            .values()
            .map(|f| Dict::new(f.backend_type(), f.display_name(), f.backend_type()))
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dataway_core::Pagination;
    use dataway_entities::DataSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeAdapter {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Adapter for FakeAdapter {
        fn backend_type(&self) -> &'static str {
            "fake"
        }
        async fn ping(&self) -> Result<()> {
            Ok(())
        }
        async fn close(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn table_names(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }
        async fn table_schema(&self, name: &str) -> Result<crate::Table> {
            Ok(crate::Table {
                name: name.to_string(),
                columns: vec![],
            })
        }
        async fn query_table(&self, _table: &str, _page: &mut Pagination) -> Result<()> {
            Ok(())
        }
        async fn query(&self, _expression: &str, _page: &mut Pagination) -> Result<()> {
            Ok(())
        }
    }

    struct FakeFactory;

    #[async_trait]
    impl AdapterFactory for FakeFactory {
        fn backend_type(&self) -> &'static str {
            "fake"
        }
        fn display_name(&self) -> &'static str {
            "Fake"
        }
        async fn create(&self, _source: &DataSource) -> Result<Arc<dyn Adapter>> {
            Ok(Arc::new(FakeAdapter {
                closes: Arc::new(AtomicUsize::new(0)),
            }))
        }
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let registry = AdapterRegistry::new();
        let err = registry.get("missing").await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn put_closes_superseded_adapter_exactly_once() {
        let registry = AdapterRegistry::new();
        let closes = Arc::new(AtomicUsize::new(0));
        registry
            .put("ds1", Arc::new(FakeAdapter { closes: closes.clone() }))
            .await;
        registry
            .put("ds1", Arc::new(FakeAdapter { closes: Arc::new(AtomicUsize::new(0)) }))
            .await;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(registry.get("ds1").await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_puts_leave_one_live_adapter() {
        let registry = Arc::new(AdapterRegistry::new());
        let closes = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            let closes = closes.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .put("ds1", Arc::new(FakeAdapter { closes }))
                    .await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // 8 installs, 7 superseded, each closed exactly once.
        assert_eq!(closes.load(Ordering::SeqCst), 7);
        assert!(registry.get("ds1").await.is_ok());
        assert_eq!(registry.ids().await.len(), 1);
    }

    #[tokio::test]
    async fn del_closes_and_removes() {
        let registry = AdapterRegistry::new();
        let closes = Arc::new(AtomicUsize::new(0));
        registry
            .put("ds1", Arc::new(FakeAdapter { closes: closes.clone() }))
            .await;
        registry.del("ds1").await.unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(registry.get("ds1").await.is_err());
    }

    #[test]
    fn factory_registry_lists_backend_types() {
        let mut factories = FactoryRegistry::new();
        factories.register(Arc::new(FakeFactory));
        let types = factories.backend_types();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].name, "fake");
        assert_eq!(types[0].text, "Fake");
        assert!(factories.get("fake").is_ok());
        assert!(factories.get("sqlite").is_err());
    }
}
