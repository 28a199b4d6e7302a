//! Data-source CRUD and adapter provisioning.
//!
//! Every mutation re-provisions the live adapter for the record, so the
//! registry converges on the saved configuration. Provisioning failures
//! are logged and the record still saves; the serving path reports the
//! backend as unavailable until a later ping succeeds.

use std::sync::Arc;

use tracing::{info, warn};

use dataway_cache::{get_typed, set_typed, Cache};
use dataway_core::{Dict, Pagination, ServiceError, ServiceResult};
use dataway_entities::{new_id, DataSource};
use dataway_query::{AdapterRegistry, DataError, FactoryRegistry, Table};

use crate::keys;
use crate::store::DataSourceStore;

pub struct DataSourceService {
    store: Arc<dyn DataSourceStore>,
    cache: Arc<dyn Cache>,
    adapters: Arc<AdapterRegistry>,
    factories: Arc<FactoryRegistry>,
}

impl DataSourceService {
    pub fn new(
        store: Arc<dyn DataSourceStore>,
        cache: Arc<dyn Cache>,
        adapters: Arc<AdapterRegistry>,
        factories: Arc<FactoryRegistry>,
    ) -> Self {
        Self {
            store,
            cache,
            adapters,
            factories,
        }
    }

    pub async fn create(&self, mut source: DataSource) -> ServiceResult<DataSource> {
        validate(&source)?;
        source.id = new_id();
        source.normalize_pool_limits();
        self.store.insert(source.clone()).await?;
        self.clear_cache("all").await;
        self.put_adapter(&source).await;
        Ok(source)
    }

    pub async fn modify(&self, mut source: DataSource) -> ServiceResult<DataSource> {
        if source.id.is_empty() {
            return Err(ServiceError::validation("data source id is required"));
        }
        validate(&source)?;
        source.normalize_pool_limits();
        self.store.update(source.clone()).await?;
        self.clear_cache("all").await;
        self.clear_cache(&source.id).await;
        self.put_adapter(&source).await;
        Ok(source)
    }

    pub async fn remove(&self, id: &str) -> ServiceResult<()> {
        let backend = self
            .store
            .get(id)
            .await?
            .map(|s| s.source_type)
            .unwrap_or_default();
        self.store.delete(id).await?;
        self.clear_cache("all").await;
        self.clear_cache(id).await;
        // A source that never provisioned has no adapter to drop.
        if let Err(e) = self.adapters.del(id).await {
            if !e.is_not_found() {
                return Err(map_backend_error(id, &backend, e));
            }
        }
        Ok(())
    }

    pub async fn all(&self) -> ServiceResult<Vec<DataSource>> {
        if let Ok(Some(list)) =
            get_typed::<Vec<DataSource>>(self.cache.as_ref(), keys::DATASOURCE_ALL).await
        {
            return Ok(list);
        }
        let list = self.store.all().await?;
        if let Err(e) = set_typed(self.cache.as_ref(), keys::DATASOURCE_ALL, &list, keys::META_TTL).await
        {
            warn!(error = %e, "data source cache write failed");
        }
        Ok(list)
    }

    pub async fn by_id(&self, id: &str) -> ServiceResult<Option<DataSource>> {
        self.store.get(id).await
    }

    /// Verify a configuration with a throwaway adapter: build, ping, close.
    /// The registry is never touched.
    pub async fn test_connection(&self, source: &DataSource) -> ServiceResult<()> {
        validate(source)?;
        let factory = self
            .factories
            .get(&source.source_type)
            .map_err(|e| ServiceError::validation(e.to_string()))?;
        let adapter = factory
            .create(source)
            .await
            .map_err(|e| map_backend_error(&source.id, &source.source_type, e))?;
        let outcome = adapter.ping().await;
        if let Err(e) = adapter.close().await {
            warn!(source_type = %source.source_type, error = %e, "test adapter close failed");
        }
        outcome.map_err(|e| map_backend_error(&source.id, &source.source_type, e))
    }

    /// Backend types with live factories, for discovery endpoints.
    pub fn backend_types(&self) -> Vec<Dict> {
        self.factories.backend_types()
    }

    pub async fn table_names(&self, id: &str) -> ServiceResult<Vec<String>> {
        let adapter = self
            .adapters
            .get(id)
            .await
            .map_err(|_| ServiceError::backend_unavailable(id))?;
        adapter
            .table_names()
            .await
            .map_err(|e| map_backend_error(id, adapter.backend_type(), e))
    }

    pub async fn table_schema(&self, id: &str, name: &str) -> ServiceResult<Table> {
        let adapter = self
            .adapters
            .get(id)
            .await
            .map_err(|_| ServiceError::backend_unavailable(id))?;
        adapter
            .table_schema(name)
            .await
            .map_err(|e| map_backend_error(id, adapter.backend_type(), e))
    }

    pub async fn query_table(
        &self,
        id: &str,
        table: &str,
        page: &mut Pagination,
    ) -> ServiceResult<()> {
        let adapter = self
            .adapters
            .get(id)
            .await
            .map_err(|_| ServiceError::backend_unavailable(id))?;
        adapter
            .query_table(table, page)
            .await
            .map_err(|e| map_backend_error(id, adapter.backend_type(), e))
    }

    pub async fn query(
        &self,
        id: &str,
        expression: &str,
        page: &mut Pagination,
    ) -> ServiceResult<()> {
        let adapter = self
            .adapters
            .get(id)
            .await
            .map_err(|_| ServiceError::backend_unavailable(id))?;
        adapter
            .query(expression, page)
            .await
            .map_err(|e| map_backend_error(id, adapter.backend_type(), e))
    }

    /// Build and register an adapter for a saved record. A failed build or
    /// ping is logged, not surfaced.
    pub async fn put_adapter(&self, source: &DataSource) {
        let factory = match self.factories.get(&source.source_type) {
            Ok(factory) => factory,
            Err(e) => {
                warn!(id = %source.id, source_type = %source.source_type, error = %e,
                    "no factory for data source");
                return;
            }
        };
        let adapter = match factory.create(source).await {
            Ok(adapter) => adapter,
            Err(e) => {
                warn!(id = %source.id, source_type = %source.source_type, error = %e,
                    "data source adapter build failed");
                return;
            }
        };
        match adapter.ping().await {
            Ok(()) => info!(id = %source.id, source_type = %source.source_type,
                "data source connected"),
            Err(e) => warn!(id = %source.id, source_type = %source.source_type, error = %e,
                "data source unreachable"),
        }
        self.adapters.put(&source.id, adapter).await;
    }

    /// Provision adapters for every saved record. Run at startup, after
    /// the factories are registered.
    pub async fn provision_all(&self) -> ServiceResult<()> {
        info!("provisioning data source adapters");
        let list = self.all().await?;
        for source in &list {
            self.put_adapter(source).await;
        }
        Ok(())
    }

    async fn clear_cache(&self, id: &str) {
        if let Err(e) = self.cache.del_match(&keys::datasource_pattern(id)).await {
            warn!(id, error = %e, "data source cache clear failed");
        }
    }

}

fn map_backend_error(id: &str, backend: &str, e: DataError) -> ServiceError {
    if e.is_not_found() {
        ServiceError::backend_unavailable(id)
    } else {
        ServiceError::backend(id, backend, e.to_string())
    }
}

fn validate(source: &DataSource) -> ServiceResult<()> {
    if source.source_type.trim().is_empty()
        || source.name.trim().is_empty()
        || source.url.trim().is_empty()
    {
        return Err(ServiceError::validation(
            "type, name and url are all required",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDataSourceStore;
    use async_trait::async_trait;
    use dataway_cache::MemoryCache;
    use dataway_query::{Adapter, AdapterFactory, Result as DataResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeAdapter {
        pings: AtomicUsize,
        closes: AtomicUsize,
    }

    #[async_trait]
    impl Adapter for FakeAdapter {
        fn backend_type(&self) -> &'static str {
            "fake"
        }
        async fn ping(&self) -> DataResult<()> {
            self.pings.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn close(&self) -> DataResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn table_names(&self) -> DataResult<Vec<String>> {
            Ok(vec!["users".to_string()])
        }
        async fn table_schema(&self, name: &str) -> DataResult<Table> {
            Ok(Table {
                name: name.to_string(),
                columns: Vec::new(),
            })
        }
        async fn query_table(&self, _table: &str, page: &mut Pagination) -> DataResult<()> {
            page.set(0, Vec::new());
            Ok(())
        }
        async fn query(&self, _expression: &str, page: &mut Pagination) -> DataResult<()> {
            page.set(0, Vec::new());
            Ok(())
        }
    }

    /// Adapter whose data operations always fail.
    struct BrokenAdapter;

    #[async_trait]
    impl Adapter for BrokenAdapter {
        fn backend_type(&self) -> &'static str {
            "fake"
        }
        async fn ping(&self) -> DataResult<()> {
            Ok(())
        }
        async fn close(&self) -> DataResult<()> {
            Ok(())
        }
        async fn table_names(&self) -> DataResult<Vec<String>> {
            Err(DataError::QueryFailed("boom".to_string()))
        }
        async fn table_schema(&self, _name: &str) -> DataResult<Table> {
            Err(DataError::QueryFailed("boom".to_string()))
        }
        async fn query_table(&self, _table: &str, _page: &mut Pagination) -> DataResult<()> {
            Err(DataError::QueryFailed("boom".to_string()))
        }
        async fn query(&self, _expression: &str, _page: &mut Pagination) -> DataResult<()> {
            Err(DataError::QueryFailed("boom".to_string()))
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
        async fn create(&self, _source: &DataSource) -> DataResult<Arc<dyn Adapter>> {
            Ok(Arc::new(FakeAdapter {
                pings: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
            }))
        }
    }

    fn service() -> DataSourceService {
        let mut factories = FactoryRegistry::new();
        factories.register(Arc::new(FakeFactory));
        DataSourceService::new(
            Arc::new(MemoryDataSourceStore::new()),
            Arc::new(MemoryCache::new()),
            Arc::new(AdapterRegistry::new()),
            Arc::new(factories),
        )
    }

    fn fake_source(name: &str) -> DataSource {
        DataSource {
            source_type: "fake".to_string(),
            name: name.to_string(),
            url: "fake://localhost".to_string(),
            ..DataSource::default()
        }
    }

    #[tokio::test]
    async fn create_provisions_an_adapter() {
        let svc = service();
        let created = svc.create(fake_source("a")).await.unwrap();
        assert!(!created.id.is_empty());
        assert_eq!(created.max_idle_conns, 1);
        assert_eq!(created.max_open_conns, 8);
        // The adapter is live: schema discovery goes through the registry.
        let tables = svc.table_names(&created.id).await.unwrap();
        assert_eq!(tables, vec!["users".to_string()]);
    }

    #[tokio::test]
    async fn create_rejects_blank_fields() {
        let svc = service();
        let mut source = fake_source("a");
        source.url = String::new();
        let err = svc.create(source).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[tokio::test]
    async fn unknown_backend_type_saves_without_adapter() {
        let svc = service();
        let mut source = fake_source("a");
        source.source_type = "warehouse".to_string();
        let created = svc.create(source).await.unwrap();
        let err = svc.table_names(&created.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::BackendUnavailable { .. }));
    }

    #[tokio::test]
    async fn remove_drops_the_adapter() {
        let svc = service();
        let created = svc.create(fake_source("a")).await.unwrap();
        svc.remove(&created.id).await.unwrap();
        let err = svc.table_names(&created.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::BackendUnavailable { .. }));
        // Removing a source with no live adapter is not an error.
        svc.remove("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_never_touches_the_registry() {
        let svc = service();
        let source = fake_source("a");
        svc.test_connection(&source).await.unwrap();
        let err = svc.table_names(&source.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::BackendUnavailable { .. }));
    }

    #[tokio::test]
    async fn backend_errors_carry_the_backend_type() {
        let svc = service();
        let created = svc.create(fake_source("a")).await.unwrap();
        svc.adapters.put(&created.id, Arc::new(BrokenAdapter)).await;

        let err = svc
            .query(&created.id, "select 1", &mut Pagination::new(1, 10))
            .await
            .unwrap_err();
        match err {
            ServiceError::Backend {
                source_id, backend, ..
            } => {
                assert_eq!(source_id, created.id);
                assert_eq!(backend, "fake");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = svc.table_names(&created.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Backend { .. }));
    }

    #[tokio::test]
    async fn provision_all_loads_every_saved_source() {
        let svc = service();
        let a = svc.create(fake_source("a")).await.unwrap();
        let b = svc.create(fake_source("b")).await.unwrap();
        svc.provision_all().await.unwrap();
        assert!(svc.table_names(&a.id).await.is_ok());
        assert!(svc.table_names(&b.id).await.is_ok());
    }
}
