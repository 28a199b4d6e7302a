//! Persistence seams for dataset and data-source records.
//!
//! The services only see these traits; the in-memory implementations back
//! tests and single-node setups, and a database-backed store plugs in
//! behind the same seam.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use dataway_core::{ServiceError, ServiceResult};
use dataway_entities::{DataSource, Dataset};

#[async_trait]
pub trait DatasetStore: Send + Sync {
    async fn insert(&self, dataset: Dataset) -> ServiceResult<()>;

    async fn update(&self, dataset: Dataset) -> ServiceResult<()>;

    async fn delete(&self, id: &str) -> ServiceResult<()>;

    async fn get(&self, id: &str) -> ServiceResult<Option<Dataset>>;

    async fn all(&self) -> ServiceResult<Vec<Dataset>>;

    /// Substring search over name and path; returns the total match count
    /// plus one bounded page.
    async fn search(
        &self,
        name: &str,
        path: &str,
        offset: u64,
        size: u64,
    ) -> ServiceResult<(u64, Vec<Dataset>)>;

    /// Whether another dataset (different id) already uses this name.
    async fn name_taken(&self, name: &str, excluding_id: &str) -> ServiceResult<bool>;

    /// Whether another dataset (different id) already uses this path.
    async fn path_taken(&self, path: &str, excluding_id: &str) -> ServiceResult<bool>;
}

#[async_trait]
pub trait DataSourceStore: Send + Sync {
    async fn insert(&self, source: DataSource) -> ServiceResult<()>;

    async fn update(&self, source: DataSource) -> ServiceResult<()>;

    async fn delete(&self, id: &str) -> ServiceResult<()>;

    async fn get(&self, id: &str) -> ServiceResult<Option<DataSource>>;

    async fn all(&self) -> ServiceResult<Vec<DataSource>>;
}

/// Hash-map store used in tests and single-node deployments.
#[derive(Default)]
pub struct MemoryDatasetStore {
    records: RwLock<HashMap<String, Dataset>>,
}

impl MemoryDatasetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatasetStore for MemoryDatasetStore {
    async fn insert(&self, dataset: Dataset) -> ServiceResult<()> {
        self.records
            .write()
            .await
            .insert(dataset.id.clone(), dataset);
        Ok(())
    }

    async fn update(&self, dataset: Dataset) -> ServiceResult<()> {
        let mut records = self.records.write().await;
        if !records.contains_key(&dataset.id) {
            return Err(ServiceError::not_found(format!("dataset {}", dataset.id)));
        }
        records.insert(dataset.id.clone(), dataset);
        Ok(())
    }

    async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.records.write().await.remove(id);
        Ok(())
    }

    async fn get(&self, id: &str) -> ServiceResult<Option<Dataset>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn all(&self) -> ServiceResult<Vec<Dataset>> {
        let mut list: Vec<Dataset> = self.records.read().await.values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }

    async fn search(
        &self,
        name: &str,
        path: &str,
        offset: u64,
        size: u64,
    ) -> ServiceResult<(u64, Vec<Dataset>)> {
        let mut matches: Vec<Dataset> = self
            .records
            .read()
            .await
            .values()
            .filter(|d| d.name.contains(name) && d.path.contains(path))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        let total = matches.len() as u64;
        let page = matches
            .into_iter()
            .skip(offset as usize)
            .take(size as usize)
            .collect();
        Ok((total, page))
    }

    async fn name_taken(&self, name: &str, excluding_id: &str) -> ServiceResult<bool> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .any(|d| d.name == name && d.id != excluding_id))
    }

    async fn path_taken(&self, path: &str, excluding_id: &str) -> ServiceResult<bool> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .any(|d| d.path == path && d.id != excluding_id))
    }
}

/// Hash-map store used in tests and single-node deployments.
#[derive(Default)]
pub struct MemoryDataSourceStore {
    records: RwLock<HashMap<String, DataSource>>,
}

impl MemoryDataSourceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSourceStore for MemoryDataSourceStore {
    async fn insert(&self, source: DataSource) -> ServiceResult<()> {
        self.records.write().await.insert(source.id.clone(), source);
        Ok(())
    }

    async fn update(&self, source: DataSource) -> ServiceResult<()> {
        let mut records = self.records.write().await;
        if !records.contains_key(&source.id) {
            return Err(ServiceError::not_found(format!("source {}", source.id)));
        }
        records.insert(source.id.clone(), source);
        Ok(())
    }

    async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.records.write().await.remove(id);
        Ok(())
    }

    async fn get(&self, id: &str) -> ServiceResult<Option<DataSource>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn all(&self) -> ServiceResult<Vec<DataSource>> {
        let mut list: Vec<DataSource> = self.records.read().await.values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }
}
