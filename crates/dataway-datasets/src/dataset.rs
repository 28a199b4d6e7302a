//! Dataset CRUD, publication and documentation.
//!
//! Reads are cache-aside over three keys per dataset (list, record,
//! detail); every mutation clears the affected metadata keys plus the
//! dataset's served-result keys, so the serving path converges after the
//! next router rebuild.

use std::sync::Arc;

use tracing::{debug, warn};

use dataway_cache::{get_typed, set_typed, Cache};
use dataway_core::{Pagination, ServiceError, ServiceResult};
use dataway_entities::{new_id, ConvertType, Dataset};
use dataway_template::{render_api_doc, TemplateEngine};

use crate::keys;
use crate::store::DatasetStore;

pub struct DatasetService {
    store: Arc<dyn DatasetStore>,
    cache: Arc<dyn Cache>,
    engine: TemplateEngine,
}

impl DatasetService {
    pub fn new(store: Arc<dyn DatasetStore>, cache: Arc<dyn Cache>) -> Self {
        Self {
            store,
            cache,
            engine: TemplateEngine::new(),
        }
    }

    pub async fn create(&self, mut dataset: Dataset) -> ServiceResult<Dataset> {
        dataset.id = new_id();
        self.validate(&mut dataset).await?;
        assign_param_ids(&mut dataset);
        self.store.insert(dataset.clone()).await?;
        self.clear_cache("all").await;
        Ok(dataset)
    }

    pub async fn modify(&self, mut dataset: Dataset) -> ServiceResult<Dataset> {
        if dataset.id.is_empty() {
            return Err(ServiceError::validation("dataset id is required"));
        }
        self.validate(&mut dataset).await?;
        assign_param_ids(&mut dataset);
        self.store.update(dataset.clone()).await?;
        self.clear_cache("all").await;
        self.clear_cache(&dataset.id).await;
        Ok(dataset)
    }

    pub async fn remove(&self, id: &str) -> ServiceResult<()> {
        self.store.delete(id).await?;
        self.clear_cache("all").await;
        self.clear_cache(id).await;
        Ok(())
    }

    /// Paged search by name and path substrings.
    pub async fn page(&self, name: &str, path: &str, page: &mut Pagination) -> ServiceResult<()> {
        let (total, list) = self
            .store
            .search(name, path, page.offset, page.size)
            .await?;
        if total == 0 {
            return Ok(());
        }
        let data = list
            .into_iter()
            .filter_map(|d| match serde_json::to_value(d) {
                Ok(serde_json::Value::Object(map)) => Some(map),
                _ => None,
            })
            .collect();
        page.set(total, data);
        Ok(())
    }

    pub async fn all(&self) -> ServiceResult<Vec<Dataset>> {
        if let Ok(Some(list)) = get_typed::<Vec<Dataset>>(self.cache.as_ref(), keys::DATASET_ALL).await
        {
            return Ok(list);
        }
        let list = self.store.all().await?;
        self.cache_put(keys::DATASET_ALL, &list).await;
        Ok(list)
    }

    pub async fn by_id(&self, id: &str) -> ServiceResult<Option<Dataset>> {
        let key = keys::dataset(id);
        if let Ok(Some(dataset)) = get_typed::<Dataset>(self.cache.as_ref(), &key).await {
            return Ok(Some(dataset));
        }
        let Some(dataset) = self.store.get(id).await? else {
            return Ok(None);
        };
        self.cache_put(&key, &dataset).await;
        Ok(Some(dataset))
    }

    /// Record plus its parameter lists. Backed by its own cache key so the
    /// serving hot path stays a single cache read.
    pub async fn detail(&self, id: &str) -> ServiceResult<Option<Dataset>> {
        let key = keys::dataset_detail(id);
        if let Ok(Some(dataset)) = get_typed::<Dataset>(self.cache.as_ref(), &key).await {
            return Ok(Some(dataset));
        }
        let Some(dataset) = self.store.get(id).await? else {
            return Ok(None);
        };
        self.cache_put(&key, &dataset).await;
        Ok(Some(dataset))
    }

    pub async fn change_publish_status(&self, id: &str, status: bool) -> ServiceResult<()> {
        let Some(mut dataset) = self.store.get(id).await? else {
            return Err(ServiceError::not_found(format!("dataset {}", id)));
        };
        dataset.publish_status = status;
        self.store.update(dataset).await?;
        self.clear_cache("all").await;
        self.clear_cache(id).await;
        Ok(())
    }

    /// Markdown API document for a published dataset.
    pub async fn render_doc(&self, id: &str, serve_prefix: &str) -> ServiceResult<String> {
        let Some(dataset) = self.detail(id).await? else {
            return Err(ServiceError::not_found(format!("dataset {}", id)));
        };
        if !dataset.publish_status {
            return Err(ServiceError::validation("dataset is not published"));
        }
        render_api_doc(&dataset, serve_prefix).map_err(|e| ServiceError::Template(e.to_string()))
    }

    /// Propose request parameters from an expression's variables.
    pub fn parse_expression(
        &self,
        expression: &str,
    ) -> ServiceResult<Vec<dataway_entities::RequestParam>> {
        if expression.is_empty() {
            return Ok(Vec::new());
        }
        self.engine
            .suggest_request_params(expression)
            .map_err(|e| ServiceError::Template(e.to_string()))
    }

    async fn cache_put<T: serde::Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = set_typed(self.cache.as_ref(), key, value, keys::META_TTL).await {
            warn!(key, error = %e, "dataset cache write failed");
        }
    }

    /// Drop the metadata keys for `id` plus all of its served results.
    /// Cache failures are logged, never surfaced; the store stays the
    /// source of truth.
    pub(crate) async fn clear_cache(&self, id: &str) {
        debug!(id, "clearing dataset cache");
        if let Err(e) = self.cache.del_match(&keys::dataset_pattern(id)).await {
            warn!(id, error = %e, "dataset cache clear failed");
        }
        if let Err(e) = self
            .cache
            .del_match(&keys::dataset_result_pattern(id))
            .await
        {
            warn!(id, error = %e, "dataset result cache clear failed");
        }
    }

    async fn validate(&self, dataset: &mut Dataset) -> ServiceResult<()> {
        if dataset.name.trim().is_empty() {
            return Err(ServiceError::validation("dataset name is required"));
        }
        dataset.path = dataset.path.trim_start_matches('/').to_string();
        if dataset.path.is_empty() {
            return Err(ServiceError::validation("dataset path is required"));
        }
        if dataset.source_id.is_empty() {
            return Err(ServiceError::validation("dataset source is required"));
        }
        if dataset.response_params.is_empty() {
            return Err(ServiceError::validation(
                "at least one response parameter is required",
            ));
        }
        for param in &dataset.request_params {
            if param.name.trim().is_empty() {
                return Err(ServiceError::validation("request parameter name is required"));
            }
        }
        for param in &dataset.response_params {
            if param.name.trim().is_empty() {
                return Err(ServiceError::validation(
                    "response parameter name is required",
                ));
            }
            if param.convert_type == ConvertType::Rename && param.convert_value.trim().is_empty() {
                return Err(ServiceError::validation(
                    "renamed response parameter needs an alias",
                ));
            }
        }
        if self.store.name_taken(&dataset.name, &dataset.id).await? {
            return Err(ServiceError::validation(format!(
                "dataset name already exists: {}",
                dataset.name
            )));
        }
        if self.store.path_taken(&dataset.path, &dataset.id).await? {
            return Err(ServiceError::validation(format!(
                "dataset path already exists: {}",
                dataset.path
            )));
        }
        Ok(())
    }
}

fn assign_param_ids(dataset: &mut Dataset) {
    for param in &mut dataset.request_params {
        param.id = new_id();
        param.dataset_id = dataset.id.clone();
    }
    for param in &mut dataset.response_params {
        param.id = new_id();
        param.dataset_id = dataset.id.clone();
    }
}
