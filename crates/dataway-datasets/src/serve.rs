//! The serving hot path: route match, parameter merge, cache-aside
//! result lookup, template render, backend query and response shaping.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use dataway_cache::{get_typed, set_typed, Cache};
use dataway_core::{Pagination, Row, ServiceError, ServiceResult};
use dataway_entities::{ConvertType, Dataset};
use dataway_query::AdapterRegistry;
use dataway_template::TemplateEngine;

use crate::dataset::DatasetService;
use crate::keys;
use crate::sync::RouterHandle;

pub struct ServeEngine {
    datasets: Arc<DatasetService>,
    adapters: Arc<AdapterRegistry>,
    cache: Arc<dyn Cache>,
    routes: Arc<RouterHandle>,
    engine: TemplateEngine,
}

impl ServeEngine {
    pub fn new(
        datasets: Arc<DatasetService>,
        adapters: Arc<AdapterRegistry>,
        cache: Arc<dyn Cache>,
        routes: Arc<RouterHandle>,
    ) -> Self {
        Self {
            datasets,
            adapters,
            cache,
            routes,
            engine: TemplateEngine::new(),
        }
    }

    /// Serve one request. `path` is the request path with the serving
    /// prefix already stripped; `query` and `body` are the request's
    /// parameter maps.
    pub async fn serve_api(
        &self,
        path: &str,
        query: serde_json::Map<String, Value>,
        body: serde_json::Map<String, Value>,
    ) -> ServiceResult<Pagination> {
        // Precedence: query < body < path captures.
        let mut params: BTreeMap<String, Value> = BTreeMap::new();
        params.extend(query);
        params.extend(body);

        let Some(matched) = self.routes.current().match_path(path) else {
            return Err(ServiceError::not_found("no API at this path"));
        };
        for (name, value) in matched.params {
            params.insert(name, Value::String(value));
        }

        let Some(dataset) = self.datasets.detail(&matched.dataset_id).await? else {
            return Err(ServiceError::not_found("no API at this path"));
        };
        if !dataset.publish_status {
            return Err(ServiceError::not_found("no API at this path"));
        }

        let pagination = resolve_pagination(&mut params, &dataset)?;

        if dataset.enable_cache {
            self.select_cached(&dataset, pagination, &params).await
        } else {
            self.select(&dataset, pagination, &params).await
        }
    }

    /// Run a dataset definition that may not be saved yet, for the editing
    /// UI. Same pipeline as serving minus routing and the result cache.
    pub async fn preview(
        &self,
        dataset: &Dataset,
        params: serde_json::Map<String, Value>,
    ) -> ServiceResult<Pagination> {
        let mut params: BTreeMap<String, Value> = params.into_iter().collect();
        let pagination = resolve_pagination(&mut params, dataset)?;
        self.select(dataset, pagination, &params).await
    }

    async fn select_cached(
        &self,
        dataset: &Dataset,
        pagination: Pagination,
        params: &BTreeMap<String, Value>,
    ) -> ServiceResult<Pagination> {
        let key = keys::dataset_result(&dataset.id, &keys::param_hash(params));
        if let Ok(Some(hit)) = get_typed::<Pagination>(self.cache.as_ref(), &key).await {
            debug!(id = %dataset.id, key, "served from cache");
            return Ok(hit);
        }
        debug!(id = %dataset.id, key, "result cache miss");
        let result = self.select(dataset, pagination, params).await?;
        if let Err(e) = set_typed(
            self.cache.as_ref(),
            &key,
            &result,
            Duration::from_secs(dataset.expire_seconds),
        )
        .await
        {
            // Serving still succeeded; the next request pays the query again.
            debug!(id = %dataset.id, key, error = %e, "result cache write failed");
        }
        Ok(result)
    }

    async fn select(
        &self,
        dataset: &Dataset,
        mut pagination: Pagination,
        params: &BTreeMap<String, Value>,
    ) -> ServiceResult<Pagination> {
        let adapter = self
            .adapters
            .get(&dataset.source_id)
            .await
            .map_err(|_| ServiceError::backend_unavailable(&dataset.source_id))?;

        let data: Value = Value::Object(params.clone().into_iter().collect());
        let expression = self
            .engine
            .render(&dataset.expression, &data)
            .map_err(|e| ServiceError::Template(e.to_string()))?;
        info!(id = %dataset.id, expression, "serving expression");

        adapter
            .query(&expression, &mut pagination)
            .await
            .map_err(|e| {
                ServiceError::backend(&dataset.source_id, adapter.backend_type(), e.to_string())
            })?;

        for row in &mut pagination.data {
            project_row(row, dataset);
        }
        Ok(pagination)
    }
}

/// Resolve the page request from the merged parameters. The normalized
/// `page`/`size` are written back into the map, so `"1"`, `1` and an
/// omitted page all produce the same result cache key.
fn resolve_pagination(
    params: &mut BTreeMap<String, Value>,
    dataset: &Dataset,
) -> ServiceResult<Pagination> {
    if !dataset.enable_page {
        params.insert("page".to_string(), Value::from(0u64));
        params.insert("size".to_string(), Value::from(dataset.batch_limit));
        return Ok(Pagination::unpaged(dataset.batch_limit));
    }
    let page = parse_page_number(params.get("page"), "page")?;
    let size = parse_page_number(params.get("size"), "size")?;
    let pagination = Pagination::new(page, size);
    params.insert("page".to_string(), Value::from(pagination.page));
    params.insert("size".to_string(), Value::from(pagination.size));
    Ok(pagination)
}

fn parse_page_number(value: Option<&Value>, name: &str) -> ServiceResult<u64> {
    let Some(value) = value else {
        return Ok(0);
    };
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        ServiceError::bad_request(format!(
            "parameter {} must be a non-negative integer: {}",
            name, value
        ))
    })
}

/// Keep only the declared response fields, applying conversions.
fn project_row(row: &mut Row, dataset: &Dataset) {
    row.retain(|key, _| dataset.response_params.iter().any(|p| p.name == *key));
    for param in &dataset.response_params {
        match param.convert_type {
            ConvertType::None => {}
            ConvertType::Rename => {
                if let Some(value) = row.remove(&param.name) {
                    row.insert(param.convert_value.clone(), value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDatasetStore;
    use async_trait::async_trait;
    use dataway_cache::MemoryCache;
    use dataway_entities::{ParamType, ResponseParam};
    use dataway_query::{Adapter, Result as DataResult, Table};
    use dataway_router::PathTrie;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Adapter that records each expression and answers with fixed rows.
    struct RecordingAdapter {
        queries: AtomicUsize,
        last_expression: Mutex<String>,
        rows: Vec<Row>,
    }

    impl RecordingAdapter {
        fn new(rows: Vec<Row>) -> Self {
            Self {
                queries: AtomicUsize::new(0),
                last_expression: Mutex::new(String::new()),
                rows,
            }
        }
    }

    #[async_trait]
    impl Adapter for RecordingAdapter {
        fn backend_type(&self) -> &'static str {
            "recording"
        }
        async fn ping(&self) -> DataResult<()> {
            Ok(())
        }
        async fn close(&self) -> DataResult<()> {
            Ok(())
        }
        async fn table_names(&self) -> DataResult<Vec<String>> {
            Ok(Vec::new())
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
        async fn query(&self, expression: &str, page: &mut Pagination) -> DataResult<()> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            *self.last_expression.lock() = expression.to_string();
            page.set(self.rows.len() as u64, self.rows.clone());
            Ok(())
        }
    }

    struct Fixture {
        engine: ServeEngine,
        adapter: Arc<RecordingAdapter>,
        dataset_id: String,
    }

    fn sample_rows() -> Vec<Row> {
        let row = json!({"id": 1, "name": "ada", "secret": "hunter2"});
        match row {
            Value::Object(map) => vec![map],
            _ => unreachable!(),
        }
    }

    async fn fixture(mutate: impl FnOnce(&mut Dataset)) -> Fixture {
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
        let datasets = Arc::new(DatasetService::new(
            Arc::new(MemoryDatasetStore::new()),
            cache.clone(),
        ));
        let adapters = Arc::new(AdapterRegistry::new());
        let adapter = Arc::new(RecordingAdapter::new(sample_rows()));
        adapters.put("src1", adapter.clone()).await;

        let mut dataset = Dataset {
            name: "users".to_string(),
            path: "users/:name".to_string(),
            source_id: "src1".to_string(),
            expression: "select * from users where name = '{{name}}'".to_string(),
            publish_status: true,
            enable_page: true,
            response_params: vec![
                ResponseParam {
                    id: String::new(),
                    dataset_id: String::new(),
                    name: "id".to_string(),
                    description: String::new(),
                    param_type: ParamType::Long,
                    convert_type: ConvertType::Rename,
                    convert_value: "userId".to_string(),
                },
                ResponseParam {
                    id: String::new(),
                    dataset_id: String::new(),
                    name: "name".to_string(),
                    description: String::new(),
                    param_type: ParamType::String,
                    convert_type: ConvertType::None,
                    convert_value: String::new(),
                },
            ],
            ..Dataset::default()
        };
        mutate(&mut dataset);
        let created = datasets.create(dataset).await.unwrap();

        let mut trie = PathTrie::new();
        trie.add(&created.path, &created.id).unwrap();
        let routes = Arc::new(RouterHandle::new());
        routes.swap(trie);

        Fixture {
            engine: ServeEngine::new(datasets, adapters, cache, routes),
            adapter,
            dataset_id: created.id,
        }
    }

    fn map(value: Value) -> serde_json::Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn serve_projects_and_renames_fields() {
        let fx = fixture(|_| {}).await;
        let result = fx
            .engine
            .serve_api("users/ada", map(json!({})), map(json!({})))
            .await
            .unwrap();
        assert_eq!(result.total, 1);
        let row = &result.data[0];
        assert_eq!(row["userId"], json!(1));
        assert_eq!(row["name"], json!("ada"));
        assert!(!row.contains_key("secret"));
        assert!(!row.contains_key("id"));
    }

    #[tokio::test]
    async fn path_capture_beats_body_and_query() {
        let fx = fixture(|_| {}).await;
        fx.engine
            .serve_api(
                "users/ada",
                map(json!({"name": "from-query"})),
                map(json!({"name": "from-body"})),
            )
            .await
            .unwrap();
        let expression = fx.adapter.last_expression.lock().clone();
        assert_eq!(expression, "select * from users where name = 'ada'");
    }

    #[tokio::test]
    async fn body_beats_query() {
        let fx = fixture(|d| {
            d.path = "users".to_string();
        })
        .await;
        fx.engine
            .serve_api(
                "users",
                map(json!({"name": "from-query"})),
                map(json!({"name": "from-body"})),
            )
            .await
            .unwrap();
        let expression = fx.adapter.last_expression.lock().clone();
        assert_eq!(
            expression,
            "select * from users where name = 'from-body'"
        );
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let fx = fixture(|_| {}).await;
        let err = fx
            .engine
            .serve_api("nope", map(json!({})), map(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn unpublished_dataset_is_not_found() {
        let fx = fixture(|d| {
            d.publish_status = false;
        })
        .await;
        let err = fx
            .engine
            .serve_api("users/ada", map(json!({})), map(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn non_numeric_page_is_a_bad_request() {
        let fx = fixture(|_| {}).await;
        let err = fx
            .engine
            .serve_api(
                "users/ada",
                map(json!({"page": "first"})),
                map(json!({})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn extreme_page_number_still_serves() {
        let fx = fixture(|_| {}).await;
        let result = fx
            .engine
            .serve_api(
                "users/ada",
                map(json!({"page": u64::MAX.to_string(), "size": "10"})),
                map(json!({})),
            )
            .await
            .unwrap();
        assert_eq!(result.page, u64::MAX);
    }

    #[tokio::test]
    async fn paging_disabled_applies_the_batch_limit() {
        let fx = fixture(|d| {
            d.enable_page = false;
            d.batch_limit = 500;
        })
        .await;
        let result = fx
            .engine
            .serve_api(
                "users/ada",
                map(json!({"page": "9", "size": "50"})),
                map(json!({})),
            )
            .await
            .unwrap();
        // The adapter saw the unpaged sentinel, not page 9.
        assert_eq!(result.page, 0);
        assert_eq!(result.size, 500);
    }

    #[tokio::test]
    async fn cached_dataset_queries_the_backend_once() {
        let fx = fixture(|d| {
            d.enable_cache = true;
            d.expire_seconds = 60;
        })
        .await;
        let first = fx
            .engine
            .serve_api("users/ada", map(json!({})), map(json!({})))
            .await
            .unwrap();
        assert_eq!(fx.adapter.queries.load(Ordering::SeqCst), 1);

        let second = fx
            .engine
            .serve_api("users/ada", map(json!({})), map(json!({})))
            .await
            .unwrap();
        assert_eq!(fx.adapter.queries.load(Ordering::SeqCst), 1);
        assert_eq!(first.total, second.total);
        assert_eq!(first.data, second.data);

        // Different parameters are a different cache entry.
        fx.engine
            .serve_api("users/bob", map(json!({})), map(json!({})))
            .await
            .unwrap();
        assert_eq!(fx.adapter.queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn equivalent_page_params_share_a_cache_entry() {
        let fx = fixture(|d| {
            d.enable_cache = true;
            d.expire_seconds = 60;
        })
        .await;
        // Omitted, string and numeric spellings of the default page.
        fx.engine
            .serve_api("users/ada", map(json!({})), map(json!({})))
            .await
            .unwrap();
        fx.engine
            .serve_api(
                "users/ada",
                map(json!({"page": "1", "size": "10"})),
                map(json!({})),
            )
            .await
            .unwrap();
        fx.engine
            .serve_api(
                "users/ada",
                map(json!({"page": 1, "size": 10})),
                map(json!({})),
            )
            .await
            .unwrap();
        assert_eq!(fx.adapter.queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mutation_clears_served_results() {
        let fx = fixture(|d| {
            d.enable_cache = true;
            d.expire_seconds = 60;
        })
        .await;
        fx.engine
            .serve_api("users/ada", map(json!({})), map(json!({})))
            .await
            .unwrap();
        assert_eq!(fx.adapter.queries.load(Ordering::SeqCst), 1);

        fx.engine.datasets.clear_cache(&fx.dataset_id).await;

        fx.engine
            .serve_api("users/ada", map(json!({})), map(json!({})))
            .await
            .unwrap();
        assert_eq!(fx.adapter.queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn preview_runs_an_unsaved_definition() {
        let fx = fixture(|_| {}).await;
        let mut draft = Dataset {
            source_id: "src1".to_string(),
            expression: "select * from users where name = '{{name}}'".to_string(),
            enable_page: false,
            batch_limit: 20,
            response_params: vec![ResponseParam {
                id: String::new(),
                dataset_id: String::new(),
                name: "name".to_string(),
                description: String::new(),
                param_type: ParamType::String,
                convert_type: ConvertType::None,
                convert_value: String::new(),
            }],
            ..Dataset::default()
        };
        draft.publish_status = false;
        let result = fx
            .engine
            .preview(&draft, map(json!({"name": "ada"})))
            .await
            .unwrap();
        assert_eq!(result.data[0]["name"], json!("ada"));
        assert!(!result.data[0].contains_key("id"));
        let expression = fx.adapter.last_expression.lock().clone();
        assert_eq!(expression, "select * from users where name = 'ada'");
    }

    #[tokio::test]
    async fn missing_adapter_is_backend_unavailable() {
        let fx = fixture(|d| {
            d.source_id = "gone".to_string();
        })
        .await;
        let err = fx
            .engine
            .serve_api("users/ada", map(json!({})), map(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BackendUnavailable { .. }));
    }
}
