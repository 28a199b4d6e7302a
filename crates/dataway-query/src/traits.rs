use crate::error::Result;
use async_trait::async_trait;
use dataway_core::Pagination;
use dataway_entities::DataSource;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Table structure reported by schema discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub length: i64,
    pub scale: i64,
    pub nullable: bool,
}

/// Uniform query capability over one backend connection pool.
///
/// All I/O honors caller cancellation: dropping the future aborts the
/// in-flight call without corrupting shared state.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Backend type tag of this adapter ("mysql", "postgres", "elastic").
    fn backend_type(&self) -> &'static str;

    /// Check backend connectivity.
    async fn ping(&self) -> Result<()>;

    /// Release the underlying pool. Idempotent.
    async fn close(&self) -> Result<()>;

    /// List the table (or index) names visible to this connection.
    async fn table_names(&self) -> Result<Vec<String>>;

    /// Describe one table's columns.
    async fn table_schema(&self, name: &str) -> Result<Table>;

    /// Query a table with the pagination's optional filter clause, filling
    /// `page.total` and `page.data` in place.
    async fn query_table(&self, table: &str, page: &mut Pagination) -> Result<()>;

    /// Run an arbitrary read expression, paginated. When `page` carries the
    /// unpaged sentinel the adapter skips the COUNT phase and applies
    /// `page.size` as a plain limit.
    async fn query(&self, expression: &str, page: &mut Pagination) -> Result<()>;
}

/// Constructor for one backend type. Construction does not verify
/// connectivity; callers are expected to ping immediately afterwards.
#[async_trait]
pub trait AdapterFactory: Send + Sync {
    /// Backend type tag this factory handles.
    fn backend_type(&self) -> &'static str;

    /// Human-readable label for discovery endpoints.
    fn display_name(&self) -> &'static str;

    /// Build an adapter for the given data source.
    async fn create(&self, source: &DataSource) -> Result<Arc<dyn Adapter>>;
}
