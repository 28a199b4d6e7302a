//! MySQL adapter backed by a sqlx connection pool.
//!
//! Paged reads run in two phases: a `COUNT(*)` over the expression as a
//! derived subquery, then a bounded page with `LIMIT offset, size`. The
//! unpaged sentinel skips the count and applies the batch limit directly.

mod decode;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlPoolOptions};
use sqlx::query::Query;
use sqlx::MySql;
use tracing::debug;

use dataway_core::Pagination;
use dataway_entities::DataSource;
use dataway_query::{Adapter, AdapterFactory, Column, DataError, Result, Table, MYSQL};

use decode::row_to_json;

pub struct MySqlAdapter {
    pool: MySqlPool,
}

impl MySqlAdapter {
    fn bind_params<'q>(
        mut query: Query<'q, MySql, MySqlArguments>,
        params: &[serde_json::Value],
    ) -> Query<'q, MySql, MySqlArguments> {
        for value in params {
            query = match value {
                serde_json::Value::Null => query.bind(None::<String>),
                serde_json::Value::Bool(b) => query.bind(*b),
                serde_json::Value::Number(n) if n.is_i64() => query.bind(n.as_i64()),
                serde_json::Value::Number(n) if n.is_u64() => query.bind(n.as_u64()),
                serde_json::Value::Number(n) => query.bind(n.as_f64()),
                serde_json::Value::String(s) => query.bind(s.clone()),
                other => query.bind(other.to_string()),
            };
        }
        query
    }

    async fn fetch_rows(
        &self,
        sql: &str,
        params: &[serde_json::Value],
    ) -> Result<Vec<dataway_core::Row>> {
        debug!(sql, "mysql query");
        let rows = Self::bind_params(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DataError::QueryFailed(e.to_string()))?;
        rows.iter().map(row_to_json).collect()
    }

    async fn fetch_count(&self, sql: &str, params: &[serde_json::Value]) -> Result<u64> {
        debug!(sql, "mysql count");
        let row = Self::bind_params(sqlx::query(sql), params)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DataError::QueryFailed(e.to_string()))?;
        let total: i64 = sqlx::Row::try_get(&row, 0)
            .map_err(|e| DataError::Serialization(e.to_string()))?;
        Ok(total.max(0) as u64)
    }
}

#[async_trait]
impl Adapter for MySqlAdapter {
    fn backend_type(&self) -> &'static str {
        "mysql"
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SHOW TABLES")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DataError::SchemaError(e.to_string()))?;
        rows.iter()
            .map(|row| {
                sqlx::Row::try_get::<String, _>(row, 0)
                    .map_err(|e| DataError::Serialization(e.to_string()))
            })
            .collect()
    }

    async fn table_schema(&self, name: &str) -> Result<Table> {
        let rows: Vec<(String, String, i64, i64, String)> = sqlx::query_as(
            "SELECT COLUMN_NAME, DATA_TYPE, \
             CAST(IFNULL(CHARACTER_MAXIMUM_LENGTH, IFNULL(NUMERIC_PRECISION, 0)) AS SIGNED), \
             CAST(IFNULL(NUMERIC_SCALE, 0) AS SIGNED), IS_NULLABLE \
             FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = ? \
             ORDER BY ORDINAL_POSITION",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DataError::SchemaError(e.to_string()))?;

        if rows.is_empty() {
            return Err(DataError::SchemaError(format!("unknown table: {}", name)));
        }
        Ok(Table {
            name: name.to_string(),
            columns: rows
                .into_iter()
                .map(|(name, column_type, length, scale, nullable)| Column {
                    name,
                    column_type,
                    length,
                    scale,
                    nullable: nullable.eq_ignore_ascii_case("yes"),
                })
                .collect(),
        })
    }

    async fn query_table(&self, table: &str, page: &mut Pagination) -> Result<()> {
        let clause = page.clause.clone().unwrap_or_default();
        let (fragment, params) = MYSQL.compile(&clause)?;

        let total = self
            .fetch_count(&MYSQL.count_table_sql(table, &fragment), &params)
            .await?;
        if total == 0 {
            page.set(0, Vec::new());
            return Ok(());
        }
        let sql = MYSQL.select_table_sql(table, &fragment, page.offset, page.size);
        let data = self.fetch_rows(&sql, &params).await?;
        page.set(total, data);
        Ok(())
    }

    async fn query(&self, expression: &str, page: &mut Pagination) -> Result<()> {
        if page.is_unpaged() {
            let sql = MYSQL.limit_expression_sql(expression, page.size);
            let data = self.fetch_rows(&sql, &[]).await?;
            page.set(data.len() as u64, data);
            return Ok(());
        }

        let total = self
            .fetch_count(&MYSQL.count_expression_sql(expression), &[])
            .await?;
        if total == 0 {
            page.set(0, Vec::new());
            return Ok(());
        }
        let sql = MYSQL.page_expression_sql(expression, page.offset, page.size);
        let data = self.fetch_rows(&sql, &[]).await?;
        page.set(total, data);
        Ok(())
    }
}

/// Builds [`MySqlAdapter`]s. The pool connects lazily, so creation alone
/// never touches the network; callers ping right after.
#[derive(Default)]
pub struct MySqlFactory;

#[async_trait]
impl AdapterFactory for MySqlFactory {
    fn backend_type(&self) -> &'static str {
        "mysql"
    }

    fn display_name(&self) -> &'static str {
        "MySQL"
    }

    async fn create(&self, source: &DataSource) -> Result<Arc<dyn Adapter>> {
        let mut source = source.clone();
        source.normalize_pool_limits();
        let pool = MySqlPoolOptions::new()
            .min_connections(source.max_idle_conns)
            .max_connections(source.max_open_conns)
            .connect_lazy(&source.url)
            .map_err(|e| DataError::ConnectionFailed(e.to_string()))?;
        Ok(Arc::new(MySqlAdapter { pool }))
    }
}
