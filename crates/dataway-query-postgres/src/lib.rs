//! PostgreSQL adapter over tokio-postgres.
//!
//! The driver hands back a client plus a connection task; the task is
//! spawned onto the runtime and the client lives behind an `RwLock` so
//! `close` can drop it exactly once. Paged reads follow the same two-phase
//! COUNT-then-page plan as the MySQL adapter, with `$n` placeholders.

mod decode;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, RwLockReadGuard};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error};

use dataway_core::Pagination;
use dataway_entities::DataSource;
use dataway_query::{Adapter, AdapterFactory, Column, DataError, Result, Table, POSTGRES};

use decode::row_to_json;

static NULL_TEXT: Option<String> = None;

/// Owned parameter storage so compiled JSON values can be handed to the
/// driver as `&dyn ToSql`.
enum PgParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(serde_json::Value),
}

impl PgParam {
    fn from_value(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => PgParam::Null,
            serde_json::Value::Bool(b) => PgParam::Bool(*b),
            serde_json::Value::Number(n) if n.is_i64() => PgParam::Int(n.as_i64().unwrap_or(0)),
            serde_json::Value::Number(n) => PgParam::Float(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => PgParam::Text(s.clone()),
            other => PgParam::Json(other.clone()),
        }
    }

    fn as_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            PgParam::Null => &NULL_TEXT,
            PgParam::Bool(v) => v,
            PgParam::Int(v) => v,
            PgParam::Float(v) => v,
            PgParam::Text(v) => v,
            PgParam::Json(v) => v,
        }
    }
}

fn to_sql_params(params: &[serde_json::Value]) -> Vec<PgParam> {
    params.iter().map(PgParam::from_value).collect()
}

pub struct PostgresAdapter {
    client: RwLock<Option<Client>>,
}

fn live<'a>(guard: &'a RwLockReadGuard<'_, Option<Client>>) -> Result<&'a Client> {
    guard
        .as_ref()
        .ok_or_else(|| DataError::ConnectionFailed("adapter is closed".to_string()))
}

impl PostgresAdapter {

    async fn fetch_rows(
        &self,
        sql: &str,
        params: &[serde_json::Value],
    ) -> Result<Vec<dataway_core::Row>> {
        debug!(sql, "postgres query");
        let owned = to_sql_params(params);
        let refs: Vec<&(dyn ToSql + Sync)> = owned.iter().map(PgParam::as_sql).collect();
        let guard = self.client.read().await;
        let client = live(&guard)?;
        let rows = client
            .query(sql, &refs)
            .await
            .map_err(|e| DataError::QueryFailed(e.to_string()))?;
        rows.iter().map(row_to_json).collect()
    }

    async fn fetch_count(&self, sql: &str, params: &[serde_json::Value]) -> Result<u64> {
        debug!(sql, "postgres count");
        let owned = to_sql_params(params);
        let refs: Vec<&(dyn ToSql + Sync)> = owned.iter().map(PgParam::as_sql).collect();
        let guard = self.client.read().await;
        let client = live(&guard)?;
        let row = client
            .query_one(sql, &refs)
            .await
            .map_err(|e| DataError::QueryFailed(e.to_string()))?;
        let total: i64 = row
            .try_get(0)
            .map_err(|e| DataError::Serialization(e.to_string()))?;
        Ok(total.max(0) as u64)
    }
}

#[async_trait]
impl Adapter for PostgresAdapter {
    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<()> {
        let guard = self.client.read().await;
        live(&guard)?
            .simple_query("SELECT 1")
            .await
            .map_err(|e| DataError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // Dropping the client terminates the connection task.
        self.client.write().await.take();
        Ok(())
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        let guard = self.client.read().await;
        let rows = live(&guard)?
            .query(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
                 ORDER BY table_name",
                &[],
            )
            .await
            .map_err(|e| DataError::SchemaError(e.to_string()))?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn table_schema(&self, name: &str) -> Result<Table> {
        let guard = self.client.read().await;
        let rows = live(&guard)?
            .query(
                "SELECT column_name, data_type, \
                 COALESCE(character_maximum_length, numeric_precision, 0)::bigint, \
                 COALESCE(numeric_scale, 0)::bigint, is_nullable \
                 FROM information_schema.columns \
                 WHERE table_schema = 'public' AND table_name = $1 \
                 ORDER BY ordinal_position",
                &[&name],
            )
            .await
            .map_err(|e| DataError::SchemaError(e.to_string()))?;
        if rows.is_empty() {
            return Err(DataError::SchemaError(format!("unknown table: {}", name)));
        }
        Ok(Table {
            name: name.to_string(),
            columns: rows
                .iter()
                .map(|row| Column {
                    name: row.get(0),
                    column_type: row.get(1),
                    length: row.get(2),
                    scale: row.get(3),
                    nullable: row.get::<_, String>(4).eq_ignore_ascii_case("yes"),
                })
                .collect(),
        })
    }

    async fn query_table(&self, table: &str, page: &mut Pagination) -> Result<()> {
        let clause = page.clause.clone().unwrap_or_default();
        let (fragment, params) = POSTGRES.compile(&clause)?;

        let total = self
            .fetch_count(&POSTGRES.count_table_sql(table, &fragment), &params)
            .await?;
        if total == 0 {
            page.set(0, Vec::new());
            return Ok(());
        }
        let sql = POSTGRES.select_table_sql(table, &fragment, page.offset, page.size);
        let data = self.fetch_rows(&sql, &params).await?;
        page.set(total, data);
        Ok(())
    }

    async fn query(&self, expression: &str, page: &mut Pagination) -> Result<()> {
        if page.is_unpaged() {
            let sql = POSTGRES.limit_expression_sql(expression, page.size);
            let data = self.fetch_rows(&sql, &[]).await?;
            page.set(data.len() as u64, data);
            return Ok(());
        }

        let total = self
            .fetch_count(&POSTGRES.count_expression_sql(expression), &[])
            .await?;
        if total == 0 {
            page.set(0, Vec::new());
            return Ok(());
        }
        let sql = POSTGRES.page_expression_sql(expression, page.offset, page.size);
        let data = self.fetch_rows(&sql, &[]).await?;
        page.set(total, data);
        Ok(())
    }
}

/// Builds [`PostgresAdapter`]s. The driver performs the handshake up
/// front, so `create` already proves connectivity.
#[derive(Default)]
pub struct PostgresFactory;

#[async_trait]
impl AdapterFactory for PostgresFactory {
    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    fn display_name(&self) -> &'static str {
        "PostgreSQL"
    }

    async fn create(&self, source: &DataSource) -> Result<Arc<dyn Adapter>> {
        let (client, connection) = tokio_postgres::connect(&source.url, NoTls)
            .await
            .map_err(|e| DataError::ConnectionFailed(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("postgres connection error: {}", e);
            }
        });
        Ok(Arc::new(PostgresAdapter {
            client: RwLock::new(Some(client)),
        }))
    }
}
