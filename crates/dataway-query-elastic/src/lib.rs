//! Elasticsearch adapter speaking the SQL endpoint over HTTP.
//!
//! Reads go through `POST /_sql?format=json`, which answers with a column
//! header plus positional rows; the adapter zips them back into keyed
//! maps. The endpoint has no OFFSET, so results are a single bounded
//! batch and `total` reports the rows actually returned.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use dataway_core::Pagination;
use dataway_entities::DataSource;
use dataway_query::{Adapter, AdapterFactory, Column, DataError, Result, Table};

#[derive(Deserialize)]
struct SqlResponse {
    #[serde(default)]
    columns: Vec<SqlColumn>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct SqlColumn {
    name: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    reason: String,
}

pub struct ElasticAdapter {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl ElasticAdapter {
    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        if self.username.is_empty() {
            builder
        } else {
            builder.basic_auth(&self.username, Some(&self.password))
        }
    }

    /// Run one SQL statement and decode the column/rows envelope.
    async fn sql(&self, query: &str) -> Result<SqlResponse> {
        debug!(query, "elastic sql");
        let response = self
            .request(
                reqwest::Method::POST,
                format!("{}/_sql?format=json", self.base_url),
            )
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await
            .map_err(|e| DataError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DataError::QueryFailed(e.to_string()))?;
        if !status.is_success() {
            let reason = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.reason)
                .unwrap_or(body);
            return Err(DataError::QueryFailed(reason));
        }
        serde_json::from_str(&body).map_err(|e| DataError::Serialization(e.to_string()))
    }

    /// Zip the positional rows against the column header.
    fn into_rows(response: SqlResponse) -> Vec<dataway_core::Row> {
        response
            .rows
            .into_iter()
            .map(|row| {
                response
                    .columns
                    .iter()
                    .map(|c| c.name.clone())
                    .zip(row)
                    .collect()
            })
            .collect()
    }
}

#[async_trait]
impl Adapter for ElasticAdapter {
    fn backend_type(&self) -> &'static str {
        "elastic"
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .request(reqwest::Method::GET, self.base_url.clone())
            .send()
            .await
            .map_err(|e| DataError::ConnectionFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(DataError::ConnectionFailed(format!(
                "elastic ping returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // Plain HTTP, nothing pooled to tear down.
        Ok(())
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        let response = self.sql("SHOW TABLES").await?;
        // Rows are [name, kind]; hidden indices report other kinds.
        Ok(response
            .rows
            .into_iter()
            .filter(|row| row.get(1).and_then(Value::as_str) == Some("BASE TABLE"))
            .filter_map(|row| row.first().and_then(Value::as_str).map(str::to_string))
            .collect())
    }

    async fn table_schema(&self, name: &str) -> Result<Table> {
        let response = self.sql(&format!("DESCRIBE \"{}\"", name)).await?;
        // Rows are [column, type, mapping]; the mapping column carries the
        // index field type.
        Ok(Table {
            name: name.to_string(),
            columns: response
                .rows
                .into_iter()
                .filter_map(|row| {
                    let name = row.first().and_then(Value::as_str)?.to_string();
                    let column_type = row.get(2).and_then(Value::as_str)?.to_string();
                    Some(Column {
                        name,
                        column_type,
                        ..Column::default()
                    })
                })
                .collect(),
        })
    }

    async fn query_table(&self, table: &str, page: &mut Pagination) -> Result<()> {
        let sql = format!("SELECT * FROM \"{}\" LIMIT {}", table, page.size.max(1));
        let data = Self::into_rows(self.sql(&sql).await?);
        page.set(data.len() as u64, data);
        Ok(())
    }

    async fn query(&self, expression: &str, page: &mut Pagination) -> Result<()> {
        let sql = format!(
            "SELECT * FROM ({}) TMP_PAGE LIMIT {}",
            expression,
            page.size.max(1)
        );
        let data = Self::into_rows(self.sql(&sql).await?);
        page.set(data.len() as u64, data);
        Ok(())
    }
}

/// Builds [`ElasticAdapter`]s. Construction only configures the HTTP
/// client; connectivity is proven by the ping that follows.
#[derive(Default)]
pub struct ElasticFactory;

#[async_trait]
impl AdapterFactory for ElasticFactory {
    fn backend_type(&self) -> &'static str {
        "elastic"
    }

    fn display_name(&self) -> &'static str {
        "ElasticSearch"
    }

    async fn create(&self, source: &DataSource) -> Result<Arc<dyn Adapter>> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| DataError::ConnectionFailed(e.to_string()))?;
        Ok(Arc::new(ElasticAdapter {
            http,
            base_url: source.url.trim_end_matches('/').to_string(),
            username: source.username.clone(),
            password: source.password.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rows_zip_against_column_header() {
        let response = SqlResponse {
            columns: vec![
                SqlColumn {
                    name: "id".to_string(),
                },
                SqlColumn {
                    name: "name".to_string(),
                },
            ],
            rows: vec![vec![json!(1), json!("ada")], vec![json!(2), json!("bob")]],
        };
        let rows = ElasticAdapter::into_rows(response);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[1]["name"], json!("bob"));
    }

    #[test]
    fn error_body_surfaces_the_reason() {
        let body = r#"{"error":{"root_cause":[],"reason":"line 1:8: mismatched input"},"status":400}"#;
        let parsed: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.reason, "line 1:8: mismatched input");
    }

    #[test]
    fn factory_reports_its_backend() {
        let factory = ElasticFactory;
        assert_eq!(factory.backend_type(), "elastic");
        assert_eq!(factory.display_name(), "ElasticSearch");
    }
}
