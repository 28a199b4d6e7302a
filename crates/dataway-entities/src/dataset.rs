use crate::params::{RequestParam, ResponseParam};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A parameterized query template published as a read endpoint.
///
/// A dataset is servable iff `publish_status` is true; servability is
/// reflected in the router only after the next periodic rebuild.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub id: String,
    pub source_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Unique request path, stored without the leading slash.
    pub path: String,
    /// Expression template rendered against the merged request parameters.
    pub expression: String,
    #[serde(default)]
    pub publish_status: bool,
    #[serde(default)]
    pub enable_page: bool,
    /// Fixed limit applied when paging is disabled.
    #[serde(default)]
    pub batch_limit: u64,
    #[serde(default)]
    pub enable_cache: bool,
    #[serde(default)]
    pub expire_seconds: u64,
    #[serde(default)]
    pub request_params: Vec<RequestParam>,
    #[serde(default)]
    pub response_params: Vec<ResponseParam>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}
