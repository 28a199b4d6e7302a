use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered data backend: which driver to use and how to reach it.
///
/// Mutation triggers adapter re-provisioning, so a saved record and the live
/// adapter for its id converge shortly after every change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    #[serde(default)]
    pub id: String,
    /// Backend type tag, e.g. "mysql", "postgres", "elastic".
    #[serde(rename = "type")]
    pub source_type: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub max_idle_conns: u32,
    #[serde(default)]
    pub max_open_conns: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DataSource {
    /// Apply the pool-limit defaults: at least one idle and eight open
    /// connections.
    pub fn normalize_pool_limits(&mut self) {
        if self.max_idle_conns < 1 {
            self.max_idle_conns = 1;
        }
        if self.max_open_conns < 1 {
            self.max_open_conns = 8;
        }
    }
}
