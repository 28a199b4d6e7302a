//! Cache keyspace. Everything lives under the `dataway:` prefix;
//! `dataset` keys hold metadata, `datasetcache` keys hold served results.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// TTL for metadata caches (dataset and data-source records).
pub const META_TTL: Duration = Duration::from_secs(300);

pub const DATASET_ALL: &str = "dataway:dataset:all";
pub const DATASOURCE_ALL: &str = "dataway:datasource:all";

pub fn dataset(id: &str) -> String {
    format!("dataway:dataset:{}", id)
}

pub fn dataset_detail(id: &str) -> String {
    format!("dataway:dataset:{}:detail", id)
}

/// Key for one served result, parameterized by the request's merged
/// parameters.
pub fn dataset_result(id: &str, param_hash: &str) -> String {
    format!("dataway:datasetcache:{}:{}", id, param_hash)
}

/// Pattern clearing a dataset's metadata keys. With `"all"` it clears the
/// list key instead.
pub fn dataset_pattern(id: &str) -> String {
    format!("dataway:dataset:{}*", id)
}

/// Pattern clearing every served result of one dataset.
pub fn dataset_result_pattern(id: &str) -> String {
    format!("dataway:datasetcache:{}:*", id)
}

pub fn datasource_pattern(id: &str) -> String {
    format!("dataway:datasource:{}*", id)
}

/// Digest of the merged request parameters. The map is ordered, so equal
/// parameter sets hash identically regardless of arrival order.
pub fn param_hash(params: &BTreeMap<String, Value>) -> String {
    let serialized = serde_json::to_string(params).unwrap_or_default();
    hex::encode(Sha256::digest(serialized.as_bytes()))
}
