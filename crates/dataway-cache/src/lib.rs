//! Cache-aside storage for dataset metadata and query results.
//!
//! Two implementations share the [`Cache`] trait: [`RedisCache`] for
//! deployments and [`MemoryCache`] for tests and single-node setups.
//! Values are stored as JSON text. Keys are namespaced by the caller,
//! e.g. `dataway:dataset:<id>` or `dataway:datasetcache:<id>:<hash>`.

mod error;
mod memory;
mod redis_cache;

pub use error::CacheError;
pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Entries written with a TTL below this floor are coerced to
/// [`DEFAULT_TTL`]. A sub-second expiry is always a configuration
/// mistake and would turn the cache into a no-op.
pub const MIN_TTL: Duration = Duration::from_secs(1);

/// Fallback expiry applied when the requested TTL is below [`MIN_TTL`].
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Normalize a requested TTL to something the cache will honor.
pub fn effective_ttl(ttl: Duration) -> Duration {
    if ttl < MIN_TTL {
        DEFAULT_TTL
    } else {
        ttl
    }
}

/// Async key/value cache over JSON values.
///
/// A miss is `Ok(None)`; `Err` is reserved for transport and codec
/// failures so callers can fall through to the backing store.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a value, `None` on miss or expiry.
    async fn get_value(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Store a value with the given TTL (subject to [`effective_ttl`]).
    async fn set_value(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError>;

    /// Delete exact keys. An empty slice is a no-op.
    async fn del(&self, keys: &[String]) -> Result<(), CacheError>;

    /// Delete every key matching a glob pattern (`*` wildcard).
    async fn del_match(&self, pattern: &str) -> Result<(), CacheError>;
}

/// Typed read over [`Cache::get_value`].
pub async fn get_typed<T: DeserializeOwned>(
    cache: &dyn Cache,
    key: &str,
) -> Result<Option<T>, CacheError> {
    match cache.get_value(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Typed write over [`Cache::set_value`].
pub async fn set_typed<T: Serialize>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), CacheError> {
    let value = serde_json::to_value(value)?;
    cache.set_value(key, &value, ttl).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_ttl_is_coerced_to_an_hour() {
        assert_eq!(effective_ttl(Duration::from_millis(500)), DEFAULT_TTL);
        assert_eq!(effective_ttl(Duration::ZERO), DEFAULT_TTL);
    }

    #[test]
    fn sane_ttl_passes_through() {
        let ttl = Duration::from_secs(90);
        assert_eq!(effective_ttl(ttl), ttl);
        assert_eq!(effective_ttl(MIN_TTL), MIN_TTL);
    }
}
