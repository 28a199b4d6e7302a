use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use tracing::debug;

use crate::{effective_ttl, Cache, CacheError};

/// Number of keys fetched per SCAN iteration in [`Cache::del_match`].
const SCAN_BATCH: usize = 100;

/// Redis-backed cache over a multiplexed [`ConnectionManager`].
///
/// The manager reconnects on its own, so cloning it per call is cheap
/// and there is no pool to manage here.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to the given redis URL, e.g. `redis://127.0.0.1:6379/0`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(Self { conn })
    }

    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_value(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut conn = self.conn.clone();
        debug!(key, "cache GET");
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    async fn set_value(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let ttl = effective_ttl(ttl);
        let serialized = serde_json::to_string(value)?;
        debug!(key, ttl_secs = ttl.as_secs(), "cache SET");
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(&serialized)
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        debug!(?keys, "cache DEL");
        let _: i64 = conn.del(keys).await?;
        Ok(())
    }

    async fn del_match(&self, pattern: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        debug!(pattern, "cache DEL MATCH");
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            if !keys.is_empty() {
                let _: i64 = conn.del(&keys).await?;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(())
    }
}
