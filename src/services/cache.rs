use anyhow::Result;
use moka::future::Cache;
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Open a shared Redis connection, or `None` when Redis is unset or unreachable.
pub async fn connect_redis(redis_url: Option<&str>) -> Option<ConnectionManager> {
    let url = redis_url?;
    match redis::Client::open(url) {
        Ok(client) => match client.get_connection_manager().await {
            Ok(conn) => {
                tracing::info!("Redis connected successfully");
                Some(conn)
            }
            Err(e) => {
                tracing::warn!("Redis connection failed: {}, using memory cache only", e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Redis client creation failed: {}, using memory cache only", e);
            None
        }
    }
}

/// Two-tier TTL cache: an in-process moka tier backed by optional Redis.
///
/// Each instance owns one key namespace and one lifetime, so quotes and
/// prices live in separate instances sharing the Redis connection.
pub struct CacheService {
    redis: Option<ConnectionManager>,
    memory: Arc<Cache<String, String>>,
    namespace: &'static str,
    ttl: Duration,
}

impl CacheService {
    pub fn new(redis: Option<ConnectionManager>, namespace: &'static str, ttl: Duration) -> Self {
        let memory = Arc::new(
            Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
        );

        Self {
            redis,
            memory,
            namespace,
            ttl,
        }
    }

    pub fn memory_only(namespace: &'static str, ttl: Duration) -> Self {
        Self::new(None, namespace, ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(&self, key: &str) -> String {
        format!("chainpay:{}:{}", self.namespace, key)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let key = self.key(key);

        if let Some(cached) = self.memory.get(&key).await {
            if let Ok(value) = serde_json::from_str(&cached) {
                tracing::debug!("Memory cache hit for key: {}", key);
                return Ok(Some(value));
            }
        }

        if let Some(mut redis) = self.redis.clone() {
            match redis.get::<_, Option<String>>(&key).await {
                Ok(Some(cached)) => {
                    if let Ok(value) = serde_json::from_str(&cached) {
                        self.memory.insert(key.clone(), cached).await;
                        tracing::debug!("Redis cache hit for key: {}", key);
                        return Ok(Some(value));
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Redis get error: {}", e),
            }
        }

        tracing::debug!("Cache miss for key: {}", key);
        Ok(None)
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let key = self.key(key);
        let serialized = serde_json::to_string(value)?;

        self.memory.insert(key.clone(), serialized.clone()).await;

        if let Some(mut redis) = self.redis.clone() {
            let ttl_secs = self.ttl.as_secs().max(1);
            if let Err(e) = redis.set_ex::<_, _, ()>(&key, serialized, ttl_secs).await {
                tracing::warn!("Redis set error: {}", e);
            } else {
                tracing::debug!("Cached key: {} with TTL: {}s", key, ttl_secs);
            }
        }

        Ok(())
    }

    pub async fn ping(&self) -> Result<bool> {
        if let Some(mut redis) = self.redis.clone() {
            match redis::cmd("PING").query_async::<_, String>(&mut redis).await {
                Ok(_) => Ok(true),
                Err(_) => Ok(false),
            }
        } else {
            Ok(false)
        }
    }
}
