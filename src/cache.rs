//! # Cache
//!
//! Read-through cache in front of the document store and the metadata
//! providers.
//!
//! Two backends behind one interface, picked at startup:
//! - **Redis** for deployments, TTL enforced by the store
//! - **In-process map** for local runs or when Redis is unreachable
//!
//! Cache failures never propagate: any Redis error is logged and the
//! operation degrades to a miss or a no-op. Correctness relies on
//! invalidation, not on the cache being alive.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tracing::{info, warn};

pub const ITEM_PREFIX: &str = "item:";
pub const OWNER_LIST_PREFIX: &str = "items:user:";
pub const TMDB_SEARCH_PREFIX: &str = "tmdb:search:";
pub const TMDB_MOVIE_PREFIX: &str = "tmdb:movie:";
pub const OMDB_RATINGS_PREFIX: &str = "omdb:ratings:";

pub fn item_key(id: &str) -> String {
    format!("{ITEM_PREFIX}{id}")
}

pub fn owner_list_key(owner: &str) -> String {
    format!("{OWNER_LIST_PREFIX}{owner}")
}

pub enum Cache {
    Redis(RedisCache),
    Memory(MemoryCache),
}

impl Cache {
    /// Connects the configured backend. A Redis connection failure
    /// degrades to the in-process map rather than failing startup.
    pub async fn connect(backend: &str, redis_url: &str) -> Self {
        if backend != "redis" {
            info!("Using in-process cache");
            return Cache::Memory(MemoryCache::new());
        }

        match RedisCache::connect(redis_url).await {
            Ok(redis) => {
                info!("Connected to Redis at {redis_url}");
                Cache::Redis(redis)
            }
            Err(e) => {
                warn!("Redis unavailable ({e}), falling back to in-process cache");
                Cache::Memory(MemoryCache::new())
            }
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        match self {
            Cache::Redis(redis) => redis.get(key).await,
            Cache::Memory(memory) => memory.get(key),
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl_secs: u64) {
        match self {
            Cache::Redis(redis) => redis.set(key, value, ttl_secs).await,
            Cache::Memory(memory) => memory.set(key, value, ttl_secs),
        }
    }

    pub async fn delete(&self, key: &str) {
        match self {
            Cache::Redis(redis) => redis.delete(key).await,
            Cache::Memory(memory) => memory.delete(key),
        }
    }

    pub async fn delete_by_prefix(&self, prefix: &str) {
        match self {
            Cache::Redis(redis) => redis.delete_by_prefix(prefix).await,
            Cache::Memory(memory) => memory.delete_by_prefix(prefix),
        }
    }
}

pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(100));

        let client = Client::open(redis_url)?;
        let connection = client.get_connection_manager_with_config(config).await?;

        Ok(Self { connection })
    }

    async fn get(&self, key: &str) -> Option<String> {
        let mut connection = self.connection.clone();

        match connection.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Redis GET {key} failed: {e}");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) {
        let mut connection = self.connection.clone();

        if let Err(e) = connection.set_ex::<_, _, ()>(key, value, ttl_secs).await {
            warn!("Redis SET {key} failed: {e}");
        }
    }

    async fn delete(&self, key: &str) {
        let mut connection = self.connection.clone();

        if let Err(e) = connection.del::<_, ()>(key).await {
            warn!("Redis DEL {key} failed: {e}");
        }
    }

    async fn delete_by_prefix(&self, prefix: &str) {
        let mut connection = self.connection.clone();
        let pattern = format!("{prefix}*");

        let keys: Vec<String> = match connection.keys(&pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Redis KEYS {pattern} failed: {e}");
                return;
            }
        };

        if keys.is_empty() {
            return;
        }

        if let Err(e) = connection.del::<_, ()>(keys).await {
            warn!("Redis DEL by prefix {pattern} failed: {e}");
        }
    }
}

/// Fallback store: value plus absolute expiry, purged lazily on read.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();

        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: &str, ttl_secs: u64) {
        let expires = Instant::now() + Duration::from_secs(ttl_secs);

        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), expires));
    }

    fn delete(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }

    fn delete_by_prefix(&self, prefix: &str) {
        self.entries
            .lock()
            .unwrap()
            .retain(|key, _| !key.starts_with(prefix));
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_set_get_delete() {
        let cache = MemoryCache::new();

        cache.set("item:1", "{\"id\":\"1\"}", 60);
        assert_eq!(cache.get("item:1").as_deref(), Some("{\"id\":\"1\"}"));

        cache.delete("item:1");
        assert_eq!(cache.get("item:1"), None);
    }

    #[test]
    fn test_memory_ttl_expiry() {
        let cache = MemoryCache::new();

        cache.set("item:1", "v", 0);
        assert_eq!(cache.get("item:1"), None);
    }

    #[test]
    fn test_memory_delete_by_prefix() {
        let cache = MemoryCache::new();

        cache.set("tmdb:search:heat", "a", 60);
        cache.set("tmdb:search:alien", "b", 60);
        cache.set("item:1", "c", 60);

        cache.delete_by_prefix("tmdb:search:");

        assert_eq!(cache.get("tmdb:search:heat"), None);
        assert_eq!(cache.get("tmdb:search:alien"), None);
        assert_eq!(cache.get("item:1").as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_unreachable_redis_falls_back_to_memory() {
        // Nothing listens on port 1; the bounded connect timeout turns
        // this into the in-process fallback instead of a startup hang.
        let cache = Cache::connect("redis", "redis://127.0.0.1:1").await;
        assert!(matches!(cache, Cache::Memory(_)));
    }

    #[tokio::test]
    async fn test_backend_selection_defaults_to_memory() {
        let cache = Cache::connect("memory", "redis://localhost:6379").await;
        assert!(matches!(cache, Cache::Memory(_)));

        cache.set("k", "v", 60).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));
    }
}
