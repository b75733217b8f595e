//! Redis store implementation.
//!
//! Each store call maps onto a single Redis command, so every process pointed
//! at the same server and database shares one set of counters and blocks.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, IntoConnectionInfo, RedisError};

use ratewall_core::ports::{Store, StoreError};

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Password, overriding any in the URL
    pub password: Option<String>,
    /// Logical database index
    pub db: i64,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Whether to fall back to the in-memory store if Redis is unavailable
    pub fallback_to_memory: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            password: None,
            db: 0,
            connect_timeout: Duration::from_secs(5),
            fallback_to_memory: true,
        }
    }
}

/// Redis-backed store.
///
/// Uses a connection manager for automatic reconnection.
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn new(config: &RedisConfig) -> Result<Self, StoreError> {
        let mut info = config
            .url
            .as_str()
            .into_connection_info()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        if let Some(password) = &config.password {
            info.redis.password = Some(password.clone());
        }
        if config.db != 0 {
            info.redis.db = config.db;
        }

        let client = Client::open(info).map_err(|e| StoreError::Connection(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Connection("Connection timed out".to_string()))?
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!(url = %config.url, db = config.db, "Connected to Redis store");

        Ok(Self { conn })
    }

    /// Round-trip a PING to check the server is reachable.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

/// EXPIRE and SET EX take whole seconds; round up so a TTL never shrinks.
fn whole_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

fn store_error(e: RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
    {
        StoreError::Connection(e.to_string())
    } else {
        StoreError::Operation(e.to_string())
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let count: i64 = redis::cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(count)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let applied: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(whole_secs(ttl))
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;

        if applied == 0 {
            tracing::debug!(key = %key, "EXPIRE on missing key");
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let found: i64 = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(found > 0)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(whole_secs(ttl))
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn get_test_store() -> Option<RedisStore> {
        let config = RedisConfig {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            connect_timeout: Duration::from_secs(1),
            fallback_to_memory: false,
            ..RedisConfig::default()
        };

        let store = RedisStore::new(&config).await.ok()?;
        store.ping().await.ok()?;
        Some(store)
    }

    fn test_key(name: &str) -> String {
        format!("ratewall_test:{}:{name}", std::process::id())
    }

    #[test]
    fn test_whole_secs_rounds_up() {
        assert_eq!(whole_secs(Duration::from_secs(1)), 1);
        assert_eq!(whole_secs(Duration::from_millis(1500)), 2);
        assert_eq!(whole_secs(Duration::from_millis(10)), 1);
        assert_eq!(whole_secs(Duration::ZERO), 1);
        assert_eq!(whole_secs(Duration::from_secs(60)), 60);
    }

    #[tokio::test]
    async fn test_invalid_url_is_connection_error() {
        let config = RedisConfig {
            url: "not a url".to_string(),
            ..RedisConfig::default()
        };

        let err = RedisStore::new(&config).await.err().unwrap();
        assert!(matches!(err, StoreError::Connection(_)));
    }

    #[tokio::test]
    async fn test_redis_incr_and_expire() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => {
                tracing::warn!("Redis not available, skipping test");
                return;
            }
        };

        let key = test_key("counter");
        assert_eq!(store.incr(&key).await.unwrap(), 1);
        assert_eq!(store.incr(&key).await.unwrap(), 2);
        store.expire(&key, Duration::from_secs(1)).await.unwrap();
        assert!(store.exists(&key).await.unwrap());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!store.exists(&key).await.unwrap());
        assert_eq!(store.incr(&key).await.unwrap(), 1);
        store.expire(&key, Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_set_with_ttl() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };

        let key = test_key("block");
        store.set(&key, "1", Duration::from_secs(1)).await.unwrap();
        assert!(store.exists(&key).await.unwrap());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!store.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_redis_expire_missing_key() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };

        store
            .expire(&test_key("missing"), Duration::from_secs(1))
            .await
            .unwrap();
    }
}
