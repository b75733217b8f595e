//! Application state - shared across all handlers.

use std::sync::Arc;

use ratewall_core::RateLimiter;
use ratewall_core::ports::{Store, StoreError};
use ratewall_infra::InMemoryStore;

#[cfg(feature = "redis")]
use ratewall_infra::RedisStore;

use crate::config::{AppConfig, StoreBackend};

/// The store actually in use, kept concrete for health reporting.
#[derive(Clone)]
pub enum StoreHandle {
    Memory(Arc<InMemoryStore>),
    #[cfg(feature = "redis")]
    Redis(Arc<RedisStore>),
}

impl StoreHandle {
    pub fn backend(&self) -> &'static str {
        match self {
            StoreHandle::Memory(_) => StoreBackend::Memory.as_str(),
            #[cfg(feature = "redis")]
            StoreHandle::Redis(_) => StoreBackend::Redis.as_str(),
        }
    }

    /// Whether the store currently answers.
    pub async fn is_reachable(&self) -> bool {
        match self {
            StoreHandle::Memory(_) => true,
            #[cfg(feature = "redis")]
            StoreHandle::Redis(store) => store.ping().await.is_ok(),
        }
    }

    /// Live key count, where the backend can report it cheaply.
    pub async fn key_count(&self) -> Option<usize> {
        match self {
            StoreHandle::Memory(store) => Some(store.len().await),
            #[cfg(feature = "redis")]
            StoreHandle::Redis(_) => None,
        }
    }

    fn as_store(&self) -> Arc<dyn Store> {
        match self {
            StoreHandle::Memory(store) => store.clone(),
            #[cfg(feature = "redis")]
            StoreHandle::Redis(store) => store.clone(),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<RateLimiter>,
    pub store: StoreHandle,
}

impl AppState {
    /// Build the application state with the configured store.
    pub async fn new(config: &AppConfig) -> Result<Self, StoreError> {
        let store = match config.store {
            StoreBackend::Memory => memory_store(config),
            #[cfg(feature = "redis")]
            StoreBackend::Redis => match RedisStore::new(&config.redis).await {
                Ok(store) => StoreHandle::Redis(Arc::new(store)),
                Err(e) if config.redis.fallback_to_memory => {
                    tracing::error!(
                        "Failed to connect to Redis: {}. Using in-memory fallback.",
                        e
                    );
                    memory_store(config)
                }
                Err(e) => return Err(e),
            },
        };

        tracing::info!(store = store.backend(), "Application state initialized");

        Ok(Self::with_store(store, config))
    }

    pub fn with_store(store: StoreHandle, config: &AppConfig) -> Self {
        let limiter = RateLimiter::new(store.as_store(), config.limiter.clone());

        Self {
            limiter: Arc::new(limiter),
            store,
        }
    }
}

fn memory_store(config: &AppConfig) -> StoreHandle {
    tracing::warn!("Using in-memory store - limits are not shared between processes");

    let store = Arc::new(InMemoryStore::new());
    store.spawn_reaper(config.reaper_interval);
    StoreHandle::Memory(store)
}
