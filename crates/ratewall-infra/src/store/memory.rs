//! In-memory store - used for single-process deployments and tests.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use ratewall_core::ports::{Store, StoreError};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }
}

type Entries = RwLock<HashMap<String, Entry>>;

/// In-memory store using a HashMap behind an async RwLock.
///
/// Expired entries read as absent and are dropped the next time their key is
/// written. [`InMemoryStore::spawn_reaper`] purges the rest in the background.
/// Note: limits are per-process and lost on restart.
pub struct InMemoryStore {
    entries: Arc<Entries>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of live entries, for health reporting.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    /// Purge expired entries every `interval` on a background task.
    ///
    /// The task stops on its own once the store is dropped.
    pub fn spawn_reaper(&self, interval: Duration) -> JoinHandle<()> {
        let entries: Weak<Entries> = Arc::downgrade(&self.entries);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(entries) = entries.upgrade() else {
                    break;
                };

                let removed = purge(&entries).await;
                if removed > 0 {
                    tracing::debug!(removed, "Purged expired store entries");
                }
            }

            tracing::debug!("Store dropped, reaper stopped");
        })
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop every expired entry. Returns how many were removed.
async fn purge(entries: &Entries) -> usize {
    let now = Instant::now();
    let mut entries = entries.write().await;
    let before = entries.len();
    entries.retain(|_, e| !e.is_expired(now));
    before - entries.len()
}

#[async_trait]
impl Store for InMemoryStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        // Read, add and write under one write guard.
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });
        if entry.is_expired(now) {
            entry.value = "0".to_string();
            entry.expires_at = None;
        }

        let current: i64 = entry.value.parse().map_err(|_| {
            StoreError::Operation(format!("value at {key} is not an integer"))
        })?;
        let next = current
            .checked_add(1)
            .ok_or_else(|| StoreError::Operation(format!("increment would overflow {key}")))?;

        entry.value = next.to_string();
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        let stale = match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.expires_at = Some(now + ttl);
                false
            }
            Some(_) => true,
            None => false,
        };
        if stale {
            entries.remove(key);
        }

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(Instant::now())))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );

        Ok(())
    }
}
