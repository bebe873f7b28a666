//! Key-value store with expiry, versioned writes and change notifications
//!
//! The [`Store`] trait is the seam between the game server and whatever keeps
//! the records. [`MemoryStore`] is the in-process implementation the server
//! binary runs on; it behaves like a small Redis: values expire after their
//! time-to-live, every write bumps a version that conditional writes can be
//! checked against, and topics fan a bare "changed" signal out to every
//! subscriber.

use crate::error::StoreError;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::Instant;

/// Notifications buffered per subscriber before it starts lagging
const TOPIC_CAPACITY: usize = 16;

/// A stored value and the version it was written at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub value: Vec<u8>,
    pub version: u64,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Entry>, StoreError>;

    /// Writes `value` with a time-to-live and returns the new version
    ///
    /// With `expected` set, the write only happens if the key currently sits
    /// at that version (zero meaning absent), otherwise it fails with
    /// [`StoreError::Conflict`].
    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
        expected: Option<u64>,
    ) -> Result<u64, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Removes a key, returning whether it was present
    ///
    /// `expected` works as for [`Store::put`]: when set, the key is only
    /// removed if it still sits at that version.
    async fn delete(&self, key: &str, expected: Option<u64>) -> Result<bool, StoreError>;

    /// Signals every current subscriber of `topic`, returning how many there were
    async fn publish(&self, topic: &str) -> Result<usize, StoreError>;

    async fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<()>, StoreError>;
}

#[derive(Debug)]
struct StoredEntry {
    value: Vec<u8>,
    version: u64,
    expires_at: Instant,
}

impl StoredEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-process [`Store`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    topics: Mutex<HashMap<String, broadcast::Sender<()>>>,
    /// Versions come from one counter so a key recreated after expiry
    /// never repeats a version a stale reader may still hold
    last_version: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops expired entries and topics nobody listens to any more
    ///
    /// Returns the number of expired entries removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let removed = {
            let mut entries = self.entries.write().await;
            let before = entries.len();
            entries.retain(|_, entry| entry.is_live(now));
            before - entries.len()
        };

        self.topics
            .lock()
            .await
            .retain(|_, sender| sender.receiver_count() > 0);

        if removed > 0 {
            debug!("Purged {} expired records", removed);
        }
        removed
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of subscribers currently listening on `topic`
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .await
            .get(topic)
            .map_or(0, |sender| sender.receiver_count())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Entry>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| Entry {
                value: entry.value.clone(),
                version: entry.version,
            }))
    }

    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
        expected: Option<u64>,
    ) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        if let Some(expected) = expected {
            let found = entries
                .get(key)
                .filter(|entry| entry.is_live(now))
                .map_or(0, |entry| entry.version);

            if found != expected {
                return Err(StoreError::Conflict {
                    key: key.to_string(),
                    expected,
                    found,
                });
            }
        }

        let version = self.last_version.fetch_add(1, Ordering::SeqCst) + 1;
        entries.insert(
            key.to_string(),
            StoredEntry {
                value,
                version,
                expires_at: now + ttl,
            },
        );
        Ok(version)
    }

    async fn delete(&self, key: &str, expected: Option<u64>) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        if let Some(expected) = expected {
            let found = entries
                .get(key)
                .filter(|entry| entry.is_live(now))
                .map_or(0, |entry| entry.version);

            if found != expected {
                return Err(StoreError::Conflict {
                    key: key.to_string(),
                    expected,
                    found,
                });
            }
        }

        let removed = entries.remove(key);
        Ok(removed.is_some_and(|entry| entry.is_live(now)))
    }

    async fn publish(&self, topic: &str) -> Result<usize, StoreError> {
        let mut topics = self.topics.lock().await;
        let Some(sender) = topics.get(topic) else {
            return Ok(0);
        };

        match sender.send(()) {
            Ok(receivers) => Ok(receivers),
            Err(_) => {
                // Every receiver is gone
                topics.remove(topic);
                Ok(0)
            }
        }
    }

    async fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<()>, StoreError> {
        let mut topics = self.topics.lock().await;
        let sender = topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0);
        Ok(sender.subscribe())
    }
}
