//! Bounded index from a source message to the reply the bot posted for it.

use crate::{MessageHandle, MessageId};

use moka::future::Cache;
use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A reply the bot is keeping in sync with its source message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedReply {
    pub handle: MessageHandle,
    /// The text the reply currently shows.
    pub content: String,
}

/// LRU cache of tracked replies, keyed by source message id.
///
/// Losing an entry (to eviction) only means later edits and deletes of the
/// source go unnoticed. The reply message itself is never touched here.
#[derive(Clone)]
pub struct ReplyCache {
    cache: Cache<MessageId, TrackedReply>,
    capacity: u64,
    evicted: Arc<AtomicU64>,
}

impl ReplyCache {
    pub fn new(capacity: u64) -> Self {
        let evicted = Arc::new(AtomicU64::new(0));
        let listener_evicted = evicted.clone();

        let cache = Cache::builder()
            .max_capacity(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(move |source_id: Arc<MessageId>, reply: TrackedReply, cause| {
                if cause == RemovalCause::Size {
                    listener_evicted.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        source_id = *source_id,
                        reply = %reply.handle,
                        "reply cache full, no longer tracking reply"
                    );
                }
            })
            .build();

        Self {
            cache,
            capacity,
            evicted,
        }
    }

    pub async fn get(&self, source_id: MessageId) -> Option<TrackedReply> {
        self.cache.get(&source_id).await
    }

    /// Track a reply. Pending evictions are applied right away so the cache
    /// never holds more than `capacity` entries between inserts.
    pub async fn insert(&self, source_id: MessageId, reply: TrackedReply) {
        self.cache.insert(source_id, reply).await;
        self.cache.run_pending_tasks().await;
    }

    /// Stop tracking and return what was tracked, if anything.
    pub async fn remove(&self, source_id: MessageId) -> Option<TrackedReply> {
        self.cache.remove(&source_id).await
    }

    pub fn contains(&self, source_id: MessageId) -> bool {
        self.cache.contains_key(&source_id)
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Entries dropped because the cache was full.
    pub fn evicted_count(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}
