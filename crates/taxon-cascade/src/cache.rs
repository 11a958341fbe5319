//! # Tax Cache
//!
//! Process-local cache of resolved tax descriptors, keyed by item ID.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  effective_tax(item) ──► get ──hit──► descriptor                        │
//! │                           │                                             │
//! │                          miss ──► resolve chain ──► put(ttl)            │
//! │                                                                         │
//! │  cascade(category) ──► invalidate_all(affected) ──► recompute ──► put   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entries expire lazily: an expired entry reads as a miss and is dropped on
//! the next write or [`TaxCache::purge_expired`]. A TTL of zero disables
//! caching entirely.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use taxon_core::TaxDescriptor;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    descriptor: TaxDescriptor,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Shared TTL cache. Clones share the same map.
#[derive(Debug, Clone)]
pub struct TaxCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    default_ttl: Duration,
}

impl TaxCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
        }
    }

    /// TTL applied by [`TaxCache::insert`].
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub async fn get(&self, item_id: &str) -> Option<TaxDescriptor> {
        let entries = self.entries.read().await;
        entries
            .get(item_id)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.descriptor)
    }

    /// Stores a descriptor for `ttl`. A zero TTL removes any existing entry
    /// instead.
    pub async fn put(&self, item_id: &str, descriptor: TaxDescriptor, ttl: Duration) {
        let mut entries = self.entries.write().await;

        if ttl.is_zero() {
            entries.remove(item_id);
            return;
        }

        entries.insert(
            item_id.to_string(),
            CacheEntry {
                descriptor,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Stores a descriptor with the default TTL.
    pub async fn insert(&self, item_id: &str, descriptor: TaxDescriptor) {
        self.put(item_id, descriptor, self.default_ttl).await;
    }

    pub async fn invalidate(&self, item_id: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(item_id);
    }

    /// Drops every listed key under one write lock.
    pub async fn invalidate_all<I, S>(&self, item_ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = self.entries.write().await;
        let removed = item_ids
            .into_iter()
            .filter(|id| entries.remove(AsRef::<str>::as_ref(id)).is_some())
            .count();

        if removed > 0 {
            debug!(removed, "Invalidated cached tax descriptors");
        }
        removed
    }

    /// Removes expired entries and returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }
}

impl Default for TaxCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(taxon_core::DEFAULT_CACHE_TTL_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxon_core::{TaxRate, TaxType};

    fn ten_percent() -> TaxDescriptor {
        TaxDescriptor::applicable(TaxRate::from_bps(1000), TaxType::Percentage)
    }

    #[tokio::test]
    async fn test_cache_get_insert() {
        let cache = TaxCache::default();
        assert_eq!(cache.get("item-1").await, None);

        cache.insert("item-1", ten_percent()).await;
        assert_eq!(cache.get("item-1").await, Some(ten_percent()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = TaxCache::new(Duration::from_secs(600));
        cache.insert("item-1", ten_percent()).await;

        tokio::time::advance(Duration::from_secs(599)).await;
        assert!(cache.get("item-1").await.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("item-1").await, None);

        // Still stored until purged.
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.purge_expired().await, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_caching() {
        let cache = TaxCache::new(Duration::ZERO);
        cache.insert("item-1", ten_percent()).await;
        assert_eq!(cache.get("item-1").await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_zero_ttl_put_evicts_existing() {
        let cache = TaxCache::default();
        cache.insert("item-1", ten_percent()).await;
        cache
            .put("item-1", TaxDescriptor::not_applicable(), Duration::ZERO)
            .await;
        assert_eq!(cache.get("item-1").await, None);
    }

    #[tokio::test]
    async fn test_invalidate_all_counts_removed() {
        let cache = TaxCache::default();
        cache.insert("a", ten_percent()).await;
        cache.insert("b", ten_percent()).await;
        cache.insert("c", ten_percent()).await;

        let removed = cache.invalidate_all(["a", "c", "missing"]).await;
        assert_eq!(removed, 2);
        assert!(cache.get("b").await.is_some());

        cache.invalidate("b").await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = TaxCache::default();
        let other = cache.clone();

        other.insert("item-1", ten_percent()).await;
        assert!(cache.get("item-1").await.is_some());

        cache.clear().await;
        assert!(other.is_empty().await);
    }
}
