//! Per-run query cache
//!
//! Owned by the batch driver and lent to the engine through
//! [`ResolveContext`](super::ResolveContext). Keyed by query identity, so two
//! songs that normalize to the same search share one catalog call. Only
//! successful searches are stored.

use crate::types::{CatalogCandidate, QueryKey};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<QueryKey, Vec<CatalogCandidate>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &QueryKey) -> Option<Vec<CatalogCandidate>> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(candidates) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(candidates.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn insert(&self, key: QueryKey, candidates: Vec<CatalogCandidate>) {
        self.entries.write().await.insert(key, candidates);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (usize, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(text: &str, limit: u32) -> QueryKey {
        QueryKey {
            text: text.to_string(),
            field_qualified: false,
            limit,
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = QueryCache::new();
        assert!(cache.get(&key("hello", 5)).await.is_none());

        cache.insert(key("hello", 5), vec![]).await;
        assert_eq!(cache.get(&key("hello", 5)).await, Some(vec![]));
        assert_eq!(cache.stats(), (1, 1));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_limit_is_part_of_identity() {
        let cache = QueryCache::new();
        cache.insert(key("hello", 5), vec![]).await;
        assert!(cache.get(&key("hello", 20)).await.is_none());
    }
}
