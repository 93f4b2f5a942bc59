use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use dashmap::DashMap;
use log::debug;
use crate::document::Document;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CacheKey {
    pub collection: PathBuf,
    pub query: String,
}

/// Match sets keyed by collection path and canonical query string.
///
/// Entries never expire on their own; every mutation of a collection must
/// call [`QueryCache::invalidate`] for that collection's path.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: DashMap<CacheKey, Arc<Vec<Document>>>,
    hit_count: AtomicUsize,
    miss_count: AtomicUsize,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, collection: &Path, query: &str) -> Option<Arc<Vec<Document>>> {
        let key = CacheKey {
            collection: collection.to_path_buf(),
            query: query.to_string(),
        };
        match self.entries.get(&key) {
            Some(hit) => {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                debug!("cache hit for {} in {}", query, collection.display());
                Some(Arc::clone(hit.value()))
            }
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, collection: &Path, query: &str, documents: Vec<Document>) -> Arc<Vec<Document>> {
        let documents = Arc::new(documents);
        self.entries.insert(
            CacheKey {
                collection: collection.to_path_buf(),
                query: query.to_string(),
            },
            Arc::clone(&documents),
        );
        documents
    }

    /// Drops every entry for `path` and for collections below it.
    /// Returns how many entries were removed.
    pub fn invalidate(&self, path: &Path) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.collection.starts_with(path));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!("invalidated {} cache entries under {}", removed, path.display());
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            size: self.entries.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hit_count: usize,
    pub miss_count: usize,
    pub size: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}
