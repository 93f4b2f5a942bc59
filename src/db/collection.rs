use std::path::{Path, PathBuf};
use std::sync::Arc;
use serde_json::Value;
use crate::cache::QueryCache;
use crate::document::Document;
use crate::engine::{converter, Codec, LockGuard, Persistence};
use crate::ops::{Aggregation, Delete, Insert, Reader};
use crate::Result;
use super::Shared;

/// Handle to one collection directory.
///
/// Carries everything operations need: the collection name, its directory,
/// the optional codec, and the root's shared cache and lock table.
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    persistence: Persistence,
    codec: Option<Codec>,
    shared: Arc<Shared>,
}

impl Collection {
    pub(crate) fn new(name: &str, path: PathBuf, codec: Option<Codec>, shared: Arc<Shared>) -> Self {
        Self {
            name: name.to_string(),
            persistence: Persistence::new(path),
            codec,
            shared,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        self.persistence.dir()
    }

    pub fn is_encrypted(&self) -> bool {
        self.codec.is_some()
    }

    pub fn cache(&self) -> &QueryCache {
        &self.shared.cache
    }

    pub(crate) fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    /// Waits for and takes the collection's directory lock.
    pub async fn lock(&self) -> LockGuard {
        self.shared.locks.acquire(self.path()).await
    }

    pub fn is_locked(&self) -> bool {
        self.shared.locks.is_locked(self.path())
    }

    /// Drops every cached match set of this collection.
    pub fn invalidate_cache(&self) -> usize {
        self.shared.cache.invalidate(self.path())
    }

    /// Serializes a document to its on-disk form, encrypting when configured.
    pub(crate) fn encode(&self, document: &Document) -> Result<String> {
        let text = converter::to_text(document)?;
        match &self.codec {
            Some(codec) => codec.encrypt(&text),
            None => Ok(text),
        }
    }

    /// Inverse of [`Collection::encode`].
    pub(crate) fn decode(&self, stored: &str) -> Result<Document> {
        match &self.codec {
            Some(codec) => converter::to_document(&codec.decrypt(stored)?),
            None => converter::to_document(stored),
        }
    }

    /// Starts a read. An empty query matches every document.
    pub fn find(&self, query: Value) -> Result<Reader> {
        Reader::new(self.clone(), query)
    }

    /// Starts a single-document delete.
    pub fn delete_one(&self, query: Value) -> Result<Delete> {
        Delete::new(self.clone(), query)
    }

    pub fn insert(&self, document: Value) -> Result<Insert> {
        Insert::new(self.clone(), document)
    }

    /// Validates `pipeline` and prepares it for execution.
    pub fn aggregate(&self, pipeline: Value) -> Result<Aggregation> {
        Aggregation::new(self.clone(), pipeline)
    }
}
