use std::sync::Arc;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use crate::db::Collection;
use crate::document::{into_document, type_name, Document};
use crate::engine::converter::canonical_query;
use crate::query::{HashmapSearch, SortSpec};
use crate::{Result, Error, Operation};
use super::load_documents;

pub const DEFAULT_LIMIT: usize = 10;

/// Read path: filter, sort, paginate, project.
///
/// The match set for a query is served from the cache when present; otherwise
/// the collection is scanned under its lock and the result cached. Sorting,
/// pagination and projection are applied to the match set afterwards.
///
/// ```no_run
/// # use docvault::{db::Collection, Operation};
/// # use serde_json::json;
/// # async fn demo(users: Collection) -> docvault::Result<()> {
/// let page = users
///     .find(json!({"city": "Oslo"}))?
///     .sort(json!({"age": -1}))?
///     .skip(10)
///     .limit(10)
///     .set_project(json!({"name": 1, "age": 1}))?
///     .set_count(true)
///     .exec()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Reader {
    collection: Collection,
    query: Document,
    limit: usize,
    skip: usize,
    sort: Option<SortSpec>,
    project: Vec<String>,
    count: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadResult {
    pub documents: Vec<Document>,
    /// Size of the whole match set, present when counting was requested.
    #[serde(rename = "totalDocuments", skip_serializing_if = "Option::is_none")]
    pub total_documents: Option<usize>,
}

impl Reader {
    pub fn new(collection: Collection, query: Value) -> Result<Self> {
        Ok(Self {
            collection,
            query: into_document(query, "query")?,
            limit: DEFAULT_LIMIT,
            skip: 0,
            sort: None,
            project: Vec::new(),
            count: false,
        })
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Single-field sort, e.g. `{"age": -1}`. Only the first entry is used.
    pub fn sort(mut self, spec: Value) -> Result<Self> {
        self.sort = SortSpec::parse(&spec)?;
        Ok(self)
    }

    /// Inclusion projection, e.g. `{"name": 1, "age": 1}`.
    pub fn set_project(mut self, spec: Value) -> Result<Self> {
        let spec = into_document(spec, "projection")?;
        let mut fields = Vec::with_capacity(spec.len());
        for (field, flag) in spec {
            if flag.as_f64() != Some(1.0) {
                return Err(Error::Validation(format!(
                    "projection only supports inclusion (1), got {} for {:?}",
                    type_name(&flag),
                    field
                )));
            }
            fields.push(field);
        }
        self.project = fields;
        Ok(self)
    }

    pub fn set_count(mut self, count: bool) -> Self {
        self.count = count;
        self
    }

    async fn match_set(&self) -> Result<Arc<Vec<Document>>> {
        let key = canonical_query(&self.query);
        let cache = self.collection.cache();
        if let Some(hit) = cache.get(self.collection.path(), &key) {
            return Ok(hit);
        }

        let guard = self.collection.lock().await;
        let entries = load_documents(&self.collection, &guard).await?;
        let matched = HashmapSearch::new(&entries).find(&self.query);
        Ok(cache.put(self.collection.path(), &key, matched))
    }

    fn apply_projection(&self, document: &Document) -> Document {
        if self.project.is_empty() {
            return document.clone();
        }
        document
            .iter()
            .filter(|(field, _)| self.project.iter().any(|p| p == *field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }

    fn shape(&self, matched: &[Document]) -> ReadResult {
        let mut ordered: Vec<&Document> = matched.iter().collect();
        if let Some(sort) = &self.sort {
            sort.sort_by(&mut ordered, |d| *d);
        }

        let documents = ordered
            .into_iter()
            .skip(self.skip)
            .take(self.limit)
            .map(|d| self.apply_projection(d))
            .collect();

        ReadResult {
            documents,
            total_documents: self.count.then_some(matched.len()),
        }
    }
}

#[async_trait]
impl Operation for Reader {
    type Output = ReadResult;

    async fn exec(&self) -> Result<ReadResult> {
        let matched = self.match_set().await?;
        Ok(self.shape(&matched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Root;
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    async fn seeded() -> (TempDir, Collection) {
        let dir = tempdir().unwrap();
        let root = Root::open(dir.path(), "root").await.unwrap();
        let users = root
            .create_database("app")
            .await
            .unwrap()
            .create_collection("users", None)
            .await
            .unwrap();
        for (i, (name, age, city)) in [
            ("ann", 31, "Oslo"),
            ("bob", 25, "Rome"),
            ("cid", 42, "Oslo"),
            ("dee", 25, "Oslo"),
            ("eve", 37, "Rome"),
        ]
        .into_iter()
        .enumerate()
        {
            users
                .insert(json!({"documentId": format!("u{}", i), "name": name, "age": age, "city": city}))
                .unwrap()
                .exec()
                .await
                .unwrap();
        }
        (dir, users)
    }

    fn names(result: &ReadResult) -> Vec<&str> {
        result.documents.iter().map(|d| d["name"].as_str().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_empty_query_returns_all_in_scan_order() {
        let (_dir, users) = seeded().await;
        let result = users.find(json!({})).unwrap().exec().await.unwrap();
        assert_eq!(names(&result), vec!["ann", "bob", "cid", "dee", "eve"]);
        assert_eq!(result.total_documents, None);
    }

    #[tokio::test]
    async fn test_filter_sort_paginate() {
        let (_dir, users) = seeded().await;
        let result = users
            .find(json!({"city": "Oslo"}))
            .unwrap()
            .sort(json!({"age": -1}))
            .unwrap()
            .skip(1)
            .limit(1)
            .exec()
            .await
            .unwrap();
        assert_eq!(names(&result), vec!["ann"]);
    }

    #[tokio::test]
    async fn test_pagination_edges() {
        let (_dir, users) = seeded().await;
        let past_end = users.find(json!({})).unwrap().skip(5).exec().await.unwrap();
        assert!(past_end.documents.is_empty());

        let tail = users.find(json!({})).unwrap().skip(3).limit(10).exec().await.unwrap();
        assert_eq!(names(&tail), vec!["dee", "eve"]);

        let none = users.find(json!({})).unwrap().limit(0).exec().await.unwrap();
        assert!(none.documents.is_empty());
    }

    #[tokio::test]
    async fn test_default_limit_is_ten() {
        let (_dir, users) = seeded().await;
        for i in 0..10 {
            users.insert(json!({"name": format!("extra{}", i)})).unwrap().exec().await.unwrap();
        }
        let result = users.find(json!({})).unwrap().exec().await.unwrap();
        assert_eq!(result.documents.len(), DEFAULT_LIMIT);
    }

    #[tokio::test]
    async fn test_projection_keeps_source_field_order() {
        let (_dir, users) = seeded().await;
        let result = users
            .find(json!({"name": "bob"}))
            .unwrap()
            .set_project(json!({"city": 1, "name": 1, "missing": 1}))
            .unwrap()
            .exec()
            .await
            .unwrap();
        assert_eq!(result.documents, vec![into_document(json!({"name": "bob", "city": "Rome"}), "d").unwrap()]);
        let keys: Vec<&String> = result.documents[0].keys().collect();
        assert_eq!(keys, vec!["name", "city"]);
    }

    #[tokio::test]
    async fn test_count_reports_full_match_set() {
        let (_dir, users) = seeded().await;
        let result = users
            .find(json!({"city": "Oslo"}))
            .unwrap()
            .limit(2)
            .set_count(true)
            .exec()
            .await
            .unwrap();
        assert_eq!(result.documents.len(), 2);
        assert_eq!(result.total_documents, Some(3));
        assert_eq!(serde_json::to_value(&result).unwrap()["totalDocuments"], json!(3));
    }

    #[tokio::test]
    async fn test_setters_validate_synchronously() {
        let (_dir, users) = seeded().await;
        assert!(matches!(users.find(json!("nope")), Err(Error::Validation(_))));
        let reader = users.find(json!({})).unwrap();
        assert!(matches!(reader.clone().sort(json!([1])), Err(Error::Validation(_))));
        assert!(matches!(reader.clone().sort(json!({"age": 2})), Err(Error::Validation(_))));
        assert!(matches!(reader.clone().set_project(json!({"age": 0})), Err(Error::Validation(_))));
        assert!(matches!(reader.set_project(json!(["age"])), Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let (_dir, users) = seeded().await;
        users.find(json!({"city": "Rome"})).unwrap().exec().await.unwrap();
        let misses = users.cache().stats().miss_count;

        let again = users.find(json!({"city": "Rome"})).unwrap().exec().await.unwrap();
        assert_eq!(names(&again), vec!["bob", "eve"]);
        let stats = users.cache().stats();
        assert_eq!(stats.miss_count, misses);
        assert_eq!(stats.hit_count, 1);
    }

    #[tokio::test]
    async fn test_respond_wraps_errors() {
        let (_dir, users) = seeded().await;
        std::fs::write(users.path().join("broken.json"), "{not json").unwrap();
        let resp = users.find(json!({})).unwrap().respond().await;
        assert!(!resp.is_success());
        assert!(!users.is_locked());
    }
}
