use async_trait::async_trait;
use log::info;
use serde::Serialize;
use serde_json::Value;
use crate::db::Collection;
use crate::document::{into_document, Document};
use crate::query::{HashmapSearch, SortSpec};
use crate::{Result, Error, Operation};
use super::load_documents;

/// Removes exactly one document matching the query.
///
/// Without a sort the first match in scan order is removed; with a sort the
/// whole match set is ordered first and its head is removed.
#[derive(Debug, Clone)]
pub struct Delete {
    collection: Collection,
    query: Document,
    sort: Option<SortSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteResult {
    pub message: String,
    #[serde(rename = "deleteData")]
    pub deleted: Document,
}

impl Delete {
    pub fn new(collection: Collection, query: Value) -> Result<Self> {
        Ok(Self {
            collection,
            query: into_document(query, "query")?,
            sort: None,
        })
    }

    pub fn sort(mut self, spec: Value) -> Result<Self> {
        self.sort = SortSpec::parse(&spec)?;
        Ok(self)
    }
}

#[async_trait]
impl Operation for Delete {
    type Output = DeleteResult;

    async fn exec(&self) -> Result<DeleteResult> {
        let guard = self.collection.lock().await;
        let entries = load_documents(&self.collection, &guard).await?;

        let mut matched = HashmapSearch::new(&entries).find_with_identity(&self.query);
        if let Some(sort) = &self.sort {
            sort.sort_by(&mut matched, |s| &s.document);
        }
        let target = matched
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound("no document matches the query".to_string()))?;

        self.collection.persistence().remove(&target.file_name).await?;
        self.collection.invalidate_cache();
        info!("Deleted {} from {}", target.file_name, self.collection.path().display());

        Ok(DeleteResult {
            message: "Data deleted successfully".to_string(),
            deleted: target.document,
        })
    }
}
