use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;
use crate::db::{validate_name, Collection};
use crate::document::{into_document, Document, DOCUMENT_ID};
use crate::engine::Persistence;
use crate::{Result, Error, Operation};

/// Writes one new document to its own file.
///
/// A `documentId` is generated when the document does not carry one. An
/// explicit id must be a filename-safe string not already used in the
/// collection.
#[derive(Debug, Clone)]
pub struct Insert {
    collection: Collection,
    document: Document,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertResult {
    #[serde(rename = "documentId")]
    pub document_id: String,
    pub document: Document,
}

impl Insert {
    pub fn new(collection: Collection, document: Value) -> Result<Self> {
        let document = into_document(document, "document")?;
        if let Some(id) = document.get(DOCUMENT_ID) {
            let id = id
                .as_str()
                .ok_or_else(|| Error::Validation(format!("{} must be a string", DOCUMENT_ID)))?;
            validate_name(DOCUMENT_ID, id)?;
        }
        Ok(Self { collection, document })
    }

    /// The document as it will be stored, with `documentId` first.
    fn with_id(&self) -> (String, Document) {
        if let Some(Value::String(id)) = self.document.get(DOCUMENT_ID) {
            return (id.clone(), self.document.clone());
        }
        let id = Uuid::new_v4().to_string();
        let mut document = Document::with_capacity(self.document.len() + 1);
        document.insert(DOCUMENT_ID.to_string(), Value::String(id.clone()));
        document.extend(self.document.clone());
        (id, document)
    }
}

#[async_trait]
impl Operation for Insert {
    type Output = InsertResult;

    async fn exec(&self) -> Result<InsertResult> {
        let (document_id, document) = self.with_id();
        let file_name = Persistence::file_name(&document_id);
        let stored = self.collection.encode(&document)?;

        let _guard = self.collection.lock().await;
        let persistence = self.collection.persistence();
        if persistence.contains(&file_name).await {
            return Err(Error::Validation(format!("duplicate {} {:?}", DOCUMENT_ID, document_id)));
        }
        persistence.write(&file_name, &stored).await?;
        self.collection.invalidate_cache();
        debug!("Inserted {} into {}", file_name, self.collection.path().display());

        Ok(InsertResult { document_id, document })
    }
}
