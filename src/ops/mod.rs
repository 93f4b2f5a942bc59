//! Operations executed against a [`Collection`].
//!
//! Every operation that scans a collection holds the collection's
//! [`LockGuard`] for the whole scan (and mutation, if any). The guard is
//! released when it goes out of scope, on success and on error alike.

pub mod aggregation;
pub mod delete;
pub mod insert;
pub mod reader;

pub use aggregation::{Aggregation, Stage};
pub use delete::{Delete, DeleteResult};
pub use insert::{Insert, InsertResult};
pub use reader::{ReadResult, Reader};

use log::debug;
use crate::db::Collection;
use crate::document::StoredDocument;
use crate::engine::LockGuard;
use crate::Result;

/// Loads and decodes every document of the collection in listing order.
///
/// Takes the lock guard to prove the caller holds the directory. Any file
/// that fails to read, decrypt or parse fails the whole load.
pub(crate) async fn load_documents(collection: &Collection, _guard: &LockGuard) -> Result<Vec<StoredDocument>> {
    let raw = collection.persistence().load_all().await?;
    let documents = raw
        .into_iter()
        .map(|(file_name, text)| Ok(StoredDocument::new(file_name, collection.decode(&text)?)))
        .collect::<Result<Vec<_>>>()?;
    debug!("loaded {} documents from {}", documents.len(), collection.path().display());
    Ok(documents)
}
