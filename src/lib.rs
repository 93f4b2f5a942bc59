//! Docvault is an embedded, file-backed document database.
//!
//! Data is laid out as a `Root -> Database -> Collection -> Document` directory
//! hierarchy. Every document is a JSON object persisted as its own file inside
//! the collection directory, optionally sealed with AES-256-GCM.
//!
//! ## Core Components
//! - [`engine`]: Storage substrate (atomic file writes, directory primitives,
//!   the cooperative directory lock), the crypto codec and the converter.
//! - [`query`]: Equality matching over a loaded collection and single-field sorting.
//! - [`cache`]: The query cache consulted before a collection scan.
//! - [`ops`]: Read, delete, insert and aggregation operations.
//! - [`db`]: The root/database/collection handles operations are rooted at.
//!
//! ```no_run
//! use docvault::{db::Root, Operation};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> docvault::Result<()> {
//!     let root = Root::open(".", "docvault_data").await?;
//!     let users = root.create_database("app").await?.create_collection("users", None).await?;
//!     users.insert(json!({"name": "Alice", "age": 30}))?.exec().await?;
//!     let page = users.find(json!({"age": 30}))?.limit(5).exec().await?;
//!     println!("{:?}", page.documents);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod db;
pub mod document;
pub mod engine;
pub mod ops;
pub mod query;
pub mod response;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use document::{Document, StoredDocument, DOCUMENT_ID};
pub use response::Response;

/// Errors returned by Docvault.
#[derive(Error, Debug)]
pub enum Error {
    /// A file or directory operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Acquiring or releasing a directory lock failed.
    #[error("lock error: {0}")]
    Lock(String),
    /// No document matched, or a database/collection/file is absent.
    #[error("not found: {0}")]
    NotFound(String),
    /// Wrong key or corrupted ciphertext.
    #[error("decryption failed: {0}")]
    Decrypt(String),
    /// Malformed input caught before any I/O was attempted.
    #[error("validation error: {0}")]
    Validation(String),
    /// Error during JSON serialization or deserialization.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP-style status code reported in the error envelope.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::Validation(_) => 400,
            Error::Lock(_) => 423,
            _ => 500,
        }
    }
}

/// A specialized Result type for Docvault operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A configured operation that can be executed against a collection.
///
/// Operations are built (and validated) synchronously, then run with
/// [`Operation::exec`]. [`Operation::respond`] wraps the outcome in the
/// uniform [`Response`] envelope.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Payload produced on success.
    type Output: Serialize + Send;

    /// Runs the operation.
    async fn exec(&self) -> Result<Self::Output>;

    /// Runs the operation and converts the outcome into an envelope.
    async fn respond(&self) -> Response<Self::Output> {
        self.exec().await.into()
    }
}
