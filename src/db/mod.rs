//! The `Root -> Database -> Collection` directory hierarchy.
//!
//! A [`Root`] owns the query cache and the lock table and shares them with
//! every [`Database`] and [`Collection`] handle derived from it. Open a root
//! directory once and clone the handle; two independent roots over the same
//! directory do not exclude each other.

pub mod collection;
pub mod database;
pub mod root;

pub use collection::Collection;
pub use database::{Database, DatabaseInfo};
pub use root::{Root, RootInfo};

use std::path::Path;
use std::sync::Arc;
use crate::cache::QueryCache;
use crate::engine::{folder, LockTable};
use crate::{Result, Error};

#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub cache: QueryCache,
    pub locks: Arc<LockTable>,
}

impl Shared {
    /// Deletes a directory tree and drops every cached match set beneath it.
    ///
    /// The cache is invalidated whether or not the removal succeeds, since a
    /// failed `remove_dir_all` may already have unlinked some files. Callers
    /// hold the locks of every collection under `path`.
    pub(crate) async fn remove_dir(&self, path: &Path) -> Result<()> {
        let removed = folder::delete(path).await;
        self.cache.invalidate(path);
        removed
    }
}

/// Database and collection names become directory names.
pub(crate) fn validate_name(kind: &str, name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(Error::Validation(format!("invalid {} name {:?}", kind, name)));
    }
    Ok(())
}
