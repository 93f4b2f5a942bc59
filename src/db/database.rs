use std::path::{Path, PathBuf};
use std::sync::Arc;
use log::info;
use serde::Serialize;
use crate::engine::{folder, Codec};
use crate::{Result, Error};
use super::{validate_name, Collection, Shared};

/// Handle to a database directory holding collection directories.
#[derive(Debug, Clone)]
pub struct Database {
    name: String,
    path: PathBuf,
    shared: Arc<Shared>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub name: String,
    pub path: PathBuf,
    pub total_size_bytes: u64,
    pub collections: Vec<String>,
}

impl Database {
    pub(crate) fn new(name: &str, path: PathBuf, shared: Arc<Shared>) -> Self {
        Self {
            name: name.to_string(),
            path,
            shared,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn collection_handle(&self, name: &str, key: Option<&[u8]>) -> Result<Collection> {
        validate_name("collection", name)?;
        let codec = key.map(Codec::new).transpose()?;
        Ok(Collection::new(name, self.path.join(name), codec, Arc::clone(&self.shared)))
    }

    /// Creates the collection directory if needed. `key` enables encryption.
    pub async fn create_collection(&self, name: &str, key: Option<&[u8]>) -> Result<Collection> {
        let collection = self.collection_handle(name, key)?;
        if !folder::exists(collection.path()).await {
            folder::create(collection.path()).await?;
            info!("Collection created: {}", collection.path().display());
        }
        Ok(collection)
    }

    /// Opens an existing collection.
    pub async fn collection(&self, name: &str, key: Option<&[u8]>) -> Result<Collection> {
        let collection = self.collection_handle(name, key)?;
        if !folder::exists(collection.path()).await {
            return Err(Error::NotFound(format!("collection {} in database {}", name, self.name)));
        }
        Ok(collection)
    }

    /// Removes a collection directory and its cached match sets.
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        validate_name("collection", name)?;
        let path = self.path.join(name);
        if !folder::exists(&path).await {
            return Err(Error::NotFound(format!("collection {} in database {}", name, self.name)));
        }

        let _guard = self.shared.locks.acquire(&path).await;
        self.shared.remove_dir(&path).await?;
        info!("Collection deleted: {}", path.display());
        Ok(())
    }

    pub async fn list_collections(&self) -> Result<Vec<String>> {
        folder::list_subdirectories(&self.path).await
    }

    pub async fn info(&self) -> Result<DatabaseInfo> {
        Ok(DatabaseInfo {
            name: self.name.clone(),
            path: self.path.clone(),
            total_size_bytes: folder::size(&self.path).await?,
            collections: self.list_collections().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn database(dir: &Path) -> Database {
        Database::new("app", dir.join("app"), Arc::new(Shared::default()))
    }

    #[tokio::test]
    async fn test_create_open_delete_collection() {
        let dir = tempdir().unwrap();
        let db = database(dir.path());

        assert!(matches!(db.collection("users", None).await, Err(Error::NotFound(_))));

        let users = db.create_collection("users", None).await.unwrap();
        assert!(users.path().is_dir());
        assert!(!users.is_encrypted());
        db.create_collection("users", None).await.unwrap();
        db.create_collection("orders", None).await.unwrap();

        assert_eq!(db.list_collections().await.unwrap(), vec!["orders", "users"]);
        assert_eq!(db.collection("users", None).await.unwrap().name(), "users");

        db.delete_collection("users").await.unwrap();
        assert_eq!(db.list_collections().await.unwrap(), vec!["orders"]);
        assert!(matches!(db.delete_collection("users").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_names_and_keys_fail_before_io() {
        let dir = tempdir().unwrap();
        let db = database(dir.path());
        assert!(matches!(db.create_collection("../escape", None).await, Err(Error::Validation(_))));
        assert!(matches!(db.create_collection("users", Some(&b"short"[..])).await, Err(Error::Validation(_))));
        assert!(!dir.path().join("app").exists());
    }

    #[tokio::test]
    async fn test_info_reports_collections() {
        let dir = tempdir().unwrap();
        let db = database(dir.path());
        let users = db.create_collection("users", None).await.unwrap();
        std::fs::write(users.path().join("a.json"), "{}").unwrap();

        let info = db.info().await.unwrap();
        assert_eq!(info.name, "app");
        assert_eq!(info.collections, vec!["users"]);
        assert_eq!(info.total_size_bytes, 2);
    }
}
