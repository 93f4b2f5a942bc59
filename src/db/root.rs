use std::path::{Path, PathBuf};
use std::sync::Arc;
use log::info;
use serde::Serialize;
use tokio::fs;
use crate::cache::QueryCache;
use crate::engine::folder;
use crate::{Result, Error};
use super::{validate_name, Database, Shared};

/// Default root directory name.
pub const DEFAULT_ROOT_NAME: &str = "docvault_data";

/// Handle to the root directory that owns all databases.
///
/// Cloning is cheap and clones share the cache and lock table.
#[derive(Debug, Clone)]
pub struct Root {
    name: String,
    path: PathBuf,
    shared: Arc<Shared>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RootInfo {
    pub root_name: String,
    pub current_path: PathBuf,
    pub total_size_bytes: u64,
    pub total_databases: usize,
    pub databases: Vec<String>,
    pub database_paths: Vec<PathBuf>,
}

impl Root {
    /// Binds to `<parent>/<name>`, creating the directory if it is missing.
    pub async fn open<P: AsRef<Path>>(parent: P, name: &str) -> Result<Self> {
        validate_name("root", name)?;
        let path = parent.as_ref().join(name);
        if !folder::exists(&path).await {
            folder::create(&path).await?;
            info!("Root folder created at: {}", path.display());
        }
        let path = fs::canonicalize(&path).await?;

        Ok(Self {
            name: name.to_string(),
            path,
            shared: Arc::new(Shared::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cache(&self) -> &QueryCache {
        &self.shared.cache
    }

    /// Creates the database directory if needed. Idempotent.
    pub async fn create_database(&self, name: &str) -> Result<Database> {
        validate_name("database", name)?;
        let path = self.path.join(name);
        if !folder::exists(&path).await {
            folder::create(&path).await?;
            info!("Database created: {}", path.display());
        }
        Ok(Database::new(name, path, Arc::clone(&self.shared)))
    }

    /// Opens an existing database.
    pub async fn database(&self, name: &str) -> Result<Database> {
        validate_name("database", name)?;
        let path = self.path.join(name);
        if !folder::exists(&path).await {
            return Err(Error::NotFound(format!("database {}", name)));
        }
        Ok(Database::new(name, path, Arc::clone(&self.shared)))
    }

    /// Removes a database directory and every cached match set beneath it.
    pub async fn delete_database(&self, name: &str) -> Result<()> {
        validate_name("database", name)?;
        let path = self.path.join(name);
        if !folder::exists(&path).await {
            return Err(Error::NotFound(format!("database {}", name)));
        }
        // Wait out in-flight scans of every collection. Locks are taken in
        // path order so concurrent removals cannot deadlock.
        let mut collections: Vec<PathBuf> = folder::list_subdirectories(&path)
            .await?
            .into_iter()
            .map(|collection| path.join(collection))
            .collect();
        collections.sort();
        let mut guards = Vec::with_capacity(collections.len());
        for collection in &collections {
            guards.push(self.shared.locks.acquire(collection).await);
        }

        self.shared.remove_dir(&path).await?;
        drop(guards);
        info!("Database deleted: {}", path.display());
        Ok(())
    }

    pub async fn list_databases(&self) -> Result<Vec<String>> {
        folder::list_subdirectories(&self.path).await
    }

    pub async fn total_size(&self) -> Result<u64> {
        folder::size(&self.path).await
    }

    pub async fn info(&self) -> Result<RootInfo> {
        let databases = self.list_databases().await?;
        Ok(RootInfo {
            root_name: self.name.clone(),
            current_path: self.path.clone(),
            total_size_bytes: self.total_size().await?,
            total_databases: databases.len(),
            database_paths: databases.iter().map(|db| self.path.join(db)).collect(),
            databases,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_root() {
        let dir = tempdir().unwrap();
        let root = Root::open(dir.path(), DEFAULT_ROOT_NAME).await.unwrap();
        assert!(root.path().is_dir());
        assert!(root.path().is_absolute());
        assert_eq!(root.name(), DEFAULT_ROOT_NAME);

        // Reopening an existing root is fine.
        Root::open(dir.path(), DEFAULT_ROOT_NAME).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_and_delete_database() {
        let dir = tempdir().unwrap();
        let root = Root::open(dir.path(), "root").await.unwrap();

        let db = root.create_database("app").await.unwrap();
        assert!(db.path().is_dir());
        root.create_database("app").await.unwrap();

        assert_eq!(root.list_databases().await.unwrap(), vec!["app"]);
        assert_eq!(root.database("app").await.unwrap().name(), "app");

        root.delete_database("app").await.unwrap();
        assert!(root.list_databases().await.unwrap().is_empty());
        assert!(matches!(root.delete_database("app").await, Err(Error::NotFound(_))));
        assert!(matches!(root.database("app").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_info() {
        let dir = tempdir().unwrap();
        let root = Root::open(dir.path(), "root").await.unwrap();
        root.create_database("b").await.unwrap();
        let a = root.create_database("a").await.unwrap();
        std::fs::write(a.path().join("blob"), "1234").unwrap();

        let info = root.info().await.unwrap();
        assert_eq!(info.root_name, "root");
        assert_eq!(info.total_databases, 2);
        assert_eq!(info.databases, vec!["a", "b"]);
        assert_eq!(info.database_paths, vec![root.path().join("a"), root.path().join("b")]);
        assert_eq!(info.total_size_bytes, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_delete_database_waits_for_collection_locks() {
        use std::time::Duration;

        let dir = tempdir().unwrap();
        let root = Root::open(dir.path(), "root").await.unwrap();
        let db = root.create_database("app").await.unwrap();
        db.create_collection("a", None).await.unwrap();
        let users = db.create_collection("users", None).await.unwrap();

        let held = users.lock().await;
        let deleting = {
            let root = root.clone();
            tokio::spawn(async move { root.delete_database("app").await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!deleting.is_finished());
        assert!(db.path().is_dir());

        // A match set cached by the lock holder must not survive the removal.
        root.cache().put(users.path(), "{}", vec![]);
        drop(held);

        tokio::time::timeout(Duration::from_secs(1), deleting)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(!db.path().exists());
        assert!(root.cache().is_empty());
        assert!(!users.is_locked());
    }

    #[tokio::test]
    async fn test_clones_share_cache() {
        let dir = tempdir().unwrap();
        let root = Root::open(dir.path(), "root").await.unwrap();
        let clone = root.clone();
        root.cache().put(Path::new("/x"), "{}", vec![]);
        assert_eq!(clone.cache().len(), 1);
    }
}
