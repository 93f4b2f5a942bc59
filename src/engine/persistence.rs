use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use futures::future::try_join_all;
use tokio::fs;
use log::warn;
use crate::{Result, Error};

const DOCUMENT_EXT: &str = "json";
const TEMP_SUFFIX: &str = ".tmp";

/// Handles disk I/O for the documents of one collection.
///
/// Each document lives in its own `<documentId>.json` file. Writes use an
/// atomic "write-then-rename" strategy so a crash mid-write leaves either the
/// old or the new content, never a torn file.
#[derive(Debug, Clone)]
pub struct Persistence {
    dir: PathBuf,
}

impl Persistence {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(document_id: &str) -> String {
        format!("{}.{}", document_id, DOCUMENT_EXT)
    }

    pub async fn contains(&self, file_name: &str) -> bool {
        fs::metadata(self.dir.join(file_name)).await.is_ok()
    }

    /// Writes a file atomically through a sibling temp file.
    pub async fn write(&self, file_name: &str, contents: &str) -> Result<()> {
        let file_path = self.dir.join(file_name);
        let temp_path = self.dir.join(format!("{}{}", file_name, TEMP_SUFFIX));

        fs::write(&temp_path, contents.as_bytes()).await?;
        if let Err(e) = fs::rename(&temp_path, &file_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn read(&self, file_name: &str) -> Result<String> {
        match fs::read_to_string(self.dir.join(file_name)).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound(format!("file {}", file_name))),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove(&self, file_name: &str) -> Result<()> {
        match fs::remove_file(self.dir.join(file_name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound(format!("file {}", file_name))),
            Err(e) => Err(e.into()),
        }
    }

    /// Names of the document files in the collection, in listing order.
    ///
    /// Leftover temp files and foreign entries are skipped.
    pub async fn list(&self) -> Result<Vec<String>> {
        let names = super::folder::list(&self.dir).await?;
        Ok(names
            .into_iter()
            .filter(|name| {
                let is_doc = Path::new(name).extension().and_then(|s| s.to_str()) == Some(DOCUMENT_EXT);
                if !is_doc {
                    warn!("Skipping non-document entry {:?} in {}", name, self.dir.display());
                }
                is_doc
            })
            .collect())
    }

    /// Reads every document file, returning `(file name, raw text)` pairs in
    /// listing order. Any unreadable file fails the whole load.
    pub async fn load_all(&self) -> Result<Vec<(String, String)>> {
        let names = self.list().await?;
        let reads = names.into_iter().map(|name| async move {
            let text = self.read(&name).await?;
            Ok::<_, Error>((name, text))
        });
        try_join_all(reads).await
    }
}
