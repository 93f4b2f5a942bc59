use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use crate::{Result, Error};

pub async fn exists(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

/// Creates the directory and any missing parents. Idempotent.
pub async fn create(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await?;
    Ok(())
}

/// Removes the directory and everything below it.
pub async fn delete(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(Error::NotFound(format!("directory {}", path.display())))
        }
        Err(e) => Err(e.into()),
    }
}

/// Lists entry names, sorted so scan order is stable across platforms.
pub async fn list(path: &Path) -> Result<Vec<String>> {
    let mut reader = match fs::read_dir(path).await {
        Ok(r) => r,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::NotFound(format!("directory {}", path.display())));
        }
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Lists the names of subdirectories only.
pub async fn list_subdirectories(path: &Path) -> Result<Vec<String>> {
    let mut dirs = Vec::new();
    for name in list(path).await? {
        if exists(&path.join(&name)).await {
            dirs.push(name);
        }
    }
    Ok(dirs)
}

/// Recursive sum of file sizes below `path`.
pub async fn size(path: &Path) -> Result<u64> {
    let mut total = 0u64;
    let mut pending = vec![path.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut reader = fs::read_dir(&dir).await?;
        while let Some(entry) = reader.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_dir() {
                pending.push(entry.path());
            } else {
                total += meta.len();
            }
        }
    }
    Ok(total)
}
