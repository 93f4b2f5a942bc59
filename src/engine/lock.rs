use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use log::debug;
use crate::{Result, Error};

/// Process-local lock markers for collection directories.
///
/// A directory is locked while its path is in the held set. [`LockTable::acquire`]
/// is the scoped entry point: it waits until the marker is free, sets it, and
/// returns a [`LockGuard`] that clears it when dropped. The raw
/// [`lock`](LockTable::lock)/[`unlock`](LockTable::unlock) pair is kept for
/// callers that manage the marker explicitly.
#[derive(Debug, Default)]
pub struct LockTable {
    held: Mutex<HashSet<PathBuf>>,
    released: Notify,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_locked(&self, path: &Path) -> bool {
        self.held().contains(path)
    }

    /// Test-and-set. Returns `false` when the directory is already locked.
    pub fn try_lock(&self, path: &Path) -> bool {
        self.held().insert(path.to_path_buf())
    }

    /// Sets the marker, failing if another owner holds it.
    pub fn lock(&self, path: &Path) -> Result<()> {
        if self.try_lock(path) {
            Ok(())
        } else {
            Err(Error::Lock(format!("{} is already locked", path.display())))
        }
    }

    /// Clears the marker and wakes waiters.
    pub fn unlock(&self, path: &Path) -> Result<()> {
        let removed = self.held().remove(path);
        if !removed {
            return Err(Error::Lock(format!("{} is not locked", path.display())));
        }
        self.released.notify_waiters();
        Ok(())
    }

    /// Waits until `path` is free, then holds it until the guard is dropped.
    pub async fn acquire(self: &Arc<Self>, path: &Path) -> LockGuard {
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            // Register before testing so a release between the test and the
            // await is not missed.
            notified.as_mut().enable();

            if self.try_lock(path) {
                return LockGuard {
                    table: Arc::clone(self),
                    path: path.to_path_buf(),
                };
            }
            debug!("waiting for lock on {}", path.display());
            notified.await;
        }
    }
}

/// Holds a directory lock; releases it on drop.
#[derive(Debug)]
pub struct LockGuard {
    table: Arc<LockTable>,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.table.held().remove(&self.path) {
            self.table.released.notify_waiters();
        }
    }
}
