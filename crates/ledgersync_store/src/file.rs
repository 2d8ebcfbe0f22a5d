//! File-based store for persistent storage.

use crate::backend::KeyValueStore;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// A file-based key-value store.
///
/// Each key is persisted as its own file under a root directory, so a
/// `set` replaces exactly one value and a crash mid-write can corrupt at
/// most one key. Values survive process restarts.
///
/// # Durability
///
/// Writes go to a temporary sibling file first and are moved into place
/// with a rename, so readers never observe a half-written value.
///
/// # Keys
///
/// Keys map directly to file names and are restricted to ASCII
/// alphanumerics plus `.`, `_` and `-`. Anything else is rejected with
/// [`StoreError::InvalidKey`].
///
/// # Example
///
/// ```no_run
/// use ledgersync_store::{KeyValueStore, FileStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = FileStore::open("ledgersync-data").await.unwrap();
/// store.set("sync_queue", "[]").await.unwrap();
/// # }
/// ```
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens a file store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Returns the root directory of this store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> StoreResult<PathBuf> {
        if key.is_empty()
            || !key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-')
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.key_path(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.key_path(key)?;
        let tmp = self.root.join(format!("{key}.tmp"));
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let path = self.key_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn file_set_and_get() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store.set("sync_queue", "[1,2,3]").await.unwrap();
        assert_eq!(
            store.get("sync_queue").await.unwrap().as_deref(),
            Some("[1,2,3]")
        );
    }

    #[tokio::test]
    async fn file_missing_key_is_none() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        assert_eq!(store.get("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_set_replaces_whole_value() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store.set("k", "a much longer first value").await.unwrap();
        store.set("k", "short").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("short"));
    }

    #[tokio::test]
    async fn file_remove() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store.set("k", "v").await.unwrap();
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);

        // Removing again is a no-op
        assert!(store.remove("k").await.is_ok());
    }

    #[tokio::test]
    async fn file_persistence_across_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = FileStore::open(dir.path()).await.unwrap();
            store.set("entries_alice", "[]").await.unwrap();
        }

        {
            let store = FileStore::open(dir.path()).await.unwrap();
            assert_eq!(
                store.get("entries_alice").await.unwrap().as_deref(),
                Some("[]")
            );
        }
    }

    #[tokio::test]
    async fn file_rejects_bad_keys() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        for key in ["", "a/b", "../escape", "with space"] {
            let result = store.set(key, "v").await;
            assert!(
                matches!(result, Err(StoreError::InvalidKey(_))),
                "key {key:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn file_creates_root_dir() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested").join("store");

        let store = FileStore::open(&nested).await.unwrap();
        assert_eq!(store.root(), nested);
        assert!(nested.exists());
    }
}
