//! Persistent cache of file handles keyed by [`FileId`].
//!
//! The backing database is opened lazily on the first operation and kept
//! open for the lifetime of the cache. A failed open is not remembered, so
//! the next operation tries again.

mod store;

pub use store::{HandleDb, HandleStore};

use tokio::sync::OnceCell;

use crate::error::{FsAccessError, FsAccessResult, HostError};
use crate::ids::FileId;
use crate::logger::Stopwatch;

/// A cached handle together with its key.
#[derive(Debug, Clone)]
pub struct HandleRecord<H> {
    /// Logical id of the file.
    pub id: FileId,
    /// Handle granted by the host.
    pub handle: H,
}

/// Durable `FileId` → handle map.
pub struct HandleCache<S: HandleStore> {
    store: S,
    db_name: String,
    store_name: String,
    db: OnceCell<S::Db>,
}

impl<S: HandleStore> HandleCache<S> {
    /// Creates a cache over `store`. Nothing is opened until first use.
    pub fn new(store: S, db_name: impl Into<String>, store_name: impl Into<String>) -> Self {
        Self {
            store,
            db_name: db_name.into(),
            store_name: store_name.into(),
            db: OnceCell::new(),
        }
    }

    async fn db(&self) -> FsAccessResult<&S::Db> {
        self.db
            .get_or_try_init(|| async {
                let ts = Stopwatch::start();
                let db = self
                    .store
                    .open(&self.db_name, &self.store_name)
                    .await
                    .map_err(|err| self.fail("opening", &err))?;
                log::debug!("Opened handle cache {} {ts}", self.db_name);
                Ok::<_, FsAccessError>(db)
            })
            .await
    }

    fn fail(&self, action: &str, err: &HostError) -> FsAccessError {
        log::error!("Error {action} handle cache {}: {err}", self.db_name);
        FsAccessError::Cache(format!("{action} {}: {err}", self.db_name))
    }

    /// Returns every cached record.
    ///
    /// # Errors
    ///
    /// Returns [`FsAccessError::Cache`] if the database cannot be opened or
    /// read.
    pub async fn list(&self) -> FsAccessResult<Vec<HandleRecord<S::Handle>>> {
        log::debug!("List");
        let db = self.db().await?;
        let ts = Stopwatch::start();
        let records: Vec<_> = db
            .entries()
            .await
            .map_err(|err| self.fail("listing from", &err))?
            .into_iter()
            .map(|(id, handle)| HandleRecord { id, handle })
            .collect();
        log::debug!("Listed {} records {ts}", records.len());
        Ok(records)
    }

    /// Returns the handle cached under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`FsAccessError::NotFound`] if nothing is cached under `id`,
    /// or [`FsAccessError::Cache`] if the database fails.
    pub async fn load(&self, id: &FileId) -> FsAccessResult<S::Handle> {
        log::debug!("Load {id}");
        let db = self.db().await?;
        let ts = Stopwatch::start();
        let handle = db
            .get(id)
            .await
            .map_err(|err| self.fail("loading from", &err))?;
        match handle {
            Some(handle) => {
                log::debug!("Loaded {id} {ts}");
                Ok(handle)
            }
            None => {
                log::debug!("Not found in cache {id} {ts}");
                Err(FsAccessError::not_found(id.as_str()))
            }
        }
    }

    /// Stores `handle` under `id`, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns [`FsAccessError::Cache`] if the database fails.
    pub async fn save(&self, id: &FileId, handle: &S::Handle) -> FsAccessResult<()> {
        log::debug!("Save {id}");
        let db = self.db().await?;
        let ts = Stopwatch::start();
        db.put(id, handle)
            .await
            .map_err(|err| self.fail("saving to", &err))?;
        log::debug!("Saved {id} {ts}");
        Ok(())
    }

    /// Deletes the record under `id`. A missing record is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`FsAccessError::Cache`] if the database fails.
    pub async fn remove(&self, id: &FileId) -> FsAccessResult<()> {
        log::debug!("Remove {id}");
        let db = self.db().await?;
        let ts = Stopwatch::start();
        db.delete(id)
            .await
            .map_err(|err| self.fail("removing from", &err))?;
        log::debug!("Removed {id} {ts}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::FileHandle;
    use crate::platform::memory::{MemoryDisk, MemoryHandleStore};

    fn cache(store: &MemoryHandleStore) -> HandleCache<MemoryHandleStore> {
        HandleCache::new(store.clone(), "FileHandles", "files")
    }

    #[tokio::test]
    async fn test_lazy_open_happens_once() {
        let store = MemoryHandleStore::new();
        let cache = cache(&store);
        assert_eq!(store.open_count(), 0);

        let disk = MemoryDisk::new();
        let handle = disk.create_file("a.kdbx", b"a");
        cache.save(&FileId::new("id1"), &handle).await.unwrap();
        cache.list().await.unwrap();
        cache.load(&FileId::new("id1")).await.unwrap();
        cache.remove(&FileId::new("id1")).await.unwrap();

        assert_eq!(store.open_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_open_is_retried() {
        let store = MemoryHandleStore::new();
        store.fail_next_opens(1);
        let cache = cache(&store);

        let err = cache.list().await.unwrap_err();
        assert_eq!(err.code(), "cache");

        assert!(cache.list().await.unwrap().is_empty());
        assert_eq!(store.open_count(), 1);
    }

    #[tokio::test]
    async fn test_save_overwrites_and_remove_is_idempotent() {
        let store = MemoryHandleStore::new();
        let cache = cache(&store);
        let disk = MemoryDisk::new();
        let first = disk.create_file("a.kdbx", b"a");
        let second = disk.create_file("b.kdbx", b"b");
        let id = FileId::new("id1");

        cache.save(&id, &first).await.unwrap();
        cache.save(&id, &second).await.unwrap();
        let records = cache.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].handle.name(), "b.kdbx");

        cache.remove(&id).await.unwrap();
        cache.remove(&id).await.unwrap();
        assert!(matches!(
            cache.load(&id).await,
            Err(FsAccessError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_database_failure_maps_to_cache_error() {
        let store = MemoryHandleStore::new();
        let cache = cache(&store);
        cache.list().await.unwrap();

        store.set_failing(true);
        let err = cache.load(&FileId::new("id1")).await.unwrap_err();
        assert_eq!(err.code(), "cache");
    }

    #[tokio::test]
    async fn test_stores_are_isolated_by_name() {
        let store: MemoryHandleStore = MemoryHandleStore::new();
        let disk = MemoryDisk::new();
        let a = HandleCache::new(store.clone(), "FileHandles", "files");
        let b = HandleCache::new(store.clone(), "OtherCache", "files");

        a.save(&FileId::new("id1"), &disk.create_file("a.kdbx", b""))
            .await
            .unwrap();
        assert_eq!(a.list().await.unwrap().len(), 1);
        assert!(b.list().await.unwrap().is_empty());
    }
}
