//! Backend interface for the persistent handle store.
//!
//! In a browser this is an IndexedDB database whose object store keeps the
//! structured-clone of each `FileSystemFileHandle`.
#![allow(async_fn_in_trait)]

use crate::error::HostResult;
use crate::host::FileHandle;
use crate::ids::FileId;

/// Opens the persistent database that holds cached handles.
pub trait HandleStore {
    /// Handle type persisted by this store.
    type Handle: FileHandle;
    /// Opened database.
    type Db: HandleDb<Handle = Self::Handle>;

    /// Opens (creating or upgrading if needed) `store_name` inside the
    /// database `db_name`.
    async fn open(&self, db_name: &str, store_name: &str) -> HostResult<Self::Db>;
}

/// An opened handle database.
///
/// Each call runs in its own transaction.
pub trait HandleDb {
    /// Handle type persisted by this database.
    type Handle: FileHandle;

    /// Every record, in key order.
    async fn entries(&self) -> HostResult<Vec<(FileId, Self::Handle)>>;

    /// The record stored under `id`.
    async fn get(&self, id: &FileId) -> HostResult<Option<Self::Handle>>;

    /// Inserts or overwrites the record under `id`.
    async fn put(&self, id: &FileId, handle: &Self::Handle) -> HostResult<()>;

    /// Deletes the record under `id`. Deleting a missing key succeeds.
    async fn delete(&self, id: &FileId) -> HostResult<()>;
}
