//! Storage provider backed by File System Access handles.
//!
//! Files are addressed by a [`FileId`] that the adapter assigns the first
//! time the user picks a file; the handle itself lives in the
//! [`HandleCache`]. Browsers forget granted permissions unpredictably, so
//! every operation asks for read/write access again before touching the
//! file. A prompt the user dismisses or a revoked grant surfaces as
//! [`FsAccessError::PermissionDenied`] and is not retried.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::cache::{HandleCache, HandleStore};
use crate::config::FsAccessConfig;
use crate::error::{FsAccessError, FsAccessResult, HostErrorKind};
use crate::host::{FileHandle, FilePicker, HostFile, PermissionMode, PermissionState, WritableFile};
use crate::ids::{FileId, IdGenerator, UuidGenerator};
use crate::logger::Stopwatch;
use crate::storage::{FileEntry, FileStat, LoadedFile, SaveOutcome, StorageOpts, StorageProvider};

/// Storage provider for files opened through the host file picker.
pub struct FsAccessStorage<S, P, G = UuidGenerator>
where
    S: HandleStore,
    P: FilePicker<Handle = S::Handle>,
    G: IdGenerator,
{
    config: FsAccessConfig,
    cache: HandleCache<S>,
    picker: P,
    ids: G,
    enabled: AtomicBool,
}

impl<S, P> FsAccessStorage<S, P>
where
    S: HandleStore,
    P: FilePicker<Handle = S::Handle>,
{
    /// Creates an adapter that names new files with random UUIDs.
    pub fn new(config: FsAccessConfig, store: S, picker: P) -> Self {
        Self::with_ids(config, store, picker, UuidGenerator)
    }
}

impl<S, P, G> FsAccessStorage<S, P, G>
where
    S: HandleStore,
    P: FilePicker<Handle = S::Handle>,
    G: IdGenerator,
{
    /// Creates an adapter with a custom id source.
    pub fn with_ids(config: FsAccessConfig, store: S, picker: P, ids: G) -> Self {
        let cache = HandleCache::new(store, &config.cache_name, &config.store_name);
        let enabled = AtomicBool::new(config.enabled);
        Self {
            config,
            cache,
            picker,
            ids,
            enabled,
        }
    }

    /// Human-readable provider label.
    pub fn label(&self) -> &str {
        &self.config.label
    }

    /// Returns the id already assigned to the file behind `handle`, or a new
    /// one if the file has not been seen before.
    ///
    /// Cached handles are compared with [`FileHandle::is_same_entry`] in key
    /// order and the first match wins. A record whose comparison fails, for
    /// example because its file was deleted, is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`FsAccessError::Cache`] if the cache cannot be listed.
    pub async fn resolve_id_for_handle(&self, handle: &S::Handle) -> FsAccessResult<FileId> {
        for record in self.cache.list().await? {
            match handle.is_same_entry(&record.handle).await {
                Ok(true) => {
                    log::debug!("Found cached file handle ID {}", record.id);
                    return Ok(record.id);
                }
                Ok(false) => {}
                Err(err) => log::warn!("Skipping cached file handle {}: {err}", record.id),
            }
        }
        let id = self.ids.next_id();
        log::debug!("Generated new file handle ID {id}");
        Ok(id)
    }

    /// Asks for read/write access to `handle`.
    ///
    /// The current state is only logged; the request is always made because
    /// a previous grant may have been forgotten.
    async fn acquire_permission(
        &self,
        op: &str,
        path: &str,
        handle: &S::Handle,
    ) -> FsAccessResult<()> {
        match handle.query_permission(PermissionMode::ReadWrite).await {
            Ok(state) => log::debug!("[{op}] File handle state {state} {path}"),
            Err(err) => log::debug!("[{op}] File handle state unknown {path}: {err}"),
        }
        let state = handle
            .request_permission(PermissionMode::ReadWrite)
            .await
            .map_err(|err| match err.kind {
                HostErrorKind::NotFound => {
                    FsAccessError::from_host(path, "requesting permission for", err)
                }
                _ => FsAccessError::permission_denied(path, err.to_string()),
            })?;
        if state == PermissionState::Granted {
            Ok(())
        } else {
            log::error!("[{op}] Permission {state} {path}");
            Err(FsAccessError::permission_denied(
                path,
                format!("permission {state}"),
            ))
        }
    }

    async fn open_handle(&self, op: &str, path: &str) -> FsAccessResult<S::Handle> {
        let handle = self.cache.load(&FileId::from(path)).await?;
        self.acquire_permission(op, path, &handle).await?;
        Ok(handle)
    }

    async fn stat_file(&self, path: &str) -> FsAccessResult<FileStat> {
        let handle = self.open_handle("stat", path).await?;
        let file = handle
            .get_file()
            .await
            .map_err(|err| FsAccessError::from_host(path, "reading metadata of", err))?;
        Ok(FileStat {
            rev: file.last_modified(),
        })
    }

    async fn load_file(&self, path: &str) -> FsAccessResult<LoadedFile> {
        let stat = self.stat_file(path).await?;
        let handle = self.open_handle("load", path).await?;
        let file = handle
            .get_file()
            .await
            .map_err(|err| FsAccessError::from_host(path, "opening", err))?;
        let data = file
            .array_buffer()
            .await
            .map_err(|err| FsAccessError::from_host(path, "reading", err))?;
        Ok(LoadedFile { data, stat })
    }

    async fn save_file(
        &self,
        path: &str,
        data: &[u8],
        rev: Option<u64>,
    ) -> FsAccessResult<SaveOutcome> {
        if let Some(expected) = rev {
            let current = self.stat_file(path).await?;
            if current.rev != expected {
                log::debug!(
                    "Save conflict {path}: expected rev {expected}, found {}",
                    current.rev
                );
                return Err(FsAccessError::RevisionConflict { current });
            }
        }

        let handle = self.open_handle("save", path).await?;
        let mut stream = handle
            .create_writable()
            .await
            .map_err(|err| FsAccessError::from_host(path, "opening writable", err))?;
        stream
            .write(data)
            .await
            .map_err(|err| FsAccessError::from_host(path, "writing", err))?;
        stream
            .close()
            .await
            .map_err(|err| FsAccessError::from_host(path, "closing", err))?;

        let stat = self.stat_file(path).await?;
        // Some hosts hand out a new handle identity after a write.
        self.cache.save(&FileId::from(path), &handle).await?;
        Ok(SaveOutcome {
            rev: stat.rev,
            path: path.to_string(),
        })
    }

    async fn pick_file(&self) -> FsAccessResult<Vec<FileEntry>> {
        let handle = self
            .picker
            .pick_file(&self.config.file_type)
            .await
            .map_err(|err| match err.kind {
                HostErrorKind::Abort => FsAccessError::UserCancelled,
                _ => FsAccessError::Io {
                    context: "showing file picker".to_string(),
                    reason: err.to_string(),
                },
            })?
            .ok_or(FsAccessError::UserCancelled)?;

        let id = self.resolve_id_for_handle(&handle).await?;
        self.cache.save(&id, &handle).await?;
        Ok(vec![FileEntry {
            name: handle.name(),
            path: id.into(),
        }])
    }

    fn report<T>(op: &str, path: &str, ts: Stopwatch, result: &FsAccessResult<T>) {
        match result {
            Ok(_) => log::debug!("[{op}] Done {path} {ts}"),
            Err(err) => log::error!("[{op}] Failed {path}: {err} {ts}"),
        }
    }
}

impl<S, P, G> StorageProvider for FsAccessStorage<S, P, G>
where
    S: HandleStore,
    P: FilePicker<Handle = S::Handle>,
    G: IdGenerator,
{
    fn name(&self) -> &str {
        &self.config.name
    }

    fn icon(&self) -> &str {
        &self.config.icon
    }

    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn set_enabled(&self, enabled: bool) {
        log::debug!("Set enabled {enabled}");
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    async fn stat(&self, path: &str, _opts: &StorageOpts) -> FsAccessResult<FileStat> {
        log::debug!("Stat {path}");
        let ts = Stopwatch::start();
        let result = self.stat_file(path).await;
        Self::report("stat", path, ts, &result);
        result
    }

    async fn load(&self, path: &str, _opts: &StorageOpts) -> FsAccessResult<LoadedFile> {
        log::debug!("Load {path}");
        let ts = Stopwatch::start();
        let result = self.load_file(path).await;
        Self::report("load", path, ts, &result);
        result
    }

    async fn save(
        &self,
        path: &str,
        _opts: &StorageOpts,
        data: &[u8],
        rev: Option<u64>,
    ) -> FsAccessResult<SaveOutcome> {
        log::debug!("Save {path} ({} bytes)", data.len());
        let ts = Stopwatch::start();
        let result = self.save_file(path, data, rev).await;
        Self::report("save", path, ts, &result);
        result
    }

    async fn list(&self, _dir: Option<&str>) -> FsAccessResult<Vec<FileEntry>> {
        log::debug!("List");
        let ts = Stopwatch::start();
        let result = self.pick_file().await;
        Self::report("list", "", ts, &result);
        result
    }

    // The entry is gone once this resolves; closing the file in the UI is
    // left to the caller.
    async fn remove(&self, path: &str) -> FsAccessResult<()> {
        log::debug!("Remove {path}");
        let ts = Stopwatch::start();
        let result = self.cache.remove(&FileId::from(path)).await;
        Self::report("remove", path, ts, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{MemoryPlatform, SequentialIds, UserResponse};

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let platform = MemoryPlatform::new();
        let storage = platform.storage();
        let opts = StorageOpts::new();

        let err = storage.stat("missing", &opts).await.unwrap_err();
        assert!(matches!(err, FsAccessError::NotFound { ref path } if path == "missing"));
        let err = storage.load("missing", &opts).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
        let err = storage.save("missing", &opts, b"x", None).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn test_permission_is_requested_every_time() {
        let platform = MemoryPlatform::new();
        let storage = platform.storage();
        let handle = platform.disk.create_file("vault.kdbx", b"data");
        platform.picker.select(&handle);
        let path = storage.list(None).await.unwrap().remove(0).path;

        storage.stat(&path, &StorageOpts::new()).await.unwrap();
        platform.disk.revoke_permission(&handle);
        // The grant was forgotten; the next access prompts again and succeeds.
        storage.stat(&path, &StorageOpts::new()).await.unwrap();

        platform.disk.revoke_permission(&handle);
        platform.disk.set_user_response(&handle, UserResponse::Reject);
        let err = storage.stat(&path, &StorageOpts::new()).await.unwrap_err();
        assert_eq!(err.code(), "permission_denied");
    }

    #[tokio::test]
    async fn test_denied_state_is_permission_denied() {
        let platform = MemoryPlatform::new();
        let storage = platform.storage();
        let handle = platform.disk.create_file("vault.kdbx", b"data");
        platform.disk.set_user_response(&handle, UserResponse::Deny);
        platform.picker.select(&handle);
        let path = storage.list(None).await.unwrap().remove(0).path;

        let err = storage.load(&path, &StorageOpts::new()).await.unwrap_err();
        assert!(matches!(err, FsAccessError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn test_resolve_id_matches_by_identity() {
        let platform = MemoryPlatform::new();
        let storage = platform.storage_with(FsAccessConfig::default(), SequentialIds::new());
        let a = platform.disk.create_file("a.kdbx", b"");
        let b = platform.disk.create_file("b.kdbx", b"");

        let id_a = storage.resolve_id_for_handle(&a).await.unwrap();
        assert_eq!(id_a.as_str(), "file-1");
        storage.cache.save(&id_a, &a).await.unwrap();

        let again = platform.disk.reopen(&a);
        assert_eq!(storage.resolve_id_for_handle(&again).await.unwrap(), id_a);
        assert_eq!(storage.resolve_id_for_handle(&again).await.unwrap(), id_a);
        assert_eq!(
            storage.resolve_id_for_handle(&b).await.unwrap().as_str(),
            "file-2"
        );
    }

    #[tokio::test]
    async fn test_set_enabled() {
        let platform = MemoryPlatform::new();
        let storage = platform.storage();
        assert!(storage.enabled());
        storage.set_enabled(false);
        assert!(!storage.enabled());
        assert_eq!(storage.name(), "fsaccess");
        assert_eq!(storage.icon(), "hdd");
        assert_eq!(storage.label(), "FS Access");
    }
}
