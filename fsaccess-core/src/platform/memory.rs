//! In-memory implementations of the host capabilities for testing.
//!
//! These implementations emulate the browser closely enough to exercise the
//! adapter's permission and revision protocol: handles are only readable or
//! writable after a granted permission request, grants can be revoked at any
//! time, and every committed write stamps the file with the disk clock.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cache::{HandleDb, HandleStore};
use crate::config::{FileTypeFilter, FsAccessConfig};
use crate::error::{HostError, HostErrorKind, HostResult};
use crate::host::{FileHandle, FilePicker, HostFile, PermissionMode, PermissionState, WritableFile};
use crate::ids::{FileId, IdGenerator, UuidGenerator};
use crate::FsAccessStorage;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Memory Disk
// =============================================================================

/// How the simulated user answers a permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserResponse {
    /// Accept the prompt.
    Grant,
    /// Dismiss the prompt; the request rejects with `NotAllowedError`.
    Reject,
    /// Block the site; the request resolves to `denied`.
    Deny,
}

struct DiskEntry {
    name: String,
    bytes: Vec<u8>,
    last_modified: u64,
    permission: PermissionState,
    response: UserResponse,
}

struct DiskState {
    entries: HashMap<u64, DiskEntry>,
    next_entry: u64,
    next_instance: u64,
    now: u64,
    tick: u64,
    fail_writes: bool,
    write_count: u64,
}

impl DiskState {
    fn stamp(&mut self) -> u64 {
        let stamp = self.now;
        self.now += self.tick;
        stamp
    }

    fn entry(&self, entry: u64) -> HostResult<&DiskEntry> {
        self.entries
            .get(&entry)
            .ok_or_else(|| HostError::new(HostErrorKind::NotFound, "file no longer exists"))
    }

    fn entry_mut(&mut self, entry: u64) -> HostResult<&mut DiskEntry> {
        self.entries
            .get_mut(&entry)
            .ok_or_else(|| HostError::new(HostErrorKind::NotFound, "file no longer exists"))
    }

    fn require_granted(&self, entry: u64) -> HostResult<()> {
        match self.entry(entry)?.permission {
            PermissionState::Granted => Ok(()),
            _ => Err(HostError::new(
                HostErrorKind::NotAllowed,
                "permission not granted",
            )),
        }
    }
}

/// A simulated local disk shared by all handles created from it.
///
/// Cloning yields another view of the same disk.
#[derive(Clone)]
pub struct MemoryDisk {
    state: Arc<Mutex<DiskState>>,
}

impl MemoryDisk {
    /// Starting value of the disk clock, in milliseconds.
    pub const EPOCH_MS: u64 = 1_700_000_000_000;

    /// Creates an empty disk whose clock advances 1ms per write.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DiskState {
                entries: HashMap::new(),
                next_entry: 0,
                next_instance: 0,
                now: Self::EPOCH_MS,
                tick: 1,
                fail_writes: false,
                write_count: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, DiskState> {
        lock(&self.state)
    }

    fn new_handle(&self, entry: u64) -> MemoryFileHandle {
        let mut state = self.state();
        let instance = state.next_instance;
        state.next_instance += 1;
        MemoryFileHandle {
            disk: self.clone(),
            entry,
            instance,
        }
    }

    /// Creates a file and returns a handle to it. Permission starts at
    /// `prompt` and the user grants it when asked.
    pub fn create_file(&self, name: &str, bytes: &[u8]) -> MemoryFileHandle {
        let entry = {
            let mut state = self.state();
            let entry = state.next_entry;
            state.next_entry += 1;
            let last_modified = state.stamp();
            state.entries.insert(
                entry,
                DiskEntry {
                    name: name.to_string(),
                    bytes: bytes.to_vec(),
                    last_modified,
                    permission: PermissionState::Prompt,
                    response: UserResponse::Grant,
                },
            );
            entry
        };
        self.new_handle(entry)
    }

    /// A fresh handle object for the same file, as produced when the user
    /// picks the file again.
    #[must_use]
    pub fn reopen(&self, handle: &MemoryFileHandle) -> MemoryFileHandle {
        self.new_handle(handle.entry)
    }

    /// Sets the disk clock.
    pub fn set_time(&self, now_ms: u64) {
        self.state().now = now_ms;
    }

    /// Sets how far the clock advances on each write. Zero freezes it.
    pub fn set_tick(&self, tick_ms: u64) {
        self.state().tick = tick_ms;
    }

    /// Current contents of the file, if it still exists.
    #[must_use]
    pub fn contents(&self, handle: &MemoryFileHandle) -> Option<Vec<u8>> {
        self.state()
            .entries
            .get(&handle.entry)
            .map(|entry| entry.bytes.clone())
    }

    /// Last modification time of the file, if it still exists.
    #[must_use]
    pub fn last_modified(&self, handle: &MemoryFileHandle) -> Option<u64> {
        self.state()
            .entries
            .get(&handle.entry)
            .map(|entry| entry.last_modified)
    }

    /// Replaces the file contents behind the adapter's back.
    pub fn modify_externally(&self, handle: &MemoryFileHandle, bytes: &[u8]) {
        let mut state = self.state();
        let stamp = state.stamp();
        if let Some(entry) = state.entries.get_mut(&handle.entry) {
            entry.bytes = bytes.to_vec();
            entry.last_modified = stamp;
        }
    }

    /// Deletes the file from disk. Cached handles keep pointing at it.
    pub fn delete_file(&self, handle: &MemoryFileHandle) {
        self.state().entries.remove(&handle.entry);
    }

    /// Forgets any granted permission, as browsers do between sessions.
    pub fn revoke_permission(&self, handle: &MemoryFileHandle) {
        if let Some(entry) = self.state().entries.get_mut(&handle.entry) {
            entry.permission = PermissionState::Prompt;
        }
    }

    /// Sets how the user answers future permission prompts for the file.
    pub fn set_user_response(&self, handle: &MemoryFileHandle, response: UserResponse) {
        if let Some(entry) = self.state().entries.get_mut(&handle.entry) {
            entry.response = response;
        }
    }

    /// Makes every subsequent stream write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// Number of committed stream writes.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.state().write_count
    }
}

impl Default for MemoryDisk {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Memory File Handle
// =============================================================================

/// Handle to a file on a [`MemoryDisk`].
///
/// Two handles are the same entry when they point at the same file, even if
/// they are different handle objects.
#[derive(Clone)]
pub struct MemoryFileHandle {
    disk: MemoryDisk,
    entry: u64,
    instance: u64,
}

impl MemoryFileHandle {
    /// Distinguishes handle objects that refer to the same file.
    #[must_use]
    pub const fn instance(&self) -> u64 {
        self.instance
    }
}

impl std::fmt::Debug for MemoryFileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryFileHandle")
            .field("entry", &self.entry)
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}

/// Snapshot returned by [`MemoryFileHandle::get_file`].
#[derive(Debug, Clone)]
pub struct MemoryFile {
    last_modified: u64,
    bytes: Vec<u8>,
}

impl HostFile for MemoryFile {
    fn last_modified(&self) -> u64 {
        self.last_modified
    }

    async fn array_buffer(&self) -> HostResult<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}

/// Writable stream returned by [`MemoryFileHandle::create_writable`].
pub struct MemoryWritable {
    disk: MemoryDisk,
    entry: u64,
    pending: Vec<u8>,
}

impl WritableFile for MemoryWritable {
    async fn write(&mut self, data: &[u8]) -> HostResult<()> {
        if self.disk.state().fail_writes {
            return Err(HostError::new(HostErrorKind::Other, "disk full"));
        }
        self.pending.extend_from_slice(data);
        Ok(())
    }

    async fn close(self) -> HostResult<()> {
        let mut state = self.disk.state();
        state.entry(self.entry)?;
        let stamp = state.stamp();
        state.write_count += 1;
        let entry = state.entry_mut(self.entry)?;
        entry.bytes = self.pending;
        entry.last_modified = stamp;
        Ok(())
    }
}

impl FileHandle for MemoryFileHandle {
    type File = MemoryFile;
    type Writable = MemoryWritable;

    fn name(&self) -> String {
        self.disk
            .state()
            .entries
            .get(&self.entry)
            .map(|entry| entry.name.clone())
            .unwrap_or_default()
    }

    async fn is_same_entry(&self, other: &Self) -> HostResult<bool> {
        if !Arc::ptr_eq(&self.disk.state, &other.disk.state) {
            return Ok(false);
        }
        let state = self.disk.state();
        state.entry(self.entry)?;
        state.entry(other.entry)?;
        Ok(self.entry == other.entry)
    }

    async fn query_permission(&self, _mode: PermissionMode) -> HostResult<PermissionState> {
        Ok(self.disk.state().entry(self.entry)?.permission)
    }

    async fn request_permission(&self, _mode: PermissionMode) -> HostResult<PermissionState> {
        let mut state = self.disk.state();
        let entry = state.entry_mut(self.entry)?;
        if entry.permission == PermissionState::Granted {
            return Ok(PermissionState::Granted);
        }
        match entry.response {
            UserResponse::Grant => {
                entry.permission = PermissionState::Granted;
                Ok(PermissionState::Granted)
            }
            UserResponse::Deny => {
                entry.permission = PermissionState::Denied;
                Ok(PermissionState::Denied)
            }
            UserResponse::Reject => Err(HostError::new(
                HostErrorKind::NotAllowed,
                "user dismissed the permission prompt",
            )),
        }
    }

    async fn get_file(&self) -> HostResult<MemoryFile> {
        let state = self.disk.state();
        state.require_granted(self.entry)?;
        let entry = state.entry(self.entry)?;
        Ok(MemoryFile {
            last_modified: entry.last_modified,
            bytes: entry.bytes.clone(),
        })
    }

    async fn create_writable(&self) -> HostResult<MemoryWritable> {
        self.disk.state().require_granted(self.entry)?;
        Ok(MemoryWritable {
            disk: self.disk.clone(),
            entry: self.entry,
            pending: Vec::new(),
        })
    }
}

// =============================================================================
// Memory Handle Store
// =============================================================================

struct StoreState<H> {
    stores: HashMap<(String, String), BTreeMap<FileId, H>>,
    open_count: usize,
    put_count: usize,
    failing_opens: usize,
    failing: bool,
}

/// In-memory stand-in for the persistent handle database.
///
/// Cloning yields another view of the same databases, so a test can keep a
/// clone to inspect what the adapter persisted.
pub struct MemoryHandleStore<H = MemoryFileHandle> {
    state: Arc<Mutex<StoreState<H>>>,
}

impl<H> Clone for MemoryHandleStore<H> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<H: Clone> MemoryHandleStore<H> {
    /// Creates a store with no databases.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState {
                stores: HashMap::new(),
                open_count: 0,
                put_count: 0,
                failing_opens: 0,
                failing: false,
            })),
        }
    }

    /// Number of successful opens.
    #[must_use]
    pub fn open_count(&self) -> usize {
        lock(&self.state).open_count
    }

    /// Number of successful record writes across all databases.
    #[must_use]
    pub fn put_count(&self) -> usize {
        lock(&self.state).put_count
    }

    /// Makes the next `count` opens fail.
    pub fn fail_next_opens(&self, count: usize) {
        lock(&self.state).failing_opens = count;
    }

    /// Makes every record operation fail while set.
    pub fn set_failing(&self, failing: bool) {
        lock(&self.state).failing = failing;
    }

    /// Keys persisted in `store_name` of `db_name`.
    #[must_use]
    pub fn keys(&self, db_name: &str, store_name: &str) -> Vec<FileId> {
        lock(&self.state)
            .stores
            .get(&(db_name.to_string(), store_name.to_string()))
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl<H: Clone> Default for MemoryHandleStore<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// An opened [`MemoryHandleStore`] database.
pub struct MemoryHandleDb<H> {
    state: Arc<Mutex<StoreState<H>>>,
    key: (String, String),
}

impl<H: Clone> MemoryHandleDb<H> {
    fn with_records<R>(
        &self,
        f: impl FnOnce(&mut BTreeMap<FileId, H>) -> R,
    ) -> HostResult<R> {
        let mut state = lock(&self.state);
        if state.failing {
            return Err(HostError::new(
                HostErrorKind::InvalidState,
                "transaction aborted",
            ));
        }
        Ok(f(state.stores.entry(self.key.clone()).or_default()))
    }
}

impl<H: FileHandle> HandleStore for MemoryHandleStore<H> {
    type Handle = H;
    type Db = MemoryHandleDb<H>;

    async fn open(&self, db_name: &str, store_name: &str) -> HostResult<MemoryHandleDb<H>> {
        let mut state = lock(&self.state);
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(HostError::new(HostErrorKind::Other, "database blocked"));
        }
        state.open_count += 1;
        let key = (db_name.to_string(), store_name.to_string());
        state.stores.entry(key.clone()).or_default();
        Ok(MemoryHandleDb {
            state: Arc::clone(&self.state),
            key,
        })
    }
}

impl<H: FileHandle> HandleDb for MemoryHandleDb<H> {
    type Handle = H;

    async fn entries(&self) -> HostResult<Vec<(FileId, H)>> {
        self.with_records(|records| {
            records
                .iter()
                .map(|(id, handle)| (id.clone(), handle.clone()))
                .collect()
        })
    }

    async fn get(&self, id: &FileId) -> HostResult<Option<H>> {
        self.with_records(|records| records.get(id).cloned())
    }

    async fn put(&self, id: &FileId, handle: &H) -> HostResult<()> {
        self.with_records(|records| {
            records.insert(id.clone(), handle.clone());
        })?;
        lock(&self.state).put_count += 1;
        Ok(())
    }

    async fn delete(&self, id: &FileId) -> HostResult<()> {
        self.with_records(|records| {
            records.remove(id);
        })
    }
}

// =============================================================================
// Memory Picker
// =============================================================================

/// What the simulated user does when the picker opens.
#[derive(Debug, Clone)]
pub enum PickerResponse {
    /// Choose this file.
    Select(MemoryFileHandle),
    /// Dismiss the picker.
    Cancel,
    /// The picker itself fails.
    Fail(HostError),
}

#[derive(Default)]
struct PickerState {
    responses: VecDeque<PickerResponse>,
    filters: Vec<FileTypeFilter>,
}

/// Scripted file picker. With no queued response the user cancels.
#[derive(Clone, Default)]
pub struct MemoryPicker {
    state: Arc<Mutex<PickerState>>,
}

impl MemoryPicker {
    /// Creates a picker with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for the next pick.
    pub fn push(&self, response: PickerResponse) {
        lock(&self.state).responses.push_back(response);
    }

    /// Queues selection of `handle`.
    pub fn select(&self, handle: &MemoryFileHandle) {
        self.push(PickerResponse::Select(handle.clone()));
    }

    /// Filter passed to the most recent pick.
    #[must_use]
    pub fn last_filter(&self) -> Option<FileTypeFilter> {
        lock(&self.state).filters.last().cloned()
    }

    /// Number of times the picker was shown.
    #[must_use]
    pub fn shown(&self) -> usize {
        lock(&self.state).filters.len()
    }
}

impl FilePicker for MemoryPicker {
    type Handle = MemoryFileHandle;

    async fn pick_file(&self, filter: &FileTypeFilter) -> HostResult<Option<MemoryFileHandle>> {
        let response = {
            let mut state = lock(&self.state);
            state.filters.push(filter.clone());
            state.responses.pop_front()
        };
        match response {
            Some(PickerResponse::Select(handle)) => {
                if filter.matches(&handle.name()) {
                    Ok(Some(handle))
                } else {
                    Err(HostError::new(
                        HostErrorKind::Other,
                        format!("{} is not an accepted file type", handle.name()),
                    ))
                }
            }
            Some(PickerResponse::Fail(err)) => Err(err),
            Some(PickerResponse::Cancel) | None => Ok(None),
        }
    }
}

// =============================================================================
// Sequential Ids
// =============================================================================

/// Deterministic ids `file-1`, `file-2`, ...
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    /// Starts counting at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> FileId {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        FileId::new(format!("file-{n}"))
    }
}

// =============================================================================
// Memory Platform Bundle
// =============================================================================

/// Combines the in-memory implementations for easy test setup.
///
/// # Example
///
/// ```
/// use fsaccess_core::platform::memory::MemoryPlatform;
///
/// let platform = MemoryPlatform::new();
/// let storage = platform.storage();
/// let handle = platform.disk.create_file("vault.kdbx", b"data");
/// platform.picker.select(&handle);
/// ```
#[derive(Clone, Default)]
pub struct MemoryPlatform {
    /// Simulated disk.
    pub disk: MemoryDisk,
    /// Simulated handle database.
    pub store: MemoryHandleStore,
    /// Scripted picker.
    pub picker: MemoryPicker,
}

impl MemoryPlatform {
    /// Creates an empty platform.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An adapter over this platform with the default config and UUID ids.
    #[must_use]
    pub fn storage(&self) -> FsAccessStorage<MemoryHandleStore, MemoryPicker> {
        self.storage_with(FsAccessConfig::default(), UuidGenerator)
    }

    /// An adapter over this platform with a custom config and id source.
    pub fn storage_with<G: IdGenerator>(
        &self,
        config: FsAccessConfig,
        ids: G,
    ) -> FsAccessStorage<MemoryHandleStore, MemoryPicker, G> {
        FsAccessStorage::with_ids(config, self.store.clone(), self.picker.clone(), ids)
    }

    /// Keys persisted under the default database and store names.
    #[must_use]
    pub fn cached_ids(&self) -> Vec<FileId> {
        let config = FsAccessConfig::default();
        self.store.keys(&config.cache_name, &config.store_name)
    }
}

// =============================================================================
// Tests
// =============================================================================
