//! Host capability interfaces.
//!
//! These traits describe what the adapter needs from the environment it runs
//! in. In a browser they are backed by the File System Access API
//! (`FileSystemFileHandle`, `showOpenFilePicker`); tests use the in-memory
//! implementations in [`crate::platform::memory`].
//!
//! Handles are opaque: the only way to tell whether two handles refer to the
//! same file is [`FileHandle::is_same_entry`]. Permission grants are owned by
//! the host and may be revoked at any time, so callers must not remember a
//! previous answer.
//!
//! Futures returned by these traits are not required to be `Send`; browser
//! handles live on a single thread.
#![allow(async_fn_in_trait)]

use strum::{Display, EnumString};

use crate::config::FileTypeFilter;
use crate::error::HostResult;

/// Access mode passed to permission queries and requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PermissionMode {
    /// Read-only access.
    Read,
    /// Read and write access.
    ReadWrite,
}

/// Permission state reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PermissionState {
    /// Access is granted.
    Granted,
    /// Access was refused.
    Denied,
    /// The host will ask the user on the next request.
    Prompt,
}

/// A reference to an on-disk file granted by the host.
pub trait FileHandle: Clone {
    /// File contents obtained from [`FileHandle::get_file`].
    type File: HostFile;
    /// Stream obtained from [`FileHandle::create_writable`].
    type Writable: WritableFile;

    /// File name as shown to the user.
    fn name(&self) -> String;

    /// Whether `other` refers to the same underlying file.
    async fn is_same_entry(&self, other: &Self) -> HostResult<bool>;

    /// Reports the current permission state without prompting.
    async fn query_permission(&self, mode: PermissionMode) -> HostResult<PermissionState>;

    /// Requests permission, prompting the user if the host decides to.
    async fn request_permission(&self, mode: PermissionMode) -> HostResult<PermissionState>;

    /// Opens the file for reading.
    async fn get_file(&self) -> HostResult<Self::File>;

    /// Opens a stream that replaces the file contents on close.
    async fn create_writable(&self) -> HostResult<Self::Writable>;
}

/// A file snapshot obtained from a handle.
pub trait HostFile {
    /// Last modification time in milliseconds since the Unix epoch.
    fn last_modified(&self) -> u64;

    /// Reads the whole file.
    async fn array_buffer(&self) -> HostResult<Vec<u8>>;
}

/// A writable stream over a file.
///
/// Written data becomes visible in the file only once [`WritableFile::close`]
/// resolves.
pub trait WritableFile {
    /// Appends `data` to the pending contents.
    async fn write(&mut self, data: &[u8]) -> HostResult<()>;

    /// Commits the pending contents.
    async fn close(self) -> HostResult<()>;
}

/// Interactive single-file picker.
pub trait FilePicker {
    /// Handle type produced by the picker.
    type Handle: FileHandle;

    /// Asks the user to choose one file matching `filter`.
    ///
    /// Returns `Ok(None)` if the user dismissed the picker.
    async fn pick_file(&self, filter: &FileTypeFilter) -> HostResult<Option<Self::Handle>>;
}
