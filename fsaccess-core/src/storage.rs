//! The generic storage contract implemented by storage providers.
#![allow(async_fn_in_trait)]

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FsAccessResult;

/// Revision snapshot of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileStat {
    /// Last modification time in milliseconds, used as the revision token.
    pub rev: u64,
}

/// File contents together with the stat taken before reading them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    /// Full file contents.
    pub data: Vec<u8>,
    /// Stat captured before the read started.
    pub stat: FileStat,
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    /// Revision after the write.
    pub rev: u64,
    /// Path the file was saved under.
    pub path: String,
}

/// One item of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Display name of the file.
    pub name: String,
    /// Path to pass to the other operations.
    pub path: String,
}

/// Per-call options passed through by the storage registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageOpts(Map<String, Value>);

impl StorageOpts {
    /// Empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up an option by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl From<Map<String, Value>> for StorageOpts {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Operations every storage provider exposes to the registry.
pub trait StorageProvider {
    /// Registry key of the provider.
    fn name(&self) -> &str;

    /// Icon name shown in the UI.
    fn icon(&self) -> &str;

    /// Whether the provider is enabled.
    fn enabled(&self) -> bool;

    /// Enables or disables the provider.
    fn set_enabled(&self, enabled: bool);

    /// Returns the current revision of `path`.
    async fn stat(&self, path: &str, opts: &StorageOpts) -> FsAccessResult<FileStat>;

    /// Reads the full contents of `path`.
    async fn load(&self, path: &str, opts: &StorageOpts) -> FsAccessResult<LoadedFile>;

    /// Replaces the contents of `path`.
    ///
    /// When `rev` is given the write only happens if the file is still at
    /// that revision.
    async fn save(
        &self,
        path: &str,
        opts: &StorageOpts,
        data: &[u8],
        rev: Option<u64>,
    ) -> FsAccessResult<SaveOutcome>;

    /// Lists files available to open. `dir` is a provider-specific hint.
    async fn list(&self, dir: Option<&str>) -> FsAccessResult<Vec<FileEntry>>;

    /// Forgets `path`.
    async fn remove(&self, path: &str) -> FsAccessResult<()>;
}
