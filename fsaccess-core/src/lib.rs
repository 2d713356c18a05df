//! Storage adapter for password databases opened through the browser File
//! System Access API.
//!
//! The adapter implements the generic [`StorageProvider`] contract on top of
//! a persistent [`HandleCache`] that maps stable [`FileId`]s to the opaque
//! file handles granted by the host. Host capabilities are abstracted behind
//! the traits in [`host`] and [`cache`], so the same protocol runs against
//! the browser (see the `fsaccess-wasm` crate) and the in-memory platform
//! used in tests.
//!
//! ```
//! use fsaccess_core::platform::MemoryPlatform;
//! use fsaccess_core::{StorageOpts, StorageProvider};
//!
//! # tokio_test_block_on(async {
//! let platform = MemoryPlatform::new();
//! let storage = platform.storage();
//! platform.picker.select(&platform.disk.create_file("vault.kdbx", b"kdbx"));
//!
//! let listed = storage.list(None).await.unwrap();
//! let loaded = storage.load(&listed[0].path, &StorageOpts::new()).await.unwrap();
//! assert_eq!(loaded.data, b"kdbx");
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
// Browser handles are not `Send`; futures are driven on a single thread.
#![allow(clippy::future_not_send)]

pub mod cache;
pub mod config;
pub mod error;
pub mod host;
pub mod ids;
pub mod logger;
pub mod platform;
pub mod storage;

mod fsaccess;

pub use cache::{HandleCache, HandleDb, HandleRecord, HandleStore};
pub use config::{FileTypeFilter, FsAccessConfig};
pub use error::{FsAccessError, FsAccessResult, HostError, HostErrorKind, HostResult};
pub use fsaccess::FsAccessStorage;
pub use ids::{FileId, IdGenerator, UuidGenerator};
pub use storage::{FileEntry, FileStat, LoadedFile, SaveOutcome, StorageOpts, StorageProvider};
