//! Platform implementations of the host capabilities.
//!
//! The adapter itself only depends on the traits in [`crate::host`] and
//! [`crate::cache`]. Each environment provides its own implementations:
//!
//! - **Browser (WASM)**: `FileSystemFileHandle`, `showOpenFilePicker` and an
//!   `IndexedDB` handle store, in the `fsaccess-wasm` crate.
//! - **Tests**: the in-memory implementations in [`memory`].

pub mod memory;

pub use memory::MemoryPlatform;
