//! WebAssembly bindings for `fsaccess_core`.
//!
//! Exposes the File System Access storage provider to the browser as a
//! `wasm-bindgen` class whose operations return promises. Handles are kept
//! in IndexedDB and files are chosen with `showOpenFilePicker`.

#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::future_not_send)]

mod bridge;
pub mod handle;
pub mod idb;

use std::rc::Rc;
use std::sync::Arc;

use fsaccess_core::logger::{LogLevel, Logger};
use fsaccess_core::{FsAccessConfig, FsAccessError, StorageOpts, StorageProvider};
use js_sys::{Function, Object, Promise, Reflect, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

pub use handle::{BrowserFile, BrowserFileHandle, BrowserPicker, BrowserWritable};
pub use idb::{IdbHandleDb, IdbHandleStore};

type CoreStorage = fsaccess_core::FsAccessStorage<IdbHandleStore, BrowserPicker>;

/// Storage provider for local files opened through the File System Access API.
#[wasm_bindgen]
pub struct FsAccessStorage(Rc<CoreStorage>);

#[wasm_bindgen]
impl FsAccessStorage {
    /// Creates the provider from an optional JSON config.
    ///
    /// # Errors
    /// Throws when the config cannot be parsed.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<Self, JsValue> {
        let config = match config_json {
            Some(json) => FsAccessConfig::from_json(&json).map_err(|err| error_to_jsvalue(&err))?,
            None => FsAccessConfig::default(),
        };
        Ok(Self(Rc::new(CoreStorage::new(
            config,
            IdbHandleStore,
            BrowserPicker,
        ))))
    }

    /// Registry key of the provider.
    #[must_use]
    #[wasm_bindgen(getter)]
    pub fn name(&self) -> String {
        self.0.name().to_owned()
    }

    /// Icon name shown in the UI.
    #[must_use]
    #[wasm_bindgen(getter)]
    pub fn icon(&self) -> String {
        self.0.icon().to_owned()
    }

    /// Human-readable provider label.
    #[must_use]
    #[wasm_bindgen(getter)]
    pub fn label(&self) -> String {
        self.0.label().to_owned()
    }

    /// Whether the provider is enabled.
    #[must_use]
    #[wasm_bindgen(getter)]
    pub fn enabled(&self) -> bool {
        self.0.enabled()
    }

    /// Enables or disables the provider.
    #[wasm_bindgen(js_name = setEnabled)]
    pub fn set_enabled(&self, enabled: bool) {
        self.0.set_enabled(enabled);
    }

    /// Resolves to `{ rev }` for the file at `path`.
    ///
    /// # Errors
    /// Returns a rejected promise carrying the error `code`.
    pub fn stat(&self, path: String, opts: JsValue) -> Promise {
        let storage = Rc::clone(&self.0);
        future_to_promise(async move {
            let stat = storage
                .stat(&path, &storage_opts(&opts))
                .await
                .map_err(|err| error_to_jsvalue(&err))?;
            to_js(&stat)
        })
    }

    /// Resolves to `{ data, stat }` where `data` is a `Uint8Array`.
    ///
    /// # Errors
    /// Returns a rejected promise carrying the error `code`.
    pub fn load(&self, path: String, opts: JsValue) -> Promise {
        let storage = Rc::clone(&self.0);
        future_to_promise(async move {
            let loaded = storage
                .load(&path, &storage_opts(&opts))
                .await
                .map_err(|err| error_to_jsvalue(&err))?;
            let result = Object::new();
            Reflect::set(
                &result,
                &JsValue::from_str("data"),
                &Uint8Array::from(loaded.data.as_slice()),
            )?;
            Reflect::set(&result, &JsValue::from_str("stat"), &to_js(&loaded.stat)?)?;
            Ok(result.into())
        })
    }

    /// Writes `data` to `path` and resolves to `{ rev, path }`.
    ///
    /// When `rev` is given and the file has changed since, the promise
    /// rejects with `revConflict: true` and the current `rev`.
    ///
    /// # Errors
    /// Returns a rejected promise carrying the error `code`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn save(&self, path: String, opts: JsValue, data: Vec<u8>, rev: Option<f64>) -> Promise {
        let storage = Rc::clone(&self.0);
        let rev = rev.map(|rev| rev.max(0.0) as u64);
        future_to_promise(async move {
            let saved = storage
                .save(&path, &storage_opts(&opts), &data, rev)
                .await
                .map_err(|err| error_to_jsvalue(&err))?;
            to_js(&saved)
        })
    }

    /// Shows the file picker and resolves to `[{ name, path }]`.
    ///
    /// # Errors
    /// Returns a rejected promise with code `user_cancelled` when the
    /// picker is dismissed.
    pub fn list(&self, dir: Option<String>) -> Promise {
        let storage = Rc::clone(&self.0);
        future_to_promise(async move {
            let entries = storage
                .list(dir.as_deref())
                .await
                .map_err(|err| error_to_jsvalue(&err))?;
            to_js(&entries)
        })
    }

    /// Forgets the cached handle for `path`.
    ///
    /// # Errors
    /// Returns a rejected promise carrying the error `code`.
    pub fn remove(&self, path: String) -> Promise {
        let storage = Rc::clone(&self.0);
        future_to_promise(async move {
            storage
                .remove(&path)
                .await
                .map_err(|err| error_to_jsvalue(&err))?;
            Ok(JsValue::UNDEFINED)
        })
    }
}

/// Routes adapter diagnostics to `sink(level, message)`, or to the console
/// when `sink` is omitted.
#[wasm_bindgen(js_name = setLogger)]
pub fn set_logger(sink: Option<Function>) {
    bridge::set_log_sink(&sink.map_or(JsValue::NULL, JsValue::from));
    fsaccess_core::logger::set_logger(Arc::new(ConsoleLogger));
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, level: LogLevel, message: String) {
        bridge::log_message(level.as_str(), &message);
    }
}

fn storage_opts(opts: &JsValue) -> StorageOpts {
    if !opts.is_object() {
        return StorageOpts::new();
    }
    serde_wasm_bindgen::from_value(opts.clone()).unwrap_or_else(|err| {
        log::warn!("Ignoring unreadable storage options: {err}");
        StorageOpts::new()
    })
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(JsValue::from)
}

fn error_to_jsvalue(error: &FsAccessError) -> JsValue {
    let js_error = js_sys::Error::new(&error.to_string());
    if let Err(err) = annotate_error(&js_error, error) {
        log::warn!("Could not attach error fields: {err:?}");
    }
    js_error.into()
}

#[allow(clippy::cast_precision_loss)]
fn annotate_error(js_error: &js_sys::Error, error: &FsAccessError) -> Result<(), JsValue> {
    Reflect::set(
        js_error,
        &JsValue::from_str("code"),
        &JsValue::from_str(error.code()),
    )?;
    if let Some(stat) = error.conflict_stat() {
        Reflect::set(js_error, &JsValue::from_str("revConflict"), &JsValue::TRUE)?;
        Reflect::set(
            js_error,
            &JsValue::from_str("rev"),
            &JsValue::from_f64(stat.rev as f64),
        )?;
    }
    Ok(())
}

#[wasm_bindgen(typescript_custom_section)]
const TYPESCRIPT_DEFS: &str = r#"
export type FsAccessErrorCode =
    | "not_found"
    | "permission_denied"
    | "io"
    | "rev_conflict"
    | "user_cancelled"
    | "cache"
    | "config";

export interface FsAccessError extends Error {
    code: FsAccessErrorCode;
    revConflict?: true;
    rev?: number;
}

export interface FileStat {
    rev: number;
}

export interface LoadedFile {
    data: Uint8Array;
    stat: FileStat;
}

export interface SaveOutcome {
    rev: number;
    path: string;
}

export interface FileEntry {
    name: string;
    path: string;
}

"#;
