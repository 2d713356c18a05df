//! JavaScript glue for IndexedDB, file handles and the file picker.
//!
//! Every call that can fail is an `async` JS function, so failures always
//! arrive as rejected promises and never as synchronous exceptions.

use fsaccess_core::{HostError, HostErrorKind, HostResult};
use js_sys::{Array, Promise, Reflect, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

#[wasm_bindgen(inline_js = r#"
function request(req) {
  return new Promise((resolve, reject) => {
    req.onsuccess = () => resolve(req.result);
    req.onerror = () => reject(req.error);
  });
}

function done(tx) {
  return new Promise((resolve, reject) => {
    tx.oncomplete = () => resolve();
    tx.onerror = () => reject(tx.error);
    tx.onabort = () =>
      reject(tx.error ?? new DOMException("Transaction aborted", "AbortError"));
  });
}

function openDb(name, version, storeName) {
  return new Promise((resolve, reject) => {
    const req =
      version === undefined ? indexedDB.open(name) : indexedDB.open(name, version);
    req.onupgradeneeded = () => {
      const db = req.result;
      if (!db.objectStoreNames.contains(storeName)) {
        db.createObjectStore(storeName);
      }
    };
    req.onsuccess = () => {
      const db = req.result;
      db.onversionchange = () => db.close();
      resolve(db);
    };
    req.onerror = () => reject(req.error);
  });
}

export async function fsaOpenDb(name, storeName) {
  const db = await openDb(name, undefined, storeName);
  if (db.objectStoreNames.contains(storeName)) {
    return db;
  }
  const version = db.version + 1;
  db.close();
  return await openDb(name, version, storeName);
}

export async function fsaEntries(db, storeName) {
  const store = db.transaction(storeName, "readonly").objectStore(storeName);
  const [keys, values] = await Promise.all([
    request(store.getAllKeys()),
    request(store.getAll()),
  ]);
  return keys.map((key, i) => [String(key), values[i]]);
}

export async function fsaGet(db, storeName, key) {
  const store = db.transaction(storeName, "readonly").objectStore(storeName);
  return (await request(store.get(key))) ?? null;
}

export async function fsaPut(db, storeName, key, value) {
  const tx = db.transaction(storeName, "readwrite");
  tx.objectStore(storeName).put(value, key);
  await done(tx);
}

export async function fsaDelete(db, storeName, key) {
  const tx = db.transaction(storeName, "readwrite");
  tx.objectStore(storeName).delete(key);
  await done(tx);
}

export async function fsaIsSameEntry(a, b) {
  return await a.isSameEntry(b);
}

export async function fsaQueryPermission(handle, mode) {
  return await handle.queryPermission({ mode });
}

export async function fsaRequestPermission(handle, mode) {
  return await handle.requestPermission({ mode });
}

export async function fsaGetFile(handle) {
  return await handle.getFile();
}

export async function fsaReadFile(file) {
  return new Uint8Array(await file.arrayBuffer());
}

export async function fsaCreateWritable(handle) {
  return await handle.createWritable();
}

export async function fsaWrite(stream, data) {
  await stream.write(data);
}

export async function fsaClose(stream) {
  await stream.close();
}

export async function fsaPickFile(description, mimeType, extensions) {
  const [handle] = await globalThis.showOpenFilePicker({
    multiple: false,
    types: [{ description, accept: { [mimeType]: extensions } }],
  });
  return handle ?? null;
}

let logSink = null;

export function fsaSetLogSink(sink) {
  logSink = typeof sink === "function" ? sink : null;
}

export function fsaLog(level, message) {
  if (logSink) {
    try {
      logSink(level, message);
    } catch (_) {}
    return;
  }
  const method = console[level] ?? console.log;
  method.call(console, `[fsaccess] ${message}`);
}
"#)]
extern "C" {
    #[wasm_bindgen(js_name = fsaOpenDb)]
    pub(crate) fn open_db(name: &str, store_name: &str) -> Promise;
    #[wasm_bindgen(js_name = fsaEntries)]
    pub(crate) fn entries(db: &JsValue, store_name: &str) -> Promise;
    #[wasm_bindgen(js_name = fsaGet)]
    pub(crate) fn get(db: &JsValue, store_name: &str, key: &str) -> Promise;
    #[wasm_bindgen(js_name = fsaPut)]
    pub(crate) fn put(db: &JsValue, store_name: &str, key: &str, value: &JsValue) -> Promise;
    #[wasm_bindgen(js_name = fsaDelete)]
    pub(crate) fn delete(db: &JsValue, store_name: &str, key: &str) -> Promise;

    #[wasm_bindgen(js_name = fsaIsSameEntry)]
    pub(crate) fn is_same_entry(a: &JsValue, b: &JsValue) -> Promise;
    #[wasm_bindgen(js_name = fsaQueryPermission)]
    pub(crate) fn query_permission(handle: &JsValue, mode: &str) -> Promise;
    #[wasm_bindgen(js_name = fsaRequestPermission)]
    pub(crate) fn request_permission(handle: &JsValue, mode: &str) -> Promise;
    #[wasm_bindgen(js_name = fsaGetFile)]
    pub(crate) fn get_file(handle: &JsValue) -> Promise;
    #[wasm_bindgen(js_name = fsaReadFile)]
    pub(crate) fn read_file(file: &JsValue) -> Promise;
    #[wasm_bindgen(js_name = fsaCreateWritable)]
    pub(crate) fn create_writable(handle: &JsValue) -> Promise;
    #[wasm_bindgen(js_name = fsaWrite)]
    pub(crate) fn write(stream: &JsValue, data: &Uint8Array) -> Promise;
    #[wasm_bindgen(js_name = fsaClose)]
    pub(crate) fn close(stream: &JsValue) -> Promise;

    #[wasm_bindgen(js_name = fsaPickFile)]
    pub(crate) fn pick_file(description: &str, mime_type: &str, extensions: &Array) -> Promise;

    #[wasm_bindgen(js_name = fsaSetLogSink)]
    pub(crate) fn set_log_sink(sink: &JsValue);
    #[wasm_bindgen(js_name = fsaLog)]
    pub(crate) fn log_message(level: &str, message: &str);
}

/// Awaits a bridge promise, classifying a rejection as a [`HostError`].
pub(crate) async fn call(promise: Promise) -> HostResult<JsValue> {
    JsFuture::from(promise)
        .await
        .map_err(|err| host_error(&err))
}

/// Reads a string property, returning `None` for missing or non-string
/// values and for non-objects.
pub(crate) fn string_field(value: &JsValue, key: &str) -> Option<String> {
    Reflect::get(value, &JsValue::from_str(key))
        .ok()
        .and_then(|field| field.as_string())
}

fn host_error(value: &JsValue) -> HostError {
    let name = string_field(value, "name").unwrap_or_default();
    let message = string_field(value, "message")
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{value:?}"));
    HostError::new(HostErrorKind::from_dom_name(&name), message)
}
