//! IndexedDB-backed handle store.
//!
//! File handles are structured-cloneable, so records hold the handle object
//! itself keyed by the file id string.

use fsaccess_core::{FileId, HandleDb, HandleStore, HostResult};
use js_sys::Array;
use wasm_bindgen::JsValue;

use crate::bridge;
use crate::handle::BrowserFileHandle;

/// Opens handle databases through `indexedDB`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdbHandleStore;

impl HandleStore for IdbHandleStore {
    type Handle = BrowserFileHandle;
    type Db = IdbHandleDb;

    async fn open(&self, db_name: &str, store_name: &str) -> HostResult<IdbHandleDb> {
        let db = bridge::call(bridge::open_db(db_name, store_name)).await?;
        Ok(IdbHandleDb {
            db,
            store_name: store_name.to_owned(),
        })
    }
}

/// An open `IDBDatabase` and the object store holding the handles.
#[derive(Debug)]
pub struct IdbHandleDb {
    db: JsValue,
    store_name: String,
}

impl HandleDb for IdbHandleDb {
    type Handle = BrowserFileHandle;

    async fn entries(&self) -> HostResult<Vec<(FileId, BrowserFileHandle)>> {
        let rows = bridge::call(bridge::entries(&self.db, &self.store_name)).await?;
        let records = Array::from(&rows)
            .iter()
            .filter_map(|row| {
                let row = Array::from(&row);
                let key = row.get(0).as_string()?;
                let handle = row.get(1);
                if handle.is_undefined() || handle.is_null() {
                    log::warn!("Skipping empty handle record {key}");
                    return None;
                }
                Some((FileId::new(key), BrowserFileHandle::from_js(handle)))
            })
            .collect();
        Ok(records)
    }

    async fn get(&self, id: &FileId) -> HostResult<Option<BrowserFileHandle>> {
        let handle = bridge::call(bridge::get(&self.db, &self.store_name, id.as_str())).await?;
        if handle.is_null() || handle.is_undefined() {
            return Ok(None);
        }
        Ok(Some(BrowserFileHandle::from_js(handle)))
    }

    async fn put(&self, id: &FileId, handle: &BrowserFileHandle) -> HostResult<()> {
        bridge::call(bridge::put(
            &self.db,
            &self.store_name,
            id.as_str(),
            handle.as_js(),
        ))
        .await?;
        Ok(())
    }

    async fn delete(&self, id: &FileId) -> HostResult<()> {
        bridge::call(bridge::delete(&self.db, &self.store_name, id.as_str())).await?;
        Ok(())
    }
}
