//! `FileSystemFileHandle` and `showOpenFilePicker` wrappers.

use fsaccess_core::host::{
    FileHandle, FilePicker, HostFile, PermissionMode, PermissionState, WritableFile,
};
use fsaccess_core::{FileTypeFilter, HostError, HostErrorKind, HostResult};
use js_sys::{Array, Reflect, Uint8Array};
use wasm_bindgen::JsValue;

use crate::bridge;

/// A `FileSystemFileHandle` granted by the browser.
#[derive(Debug, Clone)]
pub struct BrowserFileHandle {
    handle: JsValue,
    name: String,
}

impl BrowserFileHandle {
    pub(crate) fn from_js(handle: JsValue) -> Self {
        let name = bridge::string_field(&handle, "name").unwrap_or_default();
        Self { handle, name }
    }

    pub(crate) const fn as_js(&self) -> &JsValue {
        &self.handle
    }
}

fn permission_state(value: &JsValue) -> HostResult<PermissionState> {
    value
        .as_string()
        .and_then(|state| state.parse().ok())
        .ok_or_else(|| {
            HostError::new(
                HostErrorKind::Other,
                format!("unexpected permission state {value:?}"),
            )
        })
}

impl FileHandle for BrowserFileHandle {
    type File = BrowserFile;
    type Writable = BrowserWritable;

    fn name(&self) -> String {
        self.name.clone()
    }

    async fn is_same_entry(&self, other: &Self) -> HostResult<bool> {
        let same = bridge::call(bridge::is_same_entry(&self.handle, &other.handle)).await?;
        Ok(same.is_truthy())
    }

    async fn query_permission(&self, mode: PermissionMode) -> HostResult<PermissionState> {
        let state =
            bridge::call(bridge::query_permission(&self.handle, &mode.to_string())).await?;
        permission_state(&state)
    }

    async fn request_permission(&self, mode: PermissionMode) -> HostResult<PermissionState> {
        let state =
            bridge::call(bridge::request_permission(&self.handle, &mode.to_string())).await?;
        permission_state(&state)
    }

    async fn get_file(&self) -> HostResult<BrowserFile> {
        let file = bridge::call(bridge::get_file(&self.handle)).await?;
        Ok(BrowserFile::from_js(file))
    }

    async fn create_writable(&self) -> HostResult<BrowserWritable> {
        let stream = bridge::call(bridge::create_writable(&self.handle)).await?;
        Ok(BrowserWritable { stream })
    }
}

/// A `File` snapshot.
#[derive(Debug)]
pub struct BrowserFile {
    file: JsValue,
    last_modified: u64,
}

impl BrowserFile {
    // `lastModified` is an integral millisecond count held in an f64.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_js(file: JsValue) -> Self {
        let last_modified = Reflect::get(&file, &JsValue::from_str("lastModified"))
            .ok()
            .and_then(|value| value.as_f64())
            .map_or(0, |ms| ms.max(0.0) as u64);
        Self {
            file,
            last_modified,
        }
    }
}

impl HostFile for BrowserFile {
    fn last_modified(&self) -> u64 {
        self.last_modified
    }

    async fn array_buffer(&self) -> HostResult<Vec<u8>> {
        let bytes = bridge::call(bridge::read_file(&self.file)).await?;
        Ok(Uint8Array::new(&bytes).to_vec())
    }
}

/// A `FileSystemWritableFileStream`.
#[derive(Debug)]
pub struct BrowserWritable {
    stream: JsValue,
}

impl WritableFile for BrowserWritable {
    async fn write(&mut self, data: &[u8]) -> HostResult<()> {
        // Copied out of wasm memory, which may move while the write is pending.
        let chunk = Uint8Array::from(data);
        bridge::call(bridge::write(&self.stream, &chunk)).await?;
        Ok(())
    }

    async fn close(self) -> HostResult<()> {
        bridge::call(bridge::close(&self.stream)).await?;
        Ok(())
    }
}

/// The browser's `showOpenFilePicker`, restricted to a single file.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserPicker;

impl FilePicker for BrowserPicker {
    type Handle = BrowserFileHandle;

    async fn pick_file(&self, filter: &FileTypeFilter) -> HostResult<Option<BrowserFileHandle>> {
        let extensions: Array = filter
            .extensions
            .iter()
            .map(|ext| JsValue::from_str(ext))
            .collect();
        let picked = bridge::call(bridge::pick_file(
            &filter.description,
            &filter.mime_type,
            &extensions,
        ))
        .await;
        match picked {
            Ok(handle) if handle.is_null() || handle.is_undefined() => Ok(None),
            Ok(handle) => Ok(Some(BrowserFileHandle::from_js(handle))),
            Err(err) if err.kind == HostErrorKind::Abort => {
                log::debug!("File picker dismissed");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
