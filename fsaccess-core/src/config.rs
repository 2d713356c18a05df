//! Adapter configuration.
//!
//! Every field has a default, so an empty JSON object (or no config at all)
//! yields the stock `.kdbx` setup.

use serde::{Deserialize, Serialize};

use crate::error::{FsAccessError, FsAccessResult};

/// Provider name registered with the storage registry.
pub const DEFAULT_NAME: &str = "fsaccess";
/// Icon shown next to the provider in the UI.
pub const DEFAULT_ICON: &str = "hdd";
/// Human-readable provider label.
pub const DEFAULT_LABEL: &str = "FS Access";
/// Name of the persistent database holding cached handles.
pub const DEFAULT_CACHE_NAME: &str = "FileHandles";
/// Object store inside the cache database.
pub const DEFAULT_STORE_NAME: &str = "files";

/// File type accepted by the host file picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTypeFilter {
    /// Description shown in the picker.
    pub description: String,
    /// Accepted MIME type.
    pub mime_type: String,
    /// Accepted extensions, including the leading dot.
    pub extensions: Vec<String>,
}

impl FileTypeFilter {
    /// Whether `file_name` carries one of the accepted extensions.
    ///
    /// Comparison is case-insensitive.
    #[must_use]
    pub fn matches(&self, file_name: &str) -> bool {
        let lower = file_name.to_ascii_lowercase();
        self.extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_ascii_lowercase()))
    }
}

impl Default for FileTypeFilter {
    fn default() -> Self {
        Self {
            description: "KDBX file".to_string(),
            mime_type: "application/x-kdbx".to_string(),
            extensions: vec![".kdbx".to_string()],
        }
    }
}

/// Configuration for [`crate::FsAccessStorage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FsAccessConfig {
    /// Provider name.
    pub name: String,
    /// Provider icon.
    pub icon: String,
    /// Provider label.
    pub label: String,
    /// Whether the provider starts enabled.
    pub enabled: bool,
    /// Persistent database holding cached handles.
    pub cache_name: String,
    /// Object store inside `cache_name`.
    pub store_name: String,
    /// File type offered by the picker.
    pub file_type: FileTypeFilter,
}

impl Default for FsAccessConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            icon: DEFAULT_ICON.to_string(),
            label: DEFAULT_LABEL.to_string(),
            enabled: true,
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            store_name: DEFAULT_STORE_NAME.to_string(),
            file_type: FileTypeFilter::default(),
        }
    }
}

impl FsAccessConfig {
    /// Parses a JSON config, filling in defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns [`FsAccessError::Config`] if the JSON is malformed or a field
    /// has the wrong type, and if `cacheName` or `storeName` is empty.
    pub fn from_json(json: &str) -> FsAccessResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|err| FsAccessError::Config(err.to_string()))?;
        if config.cache_name.is_empty() || config.store_name.is_empty() {
            return Err(FsAccessError::Config(
                "cacheName and storeName must not be empty".to_string(),
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = FsAccessConfig::default();
        assert_eq!(config.name, "fsaccess");
        assert_eq!(config.icon, "hdd");
        assert_eq!(config.cache_name, "FileHandles");
        assert_eq!(config.store_name, "files");
        assert!(config.enabled);
        assert_eq!(config.file_type.mime_type, "application/x-kdbx");
    }

    #[test]
    fn test_from_json_partial_override() {
        let config =
            FsAccessConfig::from_json(r#"{"cacheName": "Handles2", "enabled": false}"#).unwrap();
        assert_eq!(config.cache_name, "Handles2");
        assert!(!config.enabled);
        assert_eq!(config.store_name, "files");
        assert_eq!(config.file_type, FileTypeFilter::default());
    }

    #[test]
    fn test_from_json_empty_object() {
        assert_eq!(
            FsAccessConfig::from_json("{}").unwrap(),
            FsAccessConfig::default()
        );
    }

    #[test_case("not json")]
    #[test_case(r#"{"enabled": "yes"}"#)]
    #[test_case(r#"{"storeName": ""}"#)]
    fn test_from_json_rejects(json: &str) {
        let err = FsAccessConfig::from_json(json).unwrap_err();
        assert_eq!(err.code(), "config");
    }

    #[test_case("vault.kdbx", true)]
    #[test_case("VAULT.KDBX", true)]
    #[test_case("vault.kdbx.bak", false)]
    #[test_case("notes.txt", false)]
    fn test_file_type_matches(name: &str, expected: bool) {
        assert_eq!(FileTypeFilter::default().matches(name), expected);
    }
}
