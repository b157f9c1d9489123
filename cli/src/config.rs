//! `config.json` loading and validation.
//!
//! ```json
//! {
//!     "ckan_api_token": "",
//!     "kobo_base_url": "",
//!     "kobo_api_token": "",
//!     "kobo_collection_id": "",
//!     "kobo_question_block_id": ""
//! }
//! ```
//! The last two keys are optional and can be given as flags instead.

use std::fs;
use std::path::Path;

use ckan_kobo_core::SyncError;
use serde::Deserialize;

/// The file as written by the user; every key may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub ckan_api_token: Option<String>,
    pub kobo_api_token: Option<String>,
    pub kobo_base_url: Option<String>,
    pub kobo_collection_id: Option<String>,
    pub kobo_question_block_id: Option<String>,
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub ckan_api_token: String,
    pub kobo_api_token: String,
    pub kobo_base_url: String,
    pub kobo_collection_id: Option<String>,
    pub kobo_question_block_id: Option<String>,
}

impl AppConfig {
    pub fn load_from_json(path: &Path) -> Result<Self, SyncError> {
        let raw = fs::read_to_string(path).map_err(|e| SyncError::Config {
            key: path.display().to_string(),
            reason: format!("cannot read file: {e}"),
        })?;
        Self::from_json_str(&raw).map_err(|err| match err {
            SyncError::Config { key, reason } if key.is_empty() => SyncError::Config {
                key: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, SyncError> {
        let raw: RawJsonConfig = serde_json::from_str(raw).map_err(|e| SyncError::Config {
            key: String::new(),
            reason: format!("invalid JSON: {e}"),
        })?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawJsonConfig) -> Result<Self, SyncError> {
        Ok(Self {
            ckan_api_token: required("ckan_api_token", raw.ckan_api_token)?,
            kobo_api_token: required("kobo_api_token", raw.kobo_api_token)?,
            kobo_base_url: required("kobo_base_url", raw.kobo_base_url)?,
            kobo_collection_id: optional(raw.kobo_collection_id),
            kobo_question_block_id: optional(raw.kobo_question_block_id),
        })
    }
}

fn required(key: &str, value: Option<String>) -> Result<String, SyncError> {
    optional(value).ok_or_else(|| SyncError::missing_config(key))
}

/// Blank strings count as absent: the template file ships them empty.
pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "ckan_api_token": "ck",
        "kobo_api_token": "kb",
        "kobo_base_url": "https://kf.local",
        "kobo_collection_id": "cXyz",
        "kobo_question_block_id": ""
    }"#;

    #[test]
    fn loads_required_and_optional_keys() {
        let config = AppConfig::from_json_str(FULL).unwrap();
        assert_eq!(config.ckan_api_token, "ck");
        assert_eq!(config.kobo_collection_id.as_deref(), Some("cXyz"));
        assert!(config.kobo_question_block_id.is_none());
    }

    #[test]
    fn missing_key_is_named() {
        let err = AppConfig::from_json_str(r#"{"ckan_api_token":"ck","kobo_base_url":"u"}"#).unwrap_err();
        match err {
            SyncError::Config { key, .. } => assert_eq!(key, "kobo_api_token"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_required_key_counts_as_missing() {
        let err = AppConfig::from_json_str(r#"{"ckan_api_token":" ","kobo_api_token":"kb","kobo_base_url":"u"}"#)
            .unwrap_err();
        assert!(matches!(err, SyncError::Config { ref key, .. } if key == "ckan_api_token"));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let raw = r#"{"ckan_api_token":"ck","kobo_api_token":"kb","kobo_base_url":"u","ckan_countries_dataset_url":"x"}"#;
        assert!(AppConfig::from_json_str(raw).is_ok());
    }

    #[test]
    fn unreadable_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load_from_json(&dir.path().join("config.json")).unwrap_err();
        assert!(matches!(err, SyncError::Config { .. }));
    }

    #[test]
    fn invalid_json_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        match AppConfig::load_from_json(&path).unwrap_err() {
            SyncError::Config { key, reason } => {
                assert_eq!(key, path.display().to_string());
                assert!(reason.starts_with("invalid JSON"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
