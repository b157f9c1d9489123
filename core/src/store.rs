//! On-disk artifacts: the CSV cache and the per-call JSON dumps.
//!
//! Both live in one sample-data directory. The cache file name is derived
//! from the dataset URL by `cache_path`, and that same function serves reads
//! and writes, so a cached run always sees what the last fetch stored.

use std::fs;
use std::path::PathBuf;

use crate::error::SyncError;
use crate::http::HttpMethod;

pub const DEFAULT_SAMPLE_DATA_DIR: &str = "sample-data";

/// Used when the dataset URL ends with `/` or has no path at all.
const FALLBACK_CACHE_NAME: &str = "resource.csv";

#[derive(Debug, Clone)]
pub struct DiagnosticStore {
    dir: PathBuf,
}

impl DiagnosticStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Canonical location of the cached CSV for `url`.
    pub fn cache_path(&self, url: &str) -> PathBuf {
        self.dir.join(cache_file_name(url))
    }

    /// Cached CSV for `url`, if one was stored by an earlier fetch.
    pub fn read_cache(&self, url: &str) -> Result<Option<String>, SyncError> {
        let path = self.cache_path(url);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    /// Overwrite the cached CSV for `url`.
    pub fn write_cache(&self, url: &str, body: &str) -> Result<PathBuf, SyncError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.cache_path(url);
        fs::write(&path, body)?;
        Ok(path)
    }

    /// Dump file for one Kobo call, e.g. `get-get_asset--api-v2-assets-abc-.json`.
    pub fn dump_path(&self, method: HttpMethod, caller: &str, path: &str) -> PathBuf {
        let name = format!(
            "{}-{}-{}.json",
            method.as_str().to_lowercase(),
            caller,
            path.replace('/', "-")
        );
        self.dir.join(name)
    }

    /// Write a response body for offline inspection. JSON bodies are
    /// pretty-printed; anything else is stored as received.
    pub fn write_dump(
        &self,
        method: HttpMethod,
        caller: &str,
        path: &str,
        body: &str,
    ) -> Result<PathBuf, SyncError> {
        fs::create_dir_all(&self.dir)?;
        let contents = match serde_json::from_str::<serde_json::Value>(body) {
            Ok(value) => serde_json::to_string_pretty(&value)
                .map_err(|e| SyncError::Serialization(e.to_string()))?,
            Err(_) => body.to_string(),
        };
        let file = self.dump_path(method, caller, path);
        fs::write(&file, contents)?;
        Ok(file)
    }
}

impl Default for DiagnosticStore {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_DATA_DIR)
    }
}

/// Last path segment of `url`, ignoring any query string or fragment.
fn cache_file_name(url: &str) -> String {
    let without_suffix = url.split(['?', '#']).next().unwrap_or_default();
    let without_scheme = without_suffix
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_suffix);
    match without_scheme.split_once('/') {
        Some((_, path)) => match path.rsplit('/').next() {
            Some(segment) if !segment.is_empty() => segment.to_string(),
            _ => FALLBACK_CACHE_NAME.to_string(),
        },
        None => FALLBACK_CACHE_NAME.to_string(),
    }
}
