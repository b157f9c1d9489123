//! CKAN/NDX resource fetcher.
//!
//! Downloads a CSV resource (or reuses the cached copy) and turns two of its
//! columns into an ordered code → label map.

use std::collections::HashMap;

use tracing::{error, info};

use crate::error::{excerpt, SyncError, BODY_EXCERPT_LEN};
use crate::http::{HttpRequest, Transport};
use crate::store::DiagnosticStore;

const PREVIEW_LEN: usize = 100;

/// Ordered code → label mapping built from CSV rows.
///
/// Keeps the position of the first occurrence of each code; a later row
/// with the same code replaces the label in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChoiceMap {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl ChoiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: String, label: String) {
        match self.index.get(&code) {
            Some(&pos) => self.entries[pos].1 = label,
            None => {
                self.index.insert(code.clone(), self.entries.len());
                self.entries.push((code, label));
            }
        }
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.index.get(code).map(|&pos| self.entries[pos].1.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<'a> IntoIterator for &'a ChoiceMap {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Fetch `url` (or its cached copy when `use_cache` is set and present) and
/// map `key_field` → `value_field` for every row.
///
/// A fresh download is always written to the cache, even when `use_cache`
/// is off.
pub fn fetch_choice_map<T: Transport>(
    transport: &T,
    store: &DiagnosticStore,
    url: &str,
    auth_token: &str,
    key_field: &str,
    value_field: &str,
    use_cache: bool,
) -> Result<ChoiceMap, SyncError> {
    info!(url, "getting CKAN resource");

    let cached = if use_cache {
        store.read_cache(url)?
    } else {
        None
    };

    let (csv_data, status) = match cached {
        Some(data) => {
            info!(path = %store.cache_path(url).display(), "using cached data");
            (data, None)
        }
        None => {
            let mut request = HttpRequest::get(url);
            request
                .headers
                .push(("Authorization".to_string(), auth_token.to_string()));
            let response = transport.execute(&request)?;
            if !response.is_success() {
                error!(
                    status = response.status,
                    url,
                    body = %excerpt(&response.body, BODY_EXCERPT_LEN),
                    "CKAN request failed"
                );
                return Err(SyncError::http(response.status, &response.body));
            }
            store.write_cache(url, &response.body)?;
            (response.body, Some(response.status))
        }
    };

    info!("CSV data preview: {}...", excerpt(&csv_data, PREVIEW_LEN));
    parse_choice_map(&csv_data, key_field, value_field, status)
}

/// Parse CSV text with a header row into a `ChoiceMap`.
///
/// `status` is only carried into `FieldMissing` errors for context; `None`
/// means the data came from the cache.
pub fn parse_choice_map(
    csv_data: &str,
    key_field: &str,
    value_field: &str,
    status: Option<u16>,
) -> Result<ChoiceMap, SyncError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| SyncError::Csv(format!("failed to read CSV headers: {e}")))?
        .clone();
    // With repeated header names the rightmost column wins.
    let key_idx = headers.iter().collect::<Vec<_>>().iter().rposition(|h| *h == key_field);
    let value_idx = headers.iter().collect::<Vec<_>>().iter().rposition(|h| *h == value_field);

    let mut map = ChoiceMap::new();
    for (line, result) in reader.records().enumerate() {
        let record =
            result.map_err(|e| SyncError::Csv(format!("failed to parse CSV row {}: {e}", line + 1)))?;

        let code = column(&headers, &record, key_idx, key_field, status)?;
        let label = column(&headers, &record, value_idx, value_field, status)?;
        map.insert(code.to_string(), label.to_string());
    }
    Ok(map)
}

fn column<'r>(
    headers: &csv::StringRecord,
    record: &'r csv::StringRecord,
    idx: Option<usize>,
    field: &str,
    status: Option<u16>,
) -> Result<&'r str, SyncError> {
    idx.and_then(|i| record.get(i)).ok_or_else(|| {
        let row = render_row(headers, record);
        error!(field, row = %row, status = ?status, "CSV row is missing an expected field");
        SyncError::FieldMissing {
            field: field.to_string(),
            row,
            status,
        }
    })
}

/// `{header=value, ...}` for error reports.
fn render_row(headers: &csv::StringRecord, record: &csv::StringRecord) -> String {
    let pairs: Vec<String> = headers
        .iter()
        .zip(record.iter())
        .map(|(h, v)| format!("{h}={v}"))
        .collect();
    format!("{{{}}}", pairs.join(", "))
}
