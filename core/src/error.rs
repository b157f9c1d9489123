//! Error type shared by the CKAN fetcher, the Kobo client and the CLI driver.
//!
//! # Design
//! Every failure aborts the run, so there is a single enum rather than one
//! per component. HTTP failures from either API land in `Http` with the
//! status and a truncated body; nothing here is retried.

use thiserror::Error;

/// How many characters of a failed response body are kept for reporting.
pub const BODY_EXCERPT_LEN: usize = 300;

/// Errors produced while syncing a CKAN resource into a Kobo question block.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A required configuration key is missing, empty or unreadable.
    #[error("configuration error: {key}: {reason}")]
    Config { key: String, reason: String },

    /// CKAN or Kobo answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// A CSV row has no column named `field`.
    #[error("field `{field}` missing in row {row} (response status: {})", display_status(.status))]
    FieldMissing {
        field: String,
        row: String,
        status: Option<u16>,
    },

    /// The user declined an interactive confirmation.
    #[error("aborted by user")]
    UserAborted,

    /// The request never produced a response (DNS, connect, TLS, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// A response body is not valid text in its declared (or default) charset.
    #[error("cannot decode response body as {charset}: {reason}")]
    Decode { charset: String, reason: String },

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// A Kobo asset lacks a field the operation relies on.
    #[error("unexpected asset: {0}")]
    UnexpectedAsset(String),
}

impl SyncError {
    /// Missing-key configuration error.
    pub fn missing_config(key: &str) -> Self {
        SyncError::Config {
            key: key.to_string(),
            reason: "is required".to_string(),
        }
    }

    /// Build an `Http` error keeping only the head of the body.
    pub fn http(status: u16, body: &str) -> Self {
        SyncError::Http {
            status,
            body: excerpt(body, BODY_EXCERPT_LEN),
        }
    }
}

/// First `max` characters of `text`, never splitting a UTF-8 sequence.
pub fn excerpt(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn display_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "cached".to_string(),
    }
}
