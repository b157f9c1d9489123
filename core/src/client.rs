//! Stateless HTTP request builder and response parser for the Kobo API.
//!
//! # Design
//! `KoboClient` holds only a base URL and an API token and carries no
//! mutable state between calls. Operations are split into `build_*` methods
//! that produce an `HttpRequest` and `parse_*` methods that consume an
//! `HttpResponse`; `KoboApi` wires the two together around a `Transport`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::SyncError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    Asset, AssetPage, BlockContent, BlockPayload, Choice, CollectionPayload, CollectionSettings,
    QuestionSpec, SurveyEntry,
};

pub const ASSETS_PATH: &str = "/api/v2/assets/";

/// Item types listed by `get_collection_items` when the caller has no
/// preference.
pub const DEFAULT_ITEM_TYPES: [&str; 4] = ["question", "block", "template", "collection"];

/// Request payload: query pairs for GET, a JSON body for POST/PUT.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Query(Vec<(String, String)>),
    Json(serde_json::Value),
}

impl Payload {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, SyncError> {
        serde_json::to_value(value)
            .map(Payload::Json)
            .map_err(|e| SyncError::Serialization(e.to_string()))
    }
}

/// Synchronous, stateless client for one Kobo instance.
#[derive(Debug, Clone)]
pub struct KoboClient {
    base_url: String,
    api_token: String,
}

impl KoboClient {
    pub fn new(base_url: &str, api_token: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_token: api_token.to_string(),
        }
    }

    /// Join the base URL and `path` with exactly one `/` between them.
    pub fn build_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Path of a URL built by `build_url`, always starting with `/`.
    pub fn path_of(&self, url: &str) -> String {
        let rest = url
            .strip_prefix(self.base_url.trim_end_matches('/'))
            .unwrap_or(url);
        format!("/{}", rest.trim_start_matches('/'))
    }

    pub fn asset_path(asset_id: &str) -> String {
        format!("{ASSETS_PATH}{asset_id}/")
    }

    /// Authenticated request for `path`. A `Query` payload is only honoured
    /// on GET and a `Json` payload only on POST/PUT.
    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        payload: Payload,
    ) -> Result<HttpRequest, SyncError> {
        let mut headers = vec![
            ("Authorization".to_string(), format!("Token {}", self.api_token)),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        let mut query = Vec::new();
        let mut body = None;

        match (method, payload) {
            (HttpMethod::Get, Payload::Query(pairs)) => query = pairs,
            (HttpMethod::Get, Payload::None) => {}
            (HttpMethod::Post | HttpMethod::Put, Payload::Json(value)) => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                body = Some(
                    serde_json::to_string(&value)
                        .map_err(|e| SyncError::Serialization(e.to_string()))?,
                );
            }
            (HttpMethod::Post | HttpMethod::Put, Payload::None) => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                body = Some("{}".to_string());
            }
            (method, payload) => {
                return Err(SyncError::Serialization(format!(
                    "{} cannot carry {payload:?}",
                    method.as_str()
                )))
            }
        }

        Ok(HttpRequest {
            method,
            url: self.build_url(path),
            headers,
            query,
            body,
        })
    }

    pub fn build_get_asset(&self, asset_id: &str) -> Result<HttpRequest, SyncError> {
        self.build_request(HttpMethod::Get, &Self::asset_path(asset_id), Payload::None)
    }

    /// Query pairs listing items of `collection_id`, newest first.
    pub fn collection_items_query(
        collection_id: &str,
        item_types: &[&str],
        limit: u32,
        offset: u32,
    ) -> Vec<(String, String)> {
        let type_filter = item_types
            .iter()
            .map(|t| format!("asset_type:{t}"))
            .collect::<Vec<_>>()
            .join(" OR ");
        vec![
            ("q".to_string(), format!("({type_filter}) AND parent__uid:{collection_id}")),
            ("limit".to_string(), limit.to_string()),
            ("offset".to_string(), offset.to_string()),
            ("ordering".to_string(), "-date_modified".to_string()),
            ("metadata".to_string(), "on".to_string()),
        ]
    }

    pub fn build_collection_items(
        &self,
        collection_id: &str,
        item_types: &[&str],
        limit: u32,
        offset: u32,
    ) -> Result<HttpRequest, SyncError> {
        let query = Self::collection_items_query(collection_id, item_types, limit, offset);
        self.build_request(HttpMethod::Get, ASSETS_PATH, Payload::Query(query))
    }

    /// Full block payload with `list_name` stamped on the survey entry and
    /// every choice.
    pub fn block_payload(
        &self,
        collection_id: &str,
        list_name: &str,
        question: &QuestionSpec,
        choices: &[Choice],
    ) -> BlockPayload {
        let choices = choices
            .iter()
            .map(|choice| Choice {
                list_name: Some(list_name.to_string()),
                ..choice.clone()
            })
            .collect();
        BlockPayload {
            content: BlockContent {
                survey: vec![SurveyEntry {
                    question_type: question.question_type.clone(),
                    select_from_list_name: Some(list_name.to_string()),
                    label: question.label.clone(),
                    required: question.required,
                    extra: Default::default(),
                }],
                choices,
                settings: serde_json::json!([{}]),
                extra: Default::default(),
            },
            asset_type: "block",
            parent: self.build_url(&Self::asset_path(collection_id)),
        }
    }

    pub fn build_create_block(&self, payload: &BlockPayload) -> Result<HttpRequest, SyncError> {
        self.build_request(HttpMethod::Post, ASSETS_PATH, Payload::json(payload)?)
    }

    pub fn build_update_block(
        &self,
        block_id: &str,
        payload: &BlockPayload,
    ) -> Result<HttpRequest, SyncError> {
        self.build_request(HttpMethod::Put, &Self::asset_path(block_id), Payload::json(payload)?)
    }

    pub fn collection_payload(name: &str, settings: CollectionSettings) -> CollectionPayload {
        CollectionPayload {
            name: name.to_string(),
            asset_type: "collection",
            settings,
            tag_string: String::new(),
        }
    }

    pub fn build_create_collection(
        &self,
        payload: &CollectionPayload,
    ) -> Result<HttpRequest, SyncError> {
        self.build_request(HttpMethod::Post, ASSETS_PATH, Payload::json(payload)?)
    }

    pub fn parse_asset(&self, response: &HttpResponse) -> Result<Asset, SyncError> {
        parse_json(response)
    }

    /// Untyped asset body, for reading single fields of assets this tool
    /// did not write.
    pub fn parse_value(&self, response: &HttpResponse) -> Result<serde_json::Value, SyncError> {
        parse_json(response)
    }

    pub fn parse_asset_page(&self, response: &HttpResponse) -> Result<AssetPage, SyncError> {
        parse_json(response)
    }
}

/// Fresh list name for a new block's choice list.
pub fn new_list_name() -> String {
    format!("unique_list_name_{}", Uuid::new_v4().simple())
}

/// Collection uid from a block's `parent` URL
/// (`https://kf.example.org/api/v2/assets/<uid>/`).
pub fn collection_id_from_parent(parent_url: &str) -> Option<&str> {
    parent_url
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .last()
}

/// Map a non-2xx status to `SyncError::Http`.
pub fn check_status(response: &HttpResponse) -> Result<(), SyncError> {
    if response.is_success() {
        return Ok(());
    }
    Err(SyncError::http(response.status, &response.body))
}

fn parse_json<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, SyncError> {
    check_status(response)?;
    serde_json::from_str(&response.body).map_err(|e| SyncError::Deserialization(e.to_string()))
}
