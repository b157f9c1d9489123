//! In-memory stand-in for a Kobo instance and a CKAN file download.
//!
//! Serves the slice of `/api/v2/assets/` the sync uses (get, list with a
//! search query, create, replace) plus `GET /ckan/{file}` for CSV resources.
//! Every request is recorded so tests can assert on the exact calls made.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const KOBO_TOKEN: &str = "kobo-token";
pub const CKAN_TOKEN: &str = "ckan-token";
pub const OWNER: &str = "mock-owner";

/// Method, path and raw query string of one request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
}

#[derive(Debug)]
pub struct MockState {
    pub kobo_token: String,
    pub ckan_token: String,
    pub assets: HashMap<String, Value>,
    pub datasets: HashMap<String, String>,
    pub requests: Vec<RecordedRequest>,
    /// Modification sequence per uid, newest is highest.
    modified: HashMap<String, u64>,
    clock: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            kobo_token: KOBO_TOKEN.to_string(),
            ckan_token: CKAN_TOKEN.to_string(),
            assets: HashMap::new(),
            datasets: HashMap::new(),
            requests: Vec::new(),
            modified: HashMap::new(),
            clock: 0,
        }
    }
}

impl MockState {
    /// Store `asset` (which must carry a `uid`) and mark it as modified now.
    pub fn put_asset(&mut self, mut asset: Value) -> String {
        let uid = asset["uid"].as_str().unwrap_or_default().to_string();
        if let Some(fields) = asset.as_object_mut() {
            fields
                .entry("owner__username")
                .or_insert_with(|| Value::String(OWNER.to_string()));
            fields.insert("url".to_string(), Value::String(format!("/api/v2/assets/{uid}/")));
        }
        self.clock += 1;
        self.modified.insert(uid.clone(), self.clock);
        self.assets.insert(uid.clone(), asset);
        uid
    }

    pub fn add_collection(&mut self, uid: &str, name: &str) -> String {
        self.put_asset(json!({ "uid": uid, "name": name, "asset_type": "collection" }))
    }

    pub fn add_dataset(&mut self, file_name: &str, csv: &str) {
        self.datasets.insert(file_name.to_string(), csv.to_string());
    }

    pub fn count_requests(&self, method: &str, path: &str) -> usize {
        self.requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    fn list(&self, filter: &SearchFilter, limit: usize, offset: usize) -> Value {
        let mut matches: Vec<&Value> = self
            .assets
            .values()
            .filter(|asset| filter.matches(asset))
            .collect();
        matches.sort_by_key(|asset| {
            let uid = asset["uid"].as_str().unwrap_or_default();
            std::cmp::Reverse(self.modified.get(uid).copied().unwrap_or_default())
        });
        let count = matches.len();
        let results: Vec<Value> = matches.into_iter().skip(offset).take(limit).cloned().collect();
        json!({ "count": count, "next": null, "previous": null, "results": results })
    }
}

pub type Db = Arc<RwLock<MockState>>;

pub fn app() -> Router {
    app_with_state(Arc::new(RwLock::new(MockState::default())))
}

pub fn app_with_state(db: Db) -> Router {
    Router::new()
        .route("/api/v2/assets/", get(list_assets).post(create_asset))
        .route("/api/v2/assets/{uid}/", get(get_asset).put(replace_asset))
        .route("/ckan/{file}", get(download_dataset))
        .layer(middleware::from_fn_with_state(db.clone(), record_request))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_state(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(db)).await
}

async fn record_request(State(db): State<Db>, request: Request, next: Next) -> Response {
    let recorded = RecordedRequest {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        query: request.uri().query().map(str::to_string),
    };
    db.write().await.requests.push(recorded);
    next.run(request).await
}

type Reply = (StatusCode, Json<Value>);

fn detail(status: StatusCode, message: &str) -> Reply {
    (status, Json(json!({ "detail": message })))
}

fn check_kobo_token(headers: &HeaderMap, state: &MockState) -> Result<(), Reply> {
    let expected = format!("Token {}", state.kobo_token);
    match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        _ => Err(detail(StatusCode::UNAUTHORIZED, "Invalid token.")),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// `(asset_type:a OR asset_type:b) AND parent__uid:X`, the only search
/// shape the sync sends.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub asset_types: Vec<String>,
    pub parent_uid: Option<String>,
}

impl SearchFilter {
    pub fn parse(q: &str) -> Self {
        let mut filter = SearchFilter::default();
        for term in q.split([' ', '(', ')']).filter(|t| !t.is_empty()) {
            if let Some(kind) = term.strip_prefix("asset_type:") {
                filter.asset_types.push(kind.to_string());
            } else if let Some(uid) = term.strip_prefix("parent__uid:") {
                filter.parent_uid = Some(uid.to_string());
            }
        }
        filter
    }

    fn matches(&self, asset: &Value) -> bool {
        let type_ok = self.asset_types.is_empty()
            || asset["asset_type"]
                .as_str()
                .is_some_and(|t| self.asset_types.iter().any(|k| k == t));
        let parent_ok = match &self.parent_uid {
            None => true,
            Some(uid) => asset["parent"]
                .as_str()
                .and_then(|p| p.split('/').filter(|s| !s.is_empty()).last())
                == Some(uid.as_str()),
        };
        type_ok && parent_ok
    }
}

async fn list_assets(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Reply, Reply> {
    let state = db.read().await;
    check_kobo_token(&headers, &state)?;
    let filter = params.q.as_deref().map(SearchFilter::parse).unwrap_or_default();
    let page = state.list(&filter, params.limit.unwrap_or(100), params.offset.unwrap_or(0));
    Ok((StatusCode::OK, Json(page)))
}

async fn get_asset(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(uid): Path<String>,
) -> Result<Reply, Reply> {
    let state = db.read().await;
    check_kobo_token(&headers, &state)?;
    state
        .assets
        .get(&uid)
        .cloned()
        .map(|asset| (StatusCode::OK, Json(asset)))
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Not found."))
}

async fn create_asset(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<Map<String, Value>>,
) -> Result<Reply, Reply> {
    let mut state = db.write().await;
    check_kobo_token(&headers, &state)?;

    let prefix = match input.get("asset_type").and_then(Value::as_str) {
        Some("block") => 'b',
        Some("collection") => 'c',
        Some(_) => 'a',
        None => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({ "asset_type": ["This field is required."] })),
            ))
        }
    };
    let mut asset = input;
    let uid = format!("{prefix}{}", &Uuid::new_v4().simple().to_string()[..21]);
    asset.insert("uid".to_string(), Value::String(uid.clone()));
    state.put_asset(Value::Object(asset));
    let created = state.assets[&uid].clone();
    Ok((StatusCode::CREATED, Json(created)))
}

async fn replace_asset(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(uid): Path<String>,
    Json(input): Json<Map<String, Value>>,
) -> Result<Reply, Reply> {
    let mut state = db.write().await;
    check_kobo_token(&headers, &state)?;

    let mut asset = state
        .assets
        .get(&uid)
        .cloned()
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Not found."))?;
    if let Some(fields) = asset.as_object_mut() {
        for (key, value) in input {
            if key != "uid" {
                fields.insert(key, value);
            }
        }
    }
    state.put_asset(asset);
    let updated = state.assets[&uid].clone();
    Ok((StatusCode::OK, Json(updated)))
}

async fn download_dataset(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(file): Path<String>,
) -> Response {
    let state = db.read().await;
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == state.ckan_token);
    if !authorized {
        return (StatusCode::FORBIDDEN, "Access denied").into_response();
    }
    match state.datasets.get(&file) {
        Some(csv) => (StatusCode::OK, [("content-type", "text/csv")], csv.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "Resource not found").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_filter_parses_types_and_parent() {
        let filter = SearchFilter::parse("(asset_type:question OR asset_type:block) AND parent__uid:cXyz");
        assert_eq!(filter.asset_types, vec!["question", "block"]);
        assert_eq!(filter.parent_uid.as_deref(), Some("cXyz"));
    }

    #[test]
    fn search_filter_matches_parent_url_tail() {
        let filter = SearchFilter::parse("(asset_type:block) AND parent__uid:cXyz");
        assert!(filter.matches(&json!({
            "asset_type": "block",
            "parent": "http://127.0.0.1:1/api/v2/assets/cXyz/"
        })));
        assert!(!filter.matches(&json!({
            "asset_type": "question",
            "parent": "http://127.0.0.1:1/api/v2/assets/cXyz/"
        })));
        assert!(!filter.matches(&json!({ "asset_type": "block" })));
    }

    #[test]
    fn put_asset_sets_owner_and_url() {
        let mut state = MockState::default();
        let uid = state.add_collection("cOne", "Countries");
        assert_eq!(state.assets[&uid]["owner__username"], OWNER);
        assert_eq!(state.assets[&uid]["url"], "/api/v2/assets/cOne/");
    }

    #[test]
    fn list_orders_newest_first_and_paginates() {
        let mut state = MockState::default();
        for uid in ["b1", "b2", "b3"] {
            state.put_asset(json!({ "uid": uid, "asset_type": "block", "parent": "/api/v2/assets/c/" }));
        }
        let filter = SearchFilter::parse("(asset_type:block) AND parent__uid:c");
        let page = state.list(&filter, 2, 0);
        assert_eq!(page["count"], 3);
        assert_eq!(page["results"][0]["uid"], "b3");
        assert_eq!(page["results"][1]["uid"], "b2");

        let page = state.list(&filter, 2, 2);
        assert_eq!(page["results"].as_array().unwrap().len(), 1);
        assert_eq!(page["results"][0]["uid"], "b1");
    }
}
