//! Kobo operations executed over a `Transport`.
//!
//! `KoboApi` pairs the pure `KoboClient` with a transport and the diagnostic
//! store. Every successful response body is dumped to the store so the
//! shape of Kobo's answers can be inspected offline; the dumps are never
//! read back.

use serde_json::Value;
use tracing::{error, info};

use crate::client::{
    check_status, collection_id_from_parent, new_list_name, KoboClient, DEFAULT_ITEM_TYPES,
};
use crate::error::{excerpt, SyncError, BODY_EXCERPT_LEN};
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::store::DiagnosticStore;
use crate::types::{Asset, AssetPage, Choice, CollectionSettings, QuestionSpec};

pub const DEFAULT_PAGE_LIMIT: u32 = 100;

pub struct KoboApi<T> {
    client: KoboClient,
    transport: T,
    store: DiagnosticStore,
}

impl<T: Transport> KoboApi<T> {
    pub fn new(client: KoboClient, transport: T, store: DiagnosticStore) -> Self {
        Self {
            client,
            transport,
            store,
        }
    }

    /// Execute one built request. `caller` names the operation in the dump
    /// file.
    pub fn send(&self, caller: &str, request: HttpRequest) -> Result<HttpResponse, SyncError> {
        let path = self.client.path_of(&request.url);
        info!(path = %path, method = request.method.as_str(), "requesting Kobo instance");
        let response = self.transport.execute(&request)?;

        if let Err(err) = check_status(&response) {
            error!(
                status = response.status,
                url = %request.url,
                body = %excerpt(&response.body, BODY_EXCERPT_LEN),
                "Kobo request failed"
            );
            return Err(err);
        }

        let dump = self
            .store
            .write_dump(request.method, caller, &path, &response.body)?;
        info!(
            url = %request.url,
            status = response.status,
            dump = %dump.display(),
            "request successful"
        );
        Ok(response)
    }

    pub fn get_asset(&self, asset_id: &str) -> Result<Asset, SyncError> {
        info!(asset_id, "getting Kobo asset");
        let response = self.send("get_asset", self.client.build_get_asset(asset_id)?)?;
        self.client.parse_asset(&response)
    }

    /// A collection is just an asset.
    pub fn get_collection(&self, collection_id: &str) -> Result<Asset, SyncError> {
        info!(collection_id, "getting Kobo collection");
        self.get_asset(collection_id)
    }

    /// First page of the collection's items of the given types, most
    /// recently modified first.
    pub fn get_collection_items(
        &self,
        collection_id: &str,
        item_types: &[&str],
        limit: u32,
        offset: u32,
    ) -> Result<AssetPage, SyncError> {
        info!(collection_id, ?item_types, "getting Kobo collection items");
        let request = self
            .client
            .build_collection_items(collection_id, item_types, limit, offset)?;
        let response = self.send("get_collection_items", request)?;
        self.client.parse_asset_page(&response)
    }

    pub fn get_all_collection_items(&self, collection_id: &str) -> Result<AssetPage, SyncError> {
        self.get_collection_items(collection_id, &DEFAULT_ITEM_TYPES, DEFAULT_PAGE_LIMIT, 0)
    }

    pub fn get_question_blocks(&self, collection_id: &str) -> Result<AssetPage, SyncError> {
        info!(collection_id, "getting Kobo question blocks");
        self.get_collection_items(collection_id, &["question"], DEFAULT_PAGE_LIMIT, 0)
    }

    /// Create a new block under `collection_id` with a fresh list name.
    pub fn create_question_block(
        &self,
        collection_id: &str,
        question: &QuestionSpec,
        choices: &[Choice],
    ) -> Result<Asset, SyncError> {
        info!(collection_id, "creating question block");
        let list_name = new_list_name();
        let payload = self
            .client
            .block_payload(collection_id, &list_name, question, choices);
        let response = self.send(
            "create_question_block",
            self.client.build_create_block(&payload)?,
        )?;
        self.client.parse_asset(&response)
    }

    /// Replace the content of an existing block.
    ///
    /// The block's current `select_from_list_name` and parent collection are
    /// read first and reused: Kobo ties choices to the question by that
    /// name, so it must not change across updates. Only those two fields of
    /// the existing block are looked at.
    pub fn update_question_block(
        &self,
        block_id: &str,
        question: &QuestionSpec,
        choices: &[Choice],
    ) -> Result<Asset, SyncError> {
        info!(block_id, "updating question block");
        let response = self.send("get_asset", self.client.build_get_asset(block_id)?)?;
        let existing = self.client.parse_value(&response)?;

        let list_name = existing
            .pointer("/content/survey/0/select_from_list_name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SyncError::UnexpectedAsset(format!(
                    "{block_id} has no content.survey[0].select_from_list_name"
                ))
            })?
            .to_string();
        let collection_id = existing
            .get("parent")
            .and_then(Value::as_str)
            .and_then(collection_id_from_parent)
            .ok_or_else(|| SyncError::UnexpectedAsset(format!("{block_id} has no parent")))?
            .to_string();

        let payload = self
            .client
            .block_payload(&collection_id, &list_name, question, choices);
        let response = self.send(
            "update_question_block",
            self.client.build_update_block(block_id, &payload)?,
        )?;
        self.client.parse_asset(&response)
    }

    pub fn create_collection(
        &self,
        name: &str,
        settings: CollectionSettings,
    ) -> Result<Asset, SyncError> {
        info!(collection_name = name, "creating Kobo collection");
        let payload = KoboClient::collection_payload(name, settings);
        let response = self.send(
            "create_collection",
            self.client.build_create_collection(&payload)?,
        )?;
        self.client.parse_asset(&response)
    }
}
