//! Core of the CKAN → Kobo choice-list sync.
//!
//! # Overview
//! Fetches a CSV resource from a CKAN/NDX portal, maps two of its columns to
//! an ordered code → label list, and creates or updates a single-question
//! block in a Kobo collection through Kobo's v2 asset API.
//!
//! # Design
//! - `KoboClient` is stateless: it builds `HttpRequest` values and parses
//!   `HttpResponse` values without touching the network.
//! - `KoboApi` and `fetch_choice_map` run requests through a `Transport`;
//!   `UreqTransport` is the blocking implementation, tests swap in their own.
//! - Everything written to disk (CSV cache, response dumps) goes through
//!   `DiagnosticStore`.

pub mod api;
pub mod ckan;
pub mod client;
pub mod error;
pub mod http;
pub mod store;
pub mod types;

pub use api::KoboApi;
pub use ckan::{fetch_choice_map, parse_choice_map, ChoiceMap};
pub use client::{KoboClient, Payload};
pub use error::SyncError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use store::DiagnosticStore;
pub use types::{Asset, AssetPage, Choice, CollectionSettings, QuestionSpec};
