//! Block lifecycle test against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then exercises the fetcher and
//! every Kobo operation over real HTTP through `UreqTransport`.

use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;

use ckan_kobo_core::{
    fetch_choice_map, Choice, CollectionSettings, DiagnosticStore, KoboApi, KoboClient,
    QuestionSpec, SyncError, UreqTransport,
};
use mock_server::{Db, MockState, CKAN_TOKEN, KOBO_TOKEN};
use tokio::sync::RwLock;

/// Spawn the mock server on its own runtime thread and return its address.
fn start_server(state: MockState) -> (String, Db) {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();
    let db: Db = Arc::new(RwLock::new(state));
    let server_db = db.clone();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run_with_state(listener, server_db).await
        })
        .unwrap();
    });

    (format!("http://{addr}"), db)
}

#[test]
fn block_lifecycle() {
    let mut state = MockState::default();
    state.add_collection("cCountries", "Countries");
    state.add_dataset("countries.csv", "ISO3,Name\nFRA,France\nUSA,USA\nFRA,République française\n");
    let (base, db) = start_server(state);
    let dir = tempfile::tempdir().unwrap();
    let store = DiagnosticStore::new(dir.path());

    // Step 1: fetch the CSV from the CKAN endpoint.
    let dataset_url = format!("{base}/ckan/countries.csv");
    let map = fetch_choice_map(
        &UreqTransport::new(),
        &store,
        &dataset_url,
        CKAN_TOKEN,
        "ISO3",
        "Name",
        false,
    )
    .unwrap();
    let entries: Vec<_> = map.iter().collect();
    assert_eq!(entries, vec![("FRA", "République française"), ("USA", "USA")]);
    assert!(store.cache_path(&dataset_url).is_file());

    // Step 2: collection lookup.
    let api = KoboApi::new(
        KoboClient::new(&format!("{base}/"), KOBO_TOKEN),
        UreqTransport::new(),
        store.clone(),
    );
    let collection = api.get_collection("cCountries").unwrap();
    assert_eq!(collection.owner_username.as_deref(), Some(mock_server::OWNER));

    // Step 3: create a block.
    let choices: Vec<Choice> = map.iter().map(|(code, label)| Choice::new(code, label)).collect();
    let created = api
        .create_question_block("cCountries", &QuestionSpec::select_one("Country"), &choices)
        .unwrap();
    let content = created.content.clone().unwrap();
    let list_name = content.list_name().unwrap().to_string();
    assert!(list_name.starts_with("unique_list_name_"));
    assert_eq!(content.choices.len(), 2);
    assert_eq!(
        created.parent.as_deref(),
        Some(format!("{base}/api/v2/assets/cCountries/").as_str())
    );

    // Step 4: the block is listed under the collection.
    let page = api
        .get_collection_items("cCountries", &["block"], 100, 0)
        .unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].uid, created.uid);
    assert_eq!(api.get_question_blocks("cCountries").unwrap().count, 0);
    assert_eq!(api.get_all_collection_items("cCountries").unwrap().count, 1);

    // Step 5: update keeps the list name.
    let updated = api
        .update_question_block(
            &created.uid,
            &QuestionSpec::select_one("Country of residence"),
            &[Choice::new("KEN", "Kenya")],
        )
        .unwrap();
    let content = updated.content.unwrap();
    assert_eq!(content.list_name(), Some(list_name.as_str()));
    assert_eq!(content.survey[0].label, "Country of residence");
    assert_eq!(content.choices, vec![Choice {
        label: "Kenya".to_string(),
        name: "KEN".to_string(),
        list_name: Some(list_name.clone()),
    }]);

    // Step 6: a supplementary collection.
    let collection = api
        .create_collection("Regions", CollectionSettings::default())
        .unwrap();
    assert!(collection.uid.starts_with('c'));

    // Step 7: unknown block.
    let err = api
        .update_question_block("bMissing", &QuestionSpec::select_one("x"), &[])
        .unwrap_err();
    assert!(matches!(err, SyncError::Http { status: 404, .. }));

    let state = db.blocking_read();
    assert_eq!(state.count_requests("GET", "/ckan/countries.csv"), 1);
    assert_eq!(state.count_requests("POST", "/api/v2/assets/"), 2);
    assert_eq!(
        state.count_requests("PUT", &format!("/api/v2/assets/{}/", created.uid)),
        1
    );
    assert!(dir
        .path()
        .join("post-create_question_block--api-v2-assets-.json")
        .is_file());
}

#[test]
fn wrong_kobo_token_is_an_http_error() {
    let (base, _db) = start_server(MockState::default());
    let dir = tempfile::tempdir().unwrap();
    let api = KoboApi::new(
        KoboClient::new(&base, "wrong"),
        UreqTransport::new(),
        DiagnosticStore::new(dir.path()),
    );
    let err = api.get_collection("anything").unwrap_err();
    assert!(matches!(err, SyncError::Http { status: 401, .. }));
}

#[test]
fn unreachable_host_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let api = KoboApi::new(
        KoboClient::new(&format!("http://{addr}"), KOBO_TOKEN),
        UreqTransport::new(),
        DiagnosticStore::new(dir.path()),
    );
    let err = api.get_collection("anything").unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
}

/// Serve one canned response with the given headers over plain TCP.
fn serve_once(content_type: &'static str, body: &'static [u8]) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
            line.clear();
        }
        let mut stream = reader.into_inner();
        write!(
            stream,
            "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .unwrap();
        stream.write_all(body).unwrap();
    });
    format!("http://{addr}/dataset/countries.csv")
}

#[test]
fn latin1_resource_keeps_accented_labels() {
    let url = serve_once(
        "text/csv; charset=ISO-8859-1",
        b"ISO3,Name\nCIV,C\xf4te d'Ivoire\n",
    );
    let dir = tempfile::tempdir().unwrap();
    let store = DiagnosticStore::new(dir.path());

    let map = fetch_choice_map(&UreqTransport::new(), &store, &url, CKAN_TOKEN, "ISO3", "Name", false)
        .unwrap();
    assert_eq!(map.get("CIV"), Some("Côte d'Ivoire"));
    let cached = std::fs::read_to_string(store.cache_path(&url)).unwrap();
    assert!(cached.contains("Côte d'Ivoire"));
}

#[test]
fn undeclared_non_utf8_resource_is_rejected() {
    let url = serve_once("text/csv", b"ISO3,Name\nCIV,C\xf4te d'Ivoire\n");
    let dir = tempfile::tempdir().unwrap();
    let store = DiagnosticStore::new(dir.path());

    let err = fetch_choice_map(&UreqTransport::new(), &store, &url, CKAN_TOKEN, "ISO3", "Name", false)
        .unwrap_err();
    assert!(matches!(err, SyncError::Decode { .. }));
    assert!(!store.cache_path(&url).exists());
}
