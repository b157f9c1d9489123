use std::sync::Arc;

use mock_server::MockState;
use tokio::{net::TcpListener, sync::RwLock};

const SAMPLE_CSV: &str = "ISO3,Countries and Territories\nFRA,France\nUSA,United States\nKEN,Kenya\n";

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let collection = std::env::var("MOCK_COLLECTION_ID").unwrap_or_else(|_| "cMockCollection".to_string());

    let mut state = MockState::default();
    state.add_collection(&collection, "Mock collection");
    state.add_dataset("countries.csv", SAMPLE_CSV);

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("listening on {addr}");
    println!("  kobo token: {}  ckan token: {}", state.kobo_token, state.ckan_token);
    println!("  collection: {collection}  dataset: http://{addr}/ckan/countries.csv");
    mock_server::run_with_state(listener, Arc::new(RwLock::new(state))).await
}
