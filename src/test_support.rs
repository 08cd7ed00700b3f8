//! In-process stand-in for the ERP API used by the async tests.

use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::erp::{ErpClient, ErpConfig};

#[derive(Debug, Default)]
pub struct MockErpState {
    pub bin_locations: Value,
    pub batches: HashMap<String, Value>,
    pub fail_bin_locations: bool,
    pub fail_search: bool,
    pub fail_transfer: bool,
    /// Answer the memo endpoint with an empty object
    pub memo_unavailable: bool,
    pub memo_counter: u32,
    pub search_requests: u32,
    pub transfer_posts: Vec<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct MockErp {
    pub state: Arc<Mutex<MockErpState>>,
}

impl MockErp {
    /// Locations for WH1/WH2 and one batch `BATCH001` with bins WH1-A1 (5) and WH1-A2 (3)
    pub fn with_sample_data() -> Self {
        let erp = MockErp::default();
        {
            let mut state = erp.state.lock().unwrap();
            state.bin_locations = json!({
                "value": [
                    { "Warehouse": "WH1", "BinCode": "WH1-A1", "AbsEntry": 11 },
                    { "Warehouse": "WH1", "BinCode": "WH1-A2", "AbsEntry": 12 },
                    { "Warehouse": "WH2", "BinCode": "WH2-B1", "AbsEntry": 21 },
                    { "Warehouse": "WH2", "BinCode": "WH2-B2", "AbsEntry": 22 }
                ]
            });
            state.batches.insert(
                "BATCH001".to_string(),
                json!([
                    {
                        "ItemCode": "RM-100", "ItemName": "Flour", "DistNumber": "BATCH001",
                        "WhsCode": "WH1", "BinCode": "WH1-A1", "OnHandQty": 5.0
                    },
                    {
                        "ItemCode": "RM-100", "ItemName": "Flour", "DistNumber": "BATCH001",
                        "WhsCode": "WH1", "BinCode": "WH1-A2", "OnHandQty": 3.0
                    }
                ]),
            );
        }
        erp
    }

    pub fn search_requests(&self) -> u32 {
        self.state.lock().unwrap().search_requests
    }

    pub fn transfer_posts(&self) -> Vec<Value> {
        self.state.lock().unwrap().transfer_posts.clone()
    }

    /// Serve the mock on an ephemeral port and return a client pointed at it
    pub async fn spawn(&self) -> ErpClient {
        let app = Router::new()
            .route("/api/binlocations", post(bin_locations))
            .route("/api/batchinbin", post(batch_in_bin))
            .route("/api/nextavailablejournalmemo", post(next_journal_memo))
            .route("/api/stocktransfer", post(stock_transfer))
            .with_state(self.state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        ErpClient::new(ErpConfig {
            base_url: format!("http://{addr}/api"),
            connect_timeout_secs: 2,
        })
        .unwrap()
    }
}

type Shared = Arc<Mutex<MockErpState>>;

async fn bin_locations(State(state): State<Shared>) -> Result<Json<Value>, StatusCode> {
    let state = state.lock().unwrap();
    if state.fail_bin_locations {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(state.bin_locations.clone()))
}

async fn batch_in_bin(
    State(state): State<Shared>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let mut state = state.lock().unwrap();
    state.search_requests += 1;
    if state.fail_search {
        return Err(StatusCode::BAD_GATEWAY);
    }
    let batch = body["BatchNumber"].as_str().unwrap_or_default();
    let value = state.batches.get(batch).cloned().unwrap_or_else(|| json!([]));
    Ok(Json(json!({ "value": value })))
}

async fn next_journal_memo(State(state): State<Shared>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    if state.memo_unavailable {
        return Json(json!({}));
    }
    state.memo_counter += 1;
    Json(json!({ "NextJournalMemo": format!("JM-{:04}", state.memo_counter) }))
}

async fn stock_transfer(
    State(state): State<Shared>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let mut state = state.lock().unwrap();
    state.transfer_posts.push(body);
    if state.fail_transfer {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let doc_entry = 4700 + state.transfer_posts.len() as i64;
    Ok(Json(json!({ "DocEntry": doc_entry, "DocNum": doc_entry })))
}
