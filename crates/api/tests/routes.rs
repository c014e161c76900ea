//! In-process tests for the HTTP surface. The router is driven through
//! `tower::ServiceExt::oneshot` against an in-memory store; no sockets, no Postgres.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use ratings_api::{build_router, AppState, IngestTrigger};
use ratings_core::domain::rating::{NewStockRating, StockRating};
use ratings_core::ingest::types::RawRatingsPage;
use ratings_core::ingest::{IngestOutcome, IngestRunner, Ingestor, RatingsSource, SourceError};
use ratings_core::query::{StockFilter, StockQueryService};
use ratings_core::scoring::WeightTable;
use ratings_core::storage::{MemoryStockStore, StockStore};
use serde_json::Value;
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Upstream that is never reachable.
struct UnreachableSource;

#[async_trait::async_trait]
impl RatingsSource for UnreachableSource {
    fn source_name(&self) -> &'static str {
        "unreachable"
    }

    async fn fetch_page(&self, _cursor: Option<&str>) -> Result<RawRatingsPage, SourceError> {
        Err(SourceError::Request("connection refused".to_string()))
    }
}

/// Store whose every call fails.
struct BrokenStore;

#[async_trait::async_trait]
impl StockStore for BrokenStore {
    async fn upsert_ratings(&self, _records: &[NewStockRating]) -> anyhow::Result<u64> {
        anyhow::bail!("db is down: password authentication failed for user \"ratings\"")
    }

    async fn latest_ratings(&self, _filter: &StockFilter) -> anyhow::Result<Vec<StockRating>> {
        anyhow::bail!("db is down: password authentication failed for user \"ratings\"")
    }
}

/// Runner that blocks until released, to observe the in-flight guard.
struct GatedRunner {
    gate: tokio::sync::Notify,
}

#[async_trait::async_trait]
impl IngestRunner for GatedRunner {
    async fn run_once(&self) -> anyhow::Result<IngestOutcome> {
        self.gate.notified().await;
        Ok(IngestOutcome::Skipped)
    }
}

/// Runner whose task panics mid-run.
struct PanickingRunner;

#[async_trait::async_trait]
impl IngestRunner for PanickingRunner {
    async fn run_once(&self) -> anyhow::Result<IngestOutcome> {
        panic!("ratings payload blew up the decoder");
    }
}

fn rating(
    ticker: &str,
    time: &str,
    target_to: &str,
    rating_from: &str,
    brokerage: &str,
) -> NewStockRating {
    NewStockRating {
        ticker: ticker.to_string(),
        company: format!("{ticker} Incorporated"),
        target_from: 100.0,
        target_to: target_to.parse().unwrap(),
        action: "upgraded by".to_string(),
        brokerage: brokerage.to_string(),
        rating_from: rating_from.to_string(),
        rating_to: "Buy".to_string(),
        time: time.to_string(),
    }
}

async fn seeded_store() -> Arc<MemoryStockStore> {
    let store = Arc::new(MemoryStockStore::new());
    store
        .upsert_ratings(&[
            rating("AAPL", "2025-01-10T00:00:00Z", "105", "Neutral", "Bank of America"),
            rating("AAPL", "2025-01-12T00:00:00Z", "150", "Sell", "The Goldman Sachs Group"),
            rating("MSFT", "2025-01-11T00:00:00Z", "90", "Neutral", "Evercore ISI"),
            rating("TSLA", "2025-01-09T00:00:00Z", "104", "Neutral", "JPMorgan Chase"),
        ])
        .await
        .unwrap();
    store
}

fn state_with(store: Arc<dyn StockStore>) -> AppState {
    let ingestor = Ingestor::new(UnreachableSource, Arc::clone(&store), 5)
        .with_page_delay(Duration::ZERO);
    AppState {
        queries: StockQueryService::new(store),
        weights: Arc::new(WeightTable::default_table()),
        ingest: IngestTrigger::new(Arc::new(ingestor)),
    }
}

async fn call(router: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let bytes = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body is not valid JSON")
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// ---------------------------------------------------------------------------
// GET /stocks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stocks_returns_latest_row_per_ticker_newest_first() {
    let router = build_router(state_with(seeded_store().await));

    let (status, json) = call(router, get("/stocks")).await;
    assert_eq!(status, StatusCode::OK);

    let tickers: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["ticker"].as_str().unwrap())
        .collect();
    assert_eq!(tickers, vec!["AAPL", "MSFT", "TSLA"]);
    assert_eq!(json["metadata"]["total_records"], 3);
    assert_eq!(json["metadata"]["last_update"], "2025-01-12T00:00:00Z");
    assert_eq!(json["metadata"]["filters_applied"]["ticker"], false);
}

#[tokio::test]
async fn ticker_filter_returns_only_the_latest_row() {
    let router = build_router(state_with(seeded_store().await));

    let (status, json) = call(router, get("/stocks?ticker=AAPL")).await;
    assert_eq!(status, StatusCode::OK);

    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["time"], "2025-01-12T00:00:00Z");
    assert_eq!(data[0]["brokerage"], "The Goldman Sachs Group");
    assert_eq!(data[0]["target_to"], 150.0);
    assert_eq!(json["metadata"]["filters_applied"]["ticker"], true);
}

#[tokio::test]
async fn company_and_brokerage_filters_are_case_insensitive() {
    let router = build_router(state_with(seeded_store().await));

    let (status, json) = call(router, get("/stocks?company=msft%20inc&brokerage=EVERCORE")).await;
    assert_eq!(status, StatusCode::OK);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["ticker"], "MSFT");
}

#[tokio::test]
async fn no_match_is_an_empty_200() {
    let router = build_router(state_with(seeded_store().await));

    let (status, json) = call(router, get("/stocks?ticker=ZZZZ")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"], serde_json::json!([]));
    assert_eq!(json["metadata"]["total_records"], 0);
    assert!(json["metadata"]["last_update"].is_null());
}

#[tokio::test]
async fn oversized_filters_are_rejected_with_400() {
    let router = build_router(state_with(seeded_store().await));
    let (status, json) = call(router, get("/stocks?ticker=ABCDEFGHIJK")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("ticker"));

    let long = "a".repeat(101);
    let router = build_router(state_with(seeded_store().await));
    let (status, _) = call(router, get(&format!("/stocks?company={long}"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn storage_failures_are_a_generic_500() {
    let router = build_router(state_with(Arc::new(BrokenStore)));

    let (status, json) = call(router, get("/stocks")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "internal error");

    let router = build_router(state_with(Arc::new(BrokenStore)));
    let (status, json) = call(router, get("/stocks/recommendations")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!json.to_string().contains("password"));
}

// ---------------------------------------------------------------------------
// GET /stocks/recommendations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn recommendations_are_sorted_by_score() {
    let router = build_router(state_with(seeded_store().await));

    let (status, json) = call(router, get("/stocks/recommendations")).await;
    assert_eq!(status, StatusCode::OK);

    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 3);

    // AAPL: 5 (+50) + 3 (Sell -> Buy) + 2 (Goldman) = 10
    assert_eq!(data[0]["stock"]["ticker"], "AAPL");
    assert_eq!(data[0]["score"], 10.0);
    assert_eq!(data[0]["recommendation"], "Strong Buy");

    // TSLA: 3 (+4) + 2 (Neutral -> Buy) + 1.5 (JPMorgan) = 6.5
    assert_eq!(data[1]["stock"]["ticker"], "TSLA");
    assert_eq!(data[1]["score"], 6.5);
    assert_eq!(data[1]["recommendation"], "Buy");

    // MSFT: 0 (-10) + 2 (Neutral -> Buy) + 0 = 2
    assert_eq!(data[2]["stock"]["ticker"], "MSFT");
    assert_eq!(data[2]["recommendation"], "Sell");
}

#[tokio::test]
async fn recommendations_on_an_empty_store_are_an_empty_200() {
    let router = build_router(state_with(Arc::new(MemoryStockStore::new())));
    let (status, json) = call(router, get("/stocks/recommendations")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"], serde_json::json!([]));
}

// ---------------------------------------------------------------------------
// POST /stocks/update
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_is_accepted_even_when_upstream_is_unreachable() {
    let store = seeded_store().await;
    let state = state_with(store.clone());
    let trigger = state.ingest.clone();

    let (status, json) = call(build_router(state), post("/stocks/update")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["already_running"], false);

    // The failed run must not affect stored data or later queries.
    for _ in 0..100 {
        if !trigger.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!trigger.is_running());
    assert_eq!(store.len().await, 4);
}

#[tokio::test]
async fn overlapping_updates_do_not_start_a_second_run() {
    let runner = Arc::new(GatedRunner {
        gate: tokio::sync::Notify::new(),
    });
    let store: Arc<dyn StockStore> = Arc::new(MemoryStockStore::new());
    let state = AppState {
        queries: StockQueryService::new(store),
        weights: Arc::new(WeightTable::default()),
        ingest: IngestTrigger::new(runner.clone()),
    };

    let (status, json) = call(build_router(state.clone()), post("/stocks/update")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["already_running"], false);

    let (status, json) = call(build_router(state.clone()), post("/stocks/update")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["already_running"], true);

    runner.gate.notify_one();
}

#[tokio::test]
async fn a_panicking_run_does_not_block_later_updates() {
    let store: Arc<dyn StockStore> = Arc::new(MemoryStockStore::new());
    let state = AppState {
        queries: StockQueryService::new(store),
        weights: Arc::new(WeightTable::default()),
        ingest: IngestTrigger::new(Arc::new(PanickingRunner)),
    };
    let trigger = state.ingest.clone();

    let (status, json) = call(build_router(state.clone()), post("/stocks/update")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["already_running"], false);

    for _ in 0..100 {
        if !trigger.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!trigger.is_running());

    let (status, json) = call(build_router(state), post("/stocks/update")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["already_running"], false);
}

// ---------------------------------------------------------------------------
// Plumbing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn healthz_and_security_headers() {
    let router = build_router(state_with(Arc::new(MemoryStockStore::new())));
    let resp = router.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
    assert_eq!(resp.headers()["cache-control"], "no-store");
}
