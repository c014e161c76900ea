use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use ratings_core::domain::rating::StockRating;
use ratings_core::domain::recommendation::Recommendation;
use serde::{Deserialize, Serialize};

pub async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Default, Deserialize)]
pub struct StocksParams {
    pub ticker: Option<String>,
    pub company: Option<String>,
    pub brokerage: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StocksResponse {
    pub data: Vec<StockRating>,
    pub metadata: StocksMetadata,
}

#[derive(Debug, Serialize)]
pub struct StocksMetadata {
    pub total_records: usize,
    /// Greatest observation time in `data`.
    pub last_update: Option<String>,
    pub filters_applied: FiltersApplied,
}

#[derive(Debug, Serialize)]
pub struct FiltersApplied {
    pub ticker: bool,
    pub company: bool,
    pub brokerage: bool,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub data: Vec<Recommendation>,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub message: &'static str,
    pub already_running: bool,
}

/// No match is a 200 with an empty `data` array, not a 404.
pub async fn list_stocks(
    State(state): State<AppState>,
    Query(params): Query<StocksParams>,
) -> Result<Json<StocksResponse>, ApiError> {
    let data = state
        .queries
        .query(
            params.ticker.as_deref(),
            params.company.as_deref(),
            params.brokerage.as_deref(),
        )
        .await?;

    let last_update = data.iter().map(|r| r.time.as_str()).max().map(str::to_string);
    let applied = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

    Ok(Json(StocksResponse {
        metadata: StocksMetadata {
            total_records: data.len(),
            last_update,
            filters_applied: FiltersApplied {
                ticker: applied(&params.ticker),
                company: applied(&params.company),
                brokerage: applied(&params.brokerage),
            },
        },
        data,
    }))
}

pub async fn list_recommendations(
    State(state): State<AppState>,
) -> Result<Json<RecommendationsResponse>, ApiError> {
    let data = state.queries.recommendations(state.weights.as_ref()).await?;
    Ok(Json(RecommendationsResponse { data }))
}

/// Always 202; ingestion outcome only shows up in logs and later queries.
pub async fn trigger_update(State(state): State<AppState>) -> (StatusCode, Json<UpdateResponse>) {
    let started = state.ingest.trigger();
    let body = if started {
        UpdateResponse {
            message: "stock data update started",
            already_running: false,
        }
    } else {
        UpdateResponse {
            message: "stock data update already running",
            already_running: true,
        }
    };
    (StatusCode::ACCEPTED, Json(body))
}
