use crate::domain::rating::{NewStockRating, StockRating};
use crate::query::StockFilter;
use anyhow::Context;
use std::collections::HashMap;

pub mod lock;
pub mod memory;
pub mod stock_ratings;

pub use memory::MemoryStockStore;
pub use stock_ratings::PgStockStore;

/// Persistence seam shared by ingestion and the query service.
#[async_trait::async_trait]
pub trait StockStore: Send + Sync {
    /// Inserts or updates every record keyed by `(ticker, time)` in one conflict-resolving
    /// write. Returns the number of rows written.
    async fn upsert_ratings(&self, records: &[NewStockRating]) -> anyhow::Result<u64>;

    /// Latest row per ticker, filtered, newest first.
    async fn latest_ratings(&self, filter: &StockFilter) -> anyhow::Result<Vec<StockRating>>;
}

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Collapses records sharing a `(ticker, time)` key so a single upsert statement never touches
/// the same row twice. The last occurrence wins; first-seen order is kept.
pub fn dedupe_by_key(records: &[NewStockRating]) -> Vec<&NewStockRating> {
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut out: Vec<&NewStockRating> = Vec::with_capacity(records.len());
    for record in records {
        let key = (record.ticker.as_str(), record.time.as_str());
        match index.get(&key) {
            Some(&pos) => out[pos] = record,
            None => {
                index.insert(key, out.len());
                out.push(record);
            }
        }
    }
    out
}
