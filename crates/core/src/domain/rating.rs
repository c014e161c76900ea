use serde::{Deserialize, Serialize};

/// A stored analyst rating. `(ticker, time)` is the natural key; `id` is assigned by the store
/// and grows with insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StockRating {
    pub id: i64,
    pub ticker: String,
    pub company: String,
    pub target_from: f64,
    pub target_to: f64,
    pub action: String,
    pub brokerage: String,
    pub rating_from: String,
    pub rating_to: String,
    /// Upstream observation timestamp, kept verbatim. Ordering is lexicographic.
    pub time: String,
}

/// A normalized upstream record that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStockRating {
    pub ticker: String,
    pub company: String,
    pub target_from: f64,
    pub target_to: f64,
    pub action: String,
    pub brokerage: String,
    pub rating_from: String,
    pub rating_to: String,
    pub time: String,
}

impl NewStockRating {
    pub fn into_stored(self, id: i64) -> StockRating {
        StockRating {
            id,
            ticker: self.ticker,
            company: self.company,
            target_from: self.target_from,
            target_to: self.target_to,
            action: self.action,
            brokerage: self.brokerage,
            rating_from: self.rating_from,
            rating_to: self.rating_to,
            time: self.time,
        }
    }

    pub fn same_key(&self, other: &StockRating) -> bool {
        self.ticker == other.ticker && self.time == other.time
    }
}
