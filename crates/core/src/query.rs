use crate::domain::rating::StockRating;
use crate::domain::recommendation::Recommendation;
use crate::scoring::{self, BrokerageWeights};
use crate::storage::StockStore;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const MAX_TICKER_LEN: usize = 10;
pub const MAX_TEXT_FILTER_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterError {
    pub field: &'static str,
    pub max_len: usize,
    pub actual_len: usize,
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "filter `{}` is too long ({} characters, max {})",
            self.field, self.actual_len, self.max_len
        )
    }
}

impl std::error::Error for FilterError {}

#[derive(Debug)]
pub enum QueryError {
    InvalidFilter(FilterError),
    Storage(anyhow::Error),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFilter(e) => write!(f, "invalid filter: {e}"),
            Self::Storage(e) => write!(f, "storage error: {e:#}"),
        }
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidFilter(e) => Some(e),
            Self::Storage(e) => Some(&**e),
        }
    }
}

impl From<FilterError> for QueryError {
    fn from(e: FilterError) -> Self {
        Self::InvalidFilter(e)
    }
}

/// Optional filters, combined with AND. Ticker is exact; company and brokerage are
/// case-insensitive substrings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockFilter {
    pub ticker: Option<String>,
    pub company: Option<String>,
    pub brokerage: Option<String>,
}

impl StockFilter {
    /// Trims every value, treats blanks as absent and enforces the length bounds.
    pub fn new(
        ticker: Option<&str>,
        company: Option<&str>,
        brokerage: Option<&str>,
    ) -> Result<Self, FilterError> {
        Ok(Self {
            ticker: bounded("ticker", ticker, MAX_TICKER_LEN)?,
            company: bounded("company", company, MAX_TEXT_FILTER_LEN)?,
            brokerage: bounded("brokerage", brokerage, MAX_TEXT_FILTER_LEN)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.ticker.is_none() && self.company.is_none() && self.brokerage.is_none()
    }

    pub fn matches(&self, row: &StockRating) -> bool {
        if let Some(ticker) = &self.ticker {
            if row.ticker != *ticker {
                return false;
            }
        }
        if let Some(company) = &self.company {
            if !contains_ignore_case(&row.company, company) {
                return false;
            }
        }
        if let Some(brokerage) = &self.brokerage {
            if !contains_ignore_case(&row.brokerage, brokerage) {
                return false;
            }
        }
        true
    }
}

fn bounded(
    field: &'static str,
    value: Option<&str>,
    max_len: usize,
) -> Result<Option<String>, FilterError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let actual_len = value.chars().count();
    if actual_len > max_len {
        return Err(FilterError {
            field,
            max_len,
            actual_len,
        });
    }
    Ok(Some(value.to_string()))
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Keeps one row per ticker: greatest `time`, then greatest `id`.
pub fn latest_per_ticker<I>(rows: I) -> Vec<StockRating>
where
    I: IntoIterator<Item = StockRating>,
{
    let mut latest: HashMap<String, StockRating> = HashMap::new();
    for row in rows {
        let newer = latest.get(&row.ticker).map_or(true, |current| {
            (row.time.as_str(), row.id) > (current.time.as_str(), current.id)
        });
        if newer {
            latest.insert(row.ticker.clone(), row);
        }
    }
    latest.into_values().collect()
}

/// Newest observation first; `id` breaks ties so the order is total.
pub fn sort_newest_first(rows: &mut [StockRating]) {
    rows.sort_by(|a, b| b.time.cmp(&a.time).then(b.id.cmp(&a.id)));
}

/// Reduce to the latest row per ticker, apply the filter, then order newest first.
pub fn select_latest(rows: Vec<StockRating>, filter: &StockFilter) -> Vec<StockRating> {
    let mut out: Vec<StockRating> = latest_per_ticker(rows)
        .into_iter()
        .filter(|row| filter.matches(row))
        .collect();
    sort_newest_first(&mut out);
    out
}

#[derive(Clone)]
pub struct StockQueryService {
    store: Arc<dyn StockStore>,
}

impl StockQueryService {
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store }
    }

    pub async fn query(
        &self,
        ticker: Option<&str>,
        company: Option<&str>,
        brokerage: Option<&str>,
    ) -> Result<Vec<StockRating>, QueryError> {
        let filter = StockFilter::new(ticker, company, brokerage)?;
        self.store
            .latest_ratings(&filter)
            .await
            .map_err(QueryError::Storage)
    }

    pub async fn query_all(&self) -> Result<Vec<StockRating>, QueryError> {
        self.store
            .latest_ratings(&StockFilter::default())
            .await
            .map_err(QueryError::Storage)
    }

    /// Scores the latest rating of every ticker, best first.
    pub async fn recommendations(
        &self,
        weights: &dyn BrokerageWeights,
    ) -> Result<Vec<Recommendation>, QueryError> {
        let latest = self.query_all().await?;
        Ok(scoring::recommend(latest, weights))
    }
}
