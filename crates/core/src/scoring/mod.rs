use crate::domain::rating::StockRating;
use crate::domain::recommendation::{Recommendation, RecommendationLabel};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const PRICE_INCREASE_SCORE: f64 = 3.0;
pub const LARGE_PRICE_INCREASE_BONUS: f64 = 2.0;
pub const LARGE_PRICE_INCREASE_THRESHOLD: f64 = 10.0;

// (rating_from, rating_to, score). Fixed data; pairs not listed score 0.
const RATING_TRANSITIONS: &[(&str, &str, f64)] = &[
    ("Sell", "Buy", 3.0),
    ("Neutral", "Buy", 2.0),
    ("Sell", "Neutral", 1.0),
    ("Market Perform", "Buy", 3.0),
    ("Market Perform", "Neutral", 2.0),
    ("Market Perform", "Sell", 1.0),
    ("Market Perform", "Market Perform", 3.0),
    ("Market Perform", "Underweight", 2.0),
    ("Market Perform", "Overweight", 1.0),
    ("Underweight", "Buy", 3.0),
    ("Underweight", "Neutral", 2.0),
    ("Underweight", "Sell", 1.0),
    ("Underweight", "Market Perform", 3.0),
    ("Underweight", "Underweight", 2.0),
    ("Underweight", "Overweight", 1.0),
    ("Overweight", "Buy", 3.0),
    ("Overweight", "Neutral", 2.0),
    ("Overweight", "Sell", 1.0),
    ("Overweight", "Market Perform", 3.0),
    ("Overweight", "Underweight", 2.0),
    ("Overweight", "Overweight", 1.0),
];

/// Reputation bonus for a brokerage, keyed by its exact name.
pub trait BrokerageWeights: Send + Sync {
    fn weight(&self, brokerage: &str) -> f64;
}

impl<F> BrokerageWeights for F
where
    F: Fn(&str) -> f64 + Send + Sync,
{
    fn weight(&self, brokerage: &str) -> f64 {
        self(brokerage)
    }
}

/// Map-backed weights; unknown brokerages weigh 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightTable(HashMap<String, f64>);

impl WeightTable {
    pub fn new(weights: HashMap<String, f64>) -> Self {
        Self(weights)
    }

    pub fn default_table() -> Self {
        Self(HashMap::from([
            ("The Goldman Sachs Group".to_string(), 2.0),
            ("JPMorgan Chase".to_string(), 1.5),
            ("Bank of America".to_string(), 1.0),
        ]))
    }

    /// Parses a JSON object of `name -> weight`. Weights must be finite.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let table: HashMap<String, f64> = serde_json::from_str(raw)
            .context("brokerage weights must be a JSON object of numbers")?;
        for (name, weight) in &table {
            anyhow::ensure!(
                weight.is_finite(),
                "brokerage weight for {name:?} must be finite"
            );
        }
        Ok(Self(table))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl BrokerageWeights for WeightTable {
    fn weight(&self, brokerage: &str) -> f64 {
        self.0.get(brokerage).copied().unwrap_or(0.0)
    }
}

/// 0 when the target did not rise, 3 for a rise up to 10, 5 above that.
pub fn price_impact(record: &StockRating) -> f64 {
    let delta = record.target_to - record.target_from;
    if delta > LARGE_PRICE_INCREASE_THRESHOLD {
        PRICE_INCREASE_SCORE + LARGE_PRICE_INCREASE_BONUS
    } else if delta > 0.0 {
        PRICE_INCREASE_SCORE
    } else {
        0.0
    }
}

pub fn rating_impact(record: &StockRating) -> f64 {
    rating_transition_score(&record.rating_from, &record.rating_to)
}

pub fn rating_transition_score(from: &str, to: &str) -> f64 {
    RATING_TRANSITIONS
        .iter()
        .find(|(f, t, _)| *f == from && *t == to)
        .map(|(_, _, score)| *score)
        .unwrap_or(0.0)
}

pub fn score<W>(record: &StockRating, weights: &W) -> f64
where
    W: BrokerageWeights + ?Sized,
{
    price_impact(record) + rating_impact(record) + weights.weight(&record.brokerage)
}

/// Scores and labels every record, highest score first. Equal scores keep their input order.
pub fn recommend<W>(records: Vec<StockRating>, weights: &W) -> Vec<Recommendation>
where
    W: BrokerageWeights + ?Sized,
{
    let mut out: Vec<Recommendation> = records
        .into_iter()
        .map(|stock| {
            let score = score(&stock, weights);
            Recommendation {
                stock,
                score,
                recommendation: RecommendationLabel::from_score(score),
            }
        })
        .collect();

    // `sort_by` is stable.
    out.sort_by(|a, b| b.score.total_cmp(&a.score));
    out
}
