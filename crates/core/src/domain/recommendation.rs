use crate::domain::rating::StockRating;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationLabel {
    #[serde(rename = "Strong Buy")]
    StrongBuy,
    #[serde(rename = "Buy")]
    Buy,
    #[serde(rename = "Hold")]
    Hold,
    #[serde(rename = "Sell")]
    Sell,
}

impl RecommendationLabel {
    pub const STRONG_BUY_THRESHOLD: f64 = 7.0;
    pub const BUY_THRESHOLD: f64 = 5.0;
    pub const HOLD_THRESHOLD: f64 = 3.0;

    pub fn from_score(score: f64) -> Self {
        if score >= Self::STRONG_BUY_THRESHOLD {
            Self::StrongBuy
        } else if score >= Self::BUY_THRESHOLD {
            Self::Buy
        } else if score >= Self::HOLD_THRESHOLD {
            Self::Hold
        } else {
            Self::Sell
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StrongBuy => "Strong Buy",
            Self::Buy => "Buy",
            Self::Hold => "Hold",
            Self::Sell => "Sell",
        }
    }
}

impl std::fmt::Display for RecommendationLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived on every request; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub stock: StockRating,
    pub score: f64,
    pub recommendation: RecommendationLabel,
}
