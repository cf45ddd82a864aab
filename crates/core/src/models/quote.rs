use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point-in-time price snapshot for one symbol.
///
/// Fetched fresh every refresh cycle. Never persisted by the core itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub current_price: f64,
    /// Absolute change versus the previous close
    pub change: f64,
    /// Percentage change versus the previous close (e.g. 1.25 for +1.25%)
    pub change_percent: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub previous_close: f64,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Build a quote from the price and previous close, deriving the change fields.
    pub fn from_prices(
        symbol: impl Into<String>,
        current_price: f64,
        previous_close: f64,
        open: f64,
        high: f64,
        low: f64,
    ) -> Self {
        let change = current_price - previous_close;
        let change_percent = if previous_close != 0.0 {
            change / previous_close * 100.0
        } else {
            0.0
        };
        Self {
            symbol: symbol.into(),
            current_price,
            change,
            change_percent,
            high,
            low,
            open,
            previous_close,
            timestamp: Utc::now(),
        }
    }

    /// A price that can be used for valuation: finite and non-negative.
    pub fn is_valid(&self) -> bool {
        self.current_price.is_finite() && self.current_price >= 0.0
    }
}
