use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::{normalize_symbol, AssetType};

/// A single position in a user's portfolio, as stored by the CRUD layer.
///
/// The core only reads holdings. Quantity and average cost change only
/// through external mutations of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    /// Ticker symbol, uppercased (e.g., "AAPL")
    pub symbol: String,

    /// Units held
    pub quantity: f64,

    /// Average cost per unit paid
    pub average_cost: f64,

    /// Asset category of the holding
    #[serde(default)]
    pub asset_type: AssetType,

    /// Sector as recorded on the asset, if any. When missing, the reference
    /// table's sector is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
}

impl Holding {
    pub fn new(symbol: impl AsRef<str>, quantity: f64, average_cost: f64) -> Self {
        Self {
            symbol: normalize_symbol(symbol.as_ref()),
            quantity,
            average_cost,
            asset_type: AssetType::Stock,
            sector: None,
        }
    }

    pub fn with_asset_type(mut self, asset_type: AssetType) -> Self {
        self.asset_type = asset_type;
        self
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    /// Total amount paid for the position: quantity × average cost.
    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.average_cost
    }
}

/// Total portfolio value recorded at a point in time (historical series).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    pub recorded_at: DateTime<Utc>,
    pub total_value: f64,
}
