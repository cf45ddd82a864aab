use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::AssetType;
use crate::errors::CoreError;

// ── Performance ─────────────────────────────────────────────────────

/// Look-back window for the period return in a performance request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PerformancePeriod {
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
    #[default]
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "ALL")]
    All,
}

impl PerformancePeriod {
    /// Number of days to look back, `None` for the whole history.
    pub fn lookback_days(&self) -> Option<i64> {
        match self {
            PerformancePeriod::OneDay => Some(1),
            PerformancePeriod::OneWeek => Some(7),
            PerformancePeriod::OneMonth => Some(30),
            PerformancePeriod::ThreeMonths => Some(90),
            PerformancePeriod::SixMonths => Some(180),
            PerformancePeriod::OneYear => Some(365),
            PerformancePeriod::All => None,
        }
    }
}

impl std::fmt::Display for PerformancePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PerformancePeriod::OneDay => write!(f, "1D"),
            PerformancePeriod::OneWeek => write!(f, "1W"),
            PerformancePeriod::OneMonth => write!(f, "1M"),
            PerformancePeriod::ThreeMonths => write!(f, "3M"),
            PerformancePeriod::SixMonths => write!(f, "6M"),
            PerformancePeriod::OneYear => write!(f, "1Y"),
            PerformancePeriod::All => write!(f, "ALL"),
        }
    }
}

impl std::str::FromStr for PerformancePeriod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "1D" => Ok(PerformancePeriod::OneDay),
            "1W" => Ok(PerformancePeriod::OneWeek),
            "1M" => Ok(PerformancePeriod::OneMonth),
            "3M" => Ok(PerformancePeriod::ThreeMonths),
            "6M" => Ok(PerformancePeriod::SixMonths),
            "1Y" => Ok(PerformancePeriod::OneYear),
            "ALL" => Ok(PerformancePeriod::All),
            other => Err(CoreError::InvalidPeriod(other.to_string())),
        }
    }
}

/// Where a holding's valuation price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// A quote fetched this cycle
    Live,
    /// No quote available; average cost used instead
    CostBasis,
}

/// Performance of a single holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingPerformance {
    pub symbol: String,
    pub asset_type: AssetType,
    pub quantity: f64,
    pub average_cost: f64,
    pub current_price: f64,
    pub cost_basis: f64,
    pub current_value: f64,
    pub gain_loss: f64,
    pub gain_loss_percent: f64,
    pub day_change: f64,
    pub allocation_percent: f64,
    pub price_source: PriceSource,
}

/// Change in total portfolio value over the requested period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodReturn {
    pub start_date: DateTime<Utc>,
    pub start_value: f64,
    pub end_value: f64,
    pub absolute_return: f64,
    pub percent_return: f64,
}

/// Result of a performance request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceResult {
    pub period: PerformancePeriod,
    pub total_value: f64,
    pub total_cost: f64,
    pub total_gain_loss: f64,
    pub total_gain_loss_percent: f64,
    pub day_change: f64,
    pub day_change_percent: f64,
    /// Every holding, in input order
    pub holdings: Vec<HoldingPerformance>,
    /// Largest holdings by current value (symbol breaks ties)
    pub top_holdings: Vec<HoldingPerformance>,
    pub period_return: Option<PeriodReturn>,
    /// Symbols valued at cost basis because no quote was available
    pub warnings: Vec<String>,
}

// ── Allocation ──────────────────────────────────────────────────────

/// One slice of an allocation breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationSlice {
    pub label: String,
    pub value: f64,
    pub percent: f64,
}

/// Portfolio value split by asset type, sector and holding.
/// Each list is ordered by value (largest first), label breaking ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationBreakdown {
    pub total_value: f64,
    pub by_asset_type: Vec<AllocationSlice>,
    pub by_sector: Vec<AllocationSlice>,
    pub by_holding: Vec<AllocationSlice>,
}

impl AllocationBreakdown {
    /// Percentage held in an asset type, 0 when absent.
    pub fn asset_type_percent(&self, asset_type: AssetType) -> f64 {
        let label = asset_type.to_string();
        self.by_asset_type
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.percent)
            .unwrap_or(0.0)
    }
}

// ── Risk ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcentrationLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for ConcentrationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConcentrationLevel::Low => write!(f, "Low"),
            ConcentrationLevel::Medium => write!(f, "Medium"),
            ConcentrationLevel::High => write!(f, "High"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcentrationRisk {
    pub level: ConcentrationLevel,
    pub largest_sector: Option<String>,
    /// Weight of the largest sector, in percent
    pub largest_sector_weight: f64,
    pub recommendation: String,
}

/// Risk figures for a portfolio. Percent-valued fields are annualized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetrics {
    pub concentration_risk: ConcentrationRisk,
    /// Σ(sector weight²), 0..=1
    pub herfindahl_index: f64,
    /// (1 − HHI) × 100
    pub diversification_score: f64,
    pub portfolio_beta: f64,
    pub sharpe_ratio: f64,
    /// Largest peak-to-trough decline of the value history, in percent
    pub max_drawdown: f64,
    /// One-day 95% value at risk, in currency
    pub var95: f64,
    pub expected_volatility: f64,
    pub portfolio_return: f64,
    pub sector_weights: Vec<AllocationSlice>,
}

// ── What-if ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "buy"),
            TradeAction::Sell => write!(f, "sell"),
        }
    }
}

impl std::str::FromStr for TradeAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(TradeAction::Buy),
            "sell" => Ok(TradeAction::Sell),
            other => Err(CoreError::InvalidTrade(format!(
                "action must be 'buy' or 'sell', got '{other}'"
            ))),
        }
    }
}

/// A hypothetical trade to simulate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatIfRequest {
    pub action: TradeAction,
    pub symbol: String,
    pub quantity: f64,
    pub price: f64,
    /// Asset type for a symbol not yet held; defaults to the held position's
    /// type, then to stock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<AssetType>,
}

impl WhatIfRequest {
    pub fn new(action: TradeAction, symbol: impl Into<String>, quantity: f64, price: f64) -> Self {
        Self {
            action,
            symbol: symbol.into(),
            quantity,
            price,
            asset_type: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeDetails {
    pub action: TradeAction,
    pub symbol: String,
    pub quantity: f64,
    pub price: f64,
    pub notional: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionImpact {
    pub current_quantity: f64,
    pub new_quantity: f64,
    pub current_average_cost: f64,
    pub new_average_cost: f64,
    pub current_cost_basis: f64,
    pub new_cost_basis: f64,
    /// Gain/loss locked in by a sell at the trade price (0 for buys)
    pub realized_gain_loss: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioImpact {
    pub current_value: f64,
    pub new_value: f64,
    pub value_change: f64,
    /// Cash leaving (negative, buys) or entering (positive, sells) the account
    pub cash_flow: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationChange {
    pub asset_type: AssetType,
    pub current_percent: f64,
    pub new_percent: f64,
    pub change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskImpact {
    pub current_position_weight: f64,
    pub new_position_weight: f64,
    pub weight_change: f64,
    pub assessment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnEstimateSource {
    /// The symbol is in the reference table
    Reference,
    /// Unknown symbol; generic market estimate
    IndustryAverage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedReturns {
    pub annual_return_percent: f64,
    pub projected_position_value: f64,
    pub projected_gain: f64,
    pub source: ReturnEstimateSource,
}

/// Projected impact of a hypothetical trade. Never applied to stored holdings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatIfResult {
    pub trade_details: TradeDetails,
    pub position_impact: PositionImpact,
    pub portfolio_impact: PortfolioImpact,
    pub allocation_impact: Vec<AllocationChange>,
    pub risk_impact: RiskImpact,
    pub expected_returns: ExpectedReturns,
}
