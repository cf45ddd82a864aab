use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use super::portfolio_service::{finite_or_zero, percent_of, PortfolioService, ValuedHolding};
use crate::errors::CoreError;
use crate::models::analytics::{
    AllocationBreakdown, AllocationChange, AllocationSlice, ConcentrationLevel, ConcentrationRisk,
    ExpectedReturns, HoldingPerformance, PerformancePeriod, PerformanceResult, PeriodReturn,
    PortfolioImpact, PositionImpact, PriceSource, ReturnEstimateSource, RiskImpact, RiskMetrics,
    TradeAction, TradeDetails, WhatIfRequest, WhatIfResult,
};
use crate::models::asset::{normalize_symbol, AssetType};
use crate::models::holding::{Holding, PortfolioSnapshot};
use crate::models::quote::Quote;
use crate::models::reference::ReferenceTable;

/// Annual risk-free rate used by the Sharpe ratio, in percent.
pub const RISK_FREE_RATE: f64 = 3.0;

/// One-sided z-score for 95% confidence.
pub const Z_SCORE_95: f64 = 1.645;

/// Trading days per year, for scaling annual volatility to one day.
const TRADING_DAYS: f64 = 252.0;

/// Assumed pairwise correlation between distinct holdings.
const AVERAGE_CORRELATION: f64 = 0.3;

/// HHI above which sector concentration is "High".
const HIGH_CONCENTRATION_HHI: f64 = 0.4;

/// HHI above which sector concentration is "Medium". Must stay above 0.25,
/// the HHI of an even four-sector split.
const MEDIUM_CONCENTRATION_HHI: f64 = 0.30;

/// Single-position weight (percent) flagged by what-if risk assessment.
const POSITION_WEIGHT_LIMIT: f64 = 25.0;

const QUANTITY_EPSILON: f64 = 1e-9;

/// Computes performance, allocation, risk metrics and what-if projections.
///
/// Deterministic and side-effect free: every entry point works on the
/// holdings and quotes it is given and never touches the store.
#[derive(Clone)]
pub struct AnalyticsService {
    reference: Arc<ReferenceTable>,
    portfolio_service: Arc<PortfolioService>,
    top_n: usize,
}

impl AnalyticsService {
    pub fn new(reference: Arc<ReferenceTable>) -> Self {
        Self {
            reference,
            portfolio_service: Arc::new(PortfolioService::new()),
            top_n: 5,
        }
    }

    /// Number of holdings reported in `top_holdings`.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn reference(&self) -> &ReferenceTable {
        &self.reference
    }

    pub fn value_holdings(
        &self,
        holdings: &[Holding],
        quotes: &HashMap<String, Quote>,
    ) -> Vec<ValuedHolding> {
        self.portfolio_service.value_holdings(holdings, quotes)
    }

    /// Sector of a holding: as stored, else from the reference table.
    fn sector_of<'a>(&'a self, holding: &'a Holding) -> &'a str {
        holding
            .sector
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.reference.profile(&holding.symbol).sector.as_str())
    }

    // ── Performance ─────────────────────────────────────────────────

    /// Per-holding and aggregate performance.
    ///
    /// Holdings without a quote are valued at cost basis and listed in
    /// `warnings`; they are never dropped from the result.
    pub fn compute_performance(
        &self,
        holdings: &[Holding],
        quotes: &HashMap<String, Quote>,
        snapshots: &[PortfolioSnapshot],
        period: PerformancePeriod,
        now: DateTime<Utc>,
    ) -> PerformanceResult {
        let valued = self.value_holdings(holdings, quotes);
        let totals = self.portfolio_service.totals(&valued);

        let warnings = valued
            .iter()
            .filter(|v| v.price_source == PriceSource::CostBasis)
            .map(|v| {
                format!(
                    "Quote unavailable for {}; valued at cost basis",
                    v.holding.symbol
                )
            })
            .collect();

        let performances: Vec<HoldingPerformance> = valued
            .iter()
            .map(|v| {
                let gain_loss = v.current_value - v.cost_basis;
                HoldingPerformance {
                    symbol: v.holding.symbol.clone(),
                    asset_type: v.holding.asset_type,
                    quantity: v.holding.quantity,
                    average_cost: v.holding.average_cost,
                    current_price: v.price,
                    cost_basis: v.cost_basis,
                    current_value: v.current_value,
                    gain_loss,
                    gain_loss_percent: percent_of(gain_loss, v.cost_basis),
                    day_change: v.day_change,
                    allocation_percent: percent_of(v.current_value, totals.current_value),
                    price_source: v.price_source,
                }
            })
            .collect();

        let mut top_holdings = performances.clone();
        top_holdings.sort_by(|a, b| {
            b.current_value
                .partial_cmp(&a.current_value)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        top_holdings.truncate(self.top_n);

        PerformanceResult {
            period,
            total_value: totals.current_value,
            total_cost: totals.cost_basis,
            total_gain_loss: totals.unrealized_gain_loss,
            total_gain_loss_percent: totals.unrealized_gain_loss_percent,
            day_change: totals.daily_change,
            day_change_percent: totals.daily_change_percent,
            holdings: performances,
            top_holdings,
            period_return: period_return(snapshots, period, totals.current_value, now),
            warnings,
        }
    }

    // ── Allocation ──────────────────────────────────────────────────

    /// Split the portfolio value by asset type, sector and holding.
    pub fn compute_allocation(&self, valued: &[ValuedHolding]) -> AllocationBreakdown {
        let total: f64 = valued.iter().map(|v| v.current_value).sum();

        let by_asset_type = slices(
            valued
                .iter()
                .map(|v| (v.holding.asset_type.to_string(), v.current_value)),
            total,
        );
        let by_sector = slices(
            valued
                .iter()
                .map(|v| (self.sector_of(&v.holding).to_string(), v.current_value)),
            total,
        );
        let by_holding = slices(
            valued
                .iter()
                .map(|v| (v.holding.symbol.clone(), v.current_value)),
            total,
        );

        AllocationBreakdown {
            total_value: total,
            by_asset_type,
            by_sector,
            by_holding,
        }
    }

    // ── Risk ────────────────────────────────────────────────────────

    /// Concentration, market and volatility figures for a valued portfolio.
    ///
    /// Beta, expected return and volatility come from the reference table;
    /// max drawdown comes from the snapshot history. Every ratio returns 0
    /// on a zero denominator.
    pub fn compute_risk(
        &self,
        valued: &[ValuedHolding],
        snapshots: &[PortfolioSnapshot],
    ) -> RiskMetrics {
        let total: f64 = valued.iter().map(|v| v.current_value).sum();
        let sector_weights = slices(
            valued
                .iter()
                .map(|v| (self.sector_of(&v.holding).to_string(), v.current_value)),
            total,
        );

        let herfindahl_index = finite_or_zero(
            sector_weights
                .iter()
                .map(|s| (s.percent / 100.0).powi(2))
                .sum(),
        );
        let concentration_risk = concentration(&sector_weights, herfindahl_index);
        let diversification_score = if sector_weights.is_empty() {
            0.0
        } else {
            (1.0 - herfindahl_index) * 100.0
        };

        let weights: Vec<(f64, &ValuedHolding)> = valued
            .iter()
            .map(|v| {
                let w = if total > 0.0 { v.current_value / total } else { 0.0 };
                (w, v)
            })
            .collect();

        let portfolio_beta = finite_or_zero(
            weights
                .iter()
                .map(|(w, v)| w * self.reference.profile(&v.holding.symbol).beta)
                .sum(),
        );
        let portfolio_return = finite_or_zero(
            weights
                .iter()
                .map(|(w, v)| w * self.reference.profile(&v.holding.symbol).expected_return)
                .sum(),
        );

        let mut variance = 0.0;
        for (i, (wi, vi)) in weights.iter().enumerate() {
            let si = self.reference.profile(&vi.holding.symbol).volatility;
            for (j, (wj, vj)) in weights.iter().enumerate() {
                let sj = self.reference.profile(&vj.holding.symbol).volatility;
                let rho = if i == j { 1.0 } else { AVERAGE_CORRELATION };
                variance += wi * wj * si * sj * rho;
            }
        }
        let expected_volatility = finite_or_zero(variance.max(0.0).sqrt());

        let sharpe_ratio = if expected_volatility > 0.0 {
            finite_or_zero((portfolio_return - RISK_FREE_RATE) / expected_volatility)
        } else {
            0.0
        };

        let daily_volatility = expected_volatility / 100.0 / TRADING_DAYS.sqrt();
        let var95 = finite_or_zero(total.max(0.0) * daily_volatility * Z_SCORE_95);

        RiskMetrics {
            concentration_risk,
            herfindahl_index,
            diversification_score,
            portfolio_beta,
            sharpe_ratio,
            max_drawdown: max_drawdown(snapshots),
            var95,
            expected_volatility,
            portfolio_return,
            sector_weights,
        }
    }

    // ── What-if ─────────────────────────────────────────────────────

    /// Project the impact of a hypothetical trade.
    ///
    /// A sell needs an open position (`NoPosition`) holding at least the
    /// requested quantity (`InsufficientQuantity`). Inputs are never mutated.
    pub fn what_if(
        &self,
        request: &WhatIfRequest,
        valued: &[ValuedHolding],
        allocation: &AllocationBreakdown,
    ) -> Result<WhatIfResult, CoreError> {
        let symbol = normalize_symbol(&request.symbol);
        if symbol.is_empty() {
            return Err(CoreError::InvalidTrade("symbol is required".into()));
        }
        if !request.quantity.is_finite() || request.quantity <= 0.0 {
            return Err(CoreError::InvalidTrade(format!(
                "quantity must be a positive number, got {}",
                request.quantity
            )));
        }
        if !request.price.is_finite() || request.price <= 0.0 {
            return Err(CoreError::InvalidTrade(format!(
                "price must be a positive number, got {}",
                request.price
            )));
        }

        let position = valued
            .iter()
            .find(|v| v.holding.symbol == symbol && v.holding.quantity > 0.0);

        if request.action == TradeAction::Sell {
            let held = position.map(|p| p.holding.quantity).ok_or_else(|| {
                CoreError::NoPosition {
                    symbol: symbol.clone(),
                }
            })?;
            if request.quantity > held + QUANTITY_EPSILON {
                return Err(CoreError::InsufficientQuantity {
                    symbol,
                    requested: request.quantity,
                    held,
                });
            }
        }

        let notional = request.quantity * request.price;
        let current_quantity = position.map(|p| p.holding.quantity).unwrap_or(0.0);
        let current_average_cost = position.map(|p| p.holding.average_cost).unwrap_or(0.0);
        let current_position_value = position.map(|p| p.current_value).unwrap_or(0.0);
        let current_total = allocation.total_value;

        let (new_quantity, new_average_cost, realized_gain_loss, position_value_delta, cash_flow) =
            match request.action {
                TradeAction::Buy => {
                    let new_quantity = current_quantity + request.quantity;
                    let new_average_cost =
                        (current_quantity * current_average_cost + notional) / new_quantity;
                    (new_quantity, new_average_cost, 0.0, notional, -notional)
                }
                TradeAction::Sell => {
                    let new_quantity = (current_quantity - request.quantity).max(0.0);
                    let new_average_cost = if new_quantity > QUANTITY_EPSILON {
                        current_average_cost
                    } else {
                        0.0
                    };
                    let realized = (request.price - current_average_cost) * request.quantity;
                    let removed_value =
                        current_position_value * (request.quantity / current_quantity);
                    (new_quantity, new_average_cost, realized, -removed_value, notional)
                }
            };

        let new_total = (current_total + position_value_delta).max(0.0);
        let new_position_value = (current_position_value + position_value_delta).max(0.0);

        let trade_asset_type = position
            .map(|p| p.holding.asset_type)
            .or(request.asset_type)
            .unwrap_or_default();

        let allocation_impact = AssetType::ALL
            .iter()
            .filter_map(|&asset_type| {
                let current_value = allocation
                    .by_asset_type
                    .iter()
                    .find(|s| s.label == asset_type.to_string())
                    .map(|s| s.value)
                    .unwrap_or(0.0);
                let new_value = if asset_type == trade_asset_type {
                    (current_value + position_value_delta).max(0.0)
                } else {
                    current_value
                };
                if current_value == 0.0 && new_value == 0.0 {
                    return None;
                }
                let current_percent = percent_of(current_value, current_total);
                let new_percent = percent_of(new_value, new_total);
                Some(AllocationChange {
                    asset_type,
                    current_percent,
                    new_percent,
                    change: new_percent - current_percent,
                })
            })
            .collect();

        let current_position_weight = percent_of(current_position_value, current_total);
        let new_position_weight = percent_of(new_position_value, new_total);
        let risk_impact = RiskImpact {
            current_position_weight,
            new_position_weight,
            weight_change: new_position_weight - current_position_weight,
            assessment: assess_concentration(&symbol, current_position_weight, new_position_weight),
        };

        let (profile, source) = match self.reference.get(&symbol) {
            Some(profile) => (profile, ReturnEstimateSource::Reference),
            None => (self.reference.fallback(), ReturnEstimateSource::IndustryAverage),
        };
        let projected_gain = new_position_value * profile.expected_return / 100.0;
        let expected_returns = ExpectedReturns {
            annual_return_percent: profile.expected_return,
            projected_position_value: new_position_value + projected_gain,
            projected_gain,
            source,
        };

        Ok(WhatIfResult {
            trade_details: TradeDetails {
                action: request.action,
                symbol,
                quantity: request.quantity,
                price: request.price,
                notional,
            },
            position_impact: PositionImpact {
                current_quantity,
                new_quantity,
                current_average_cost,
                new_average_cost: finite_or_zero(new_average_cost),
                current_cost_basis: current_quantity * current_average_cost,
                new_cost_basis: finite_or_zero(new_quantity * new_average_cost),
                realized_gain_loss,
            },
            portfolio_impact: PortfolioImpact {
                current_value: current_total,
                new_value: new_total,
                value_change: new_total - current_total,
                cash_flow,
            },
            allocation_impact,
            risk_impact,
            expected_returns,
        })
    }
}

/// Group `(label, value)` pairs into slices, largest first, label breaking ties.
fn slices(items: impl Iterator<Item = (String, f64)>, total: f64) -> Vec<AllocationSlice> {
    let mut grouped: HashMap<String, f64> = HashMap::new();
    for (label, value) in items {
        *grouped.entry(label).or_insert(0.0) += value;
    }

    let mut slices: Vec<AllocationSlice> = grouped
        .into_iter()
        .map(|(label, value)| AllocationSlice {
            percent: percent_of(value, total),
            label,
            value,
        })
        .collect();
    slices.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.label.cmp(&b.label))
    });
    slices
}

fn concentration(sector_weights: &[AllocationSlice], hhi: f64) -> ConcentrationRisk {
    let Some(largest) = sector_weights.first().filter(|s| s.value > 0.0) else {
        return ConcentrationRisk {
            level: ConcentrationLevel::Low,
            largest_sector: None,
            largest_sector_weight: 0.0,
            recommendation: "Portfolio holds no valued positions.".to_string(),
        };
    };

    let (level, recommendation) = if hhi > HIGH_CONCENTRATION_HHI {
        (
            ConcentrationLevel::High,
            format!(
                "{} makes up {:.1}% of the portfolio. Consider diversifying into other sectors to reduce concentration risk.",
                largest.label, largest.percent
            ),
        )
    } else if hhi > MEDIUM_CONCENTRATION_HHI {
        (
            ConcentrationLevel::Medium,
            format!(
                "Moderate concentration in {} ({:.1}%). Adding exposure to other sectors would improve diversification.",
                largest.label, largest.percent
            ),
        )
    } else {
        (
            ConcentrationLevel::Low,
            format!(
                "Portfolio is well diversified across {} sectors.",
                sector_weights.len()
            ),
        )
    };

    ConcentrationRisk {
        level,
        largest_sector: Some(largest.label.clone()),
        largest_sector_weight: largest.percent,
        recommendation,
    }
}

fn assess_concentration(symbol: &str, current: f64, new: f64) -> String {
    if new > POSITION_WEIGHT_LIMIT && new > current {
        format!(
            "{symbol} would reach {new:.1}% of the portfolio, above the {POSITION_WEIGHT_LIMIT:.0}% single-position guideline; concentration risk increases."
        )
    } else if new > current {
        format!("Concentration in {symbol} increases from {current:.1}% to {new:.1}%.")
    } else if new < current {
        format!(
            "Concentration in {symbol} decreases from {current:.1}% to {new:.1}%, reducing single-position risk."
        )
    } else {
        format!("No material change in {symbol} concentration.")
    }
}

/// Largest peak-to-trough decline across the snapshot history, in percent.
fn max_drawdown(snapshots: &[PortfolioSnapshot]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;
    for snapshot in snapshots {
        peak = peak.max(snapshot.total_value);
        if peak > 0.0 {
            worst = worst.max((peak - snapshot.total_value) / peak * 100.0);
        }
    }
    finite_or_zero(worst)
}

/// Return from the first snapshot inside the period to the current value.
fn period_return(
    snapshots: &[PortfolioSnapshot],
    period: PerformancePeriod,
    current_value: f64,
    now: DateTime<Utc>,
) -> Option<PeriodReturn> {
    let start = match period.lookback_days() {
        Some(days) => {
            let since = now - Duration::days(days);
            snapshots.iter().find(|s| s.recorded_at >= since)?
        }
        None => snapshots.first()?,
    };

    let absolute_return = current_value - start.total_value;
    Some(PeriodReturn {
        start_date: start.recorded_at,
        start_value: start.total_value,
        end_value: current_value,
        absolute_return,
        percent_return: percent_of(absolute_return, start.total_value),
    })
}
