use std::collections::HashMap;

use crate::models::analytics::PriceSource;
use crate::models::holding::Holding;
use crate::models::message::PortfolioUpdate;
use crate::models::quote::Quote;

/// A holding priced for valuation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuedHolding {
    pub holding: Holding,
    /// Quote price, or average cost when no quote was available
    pub price: f64,
    pub price_source: PriceSource,
    pub cost_basis: f64,
    pub current_value: f64,
    /// quantity × the quote's change versus previous close (0 without a quote)
    pub day_change: f64,
}

/// Aggregate figures over a set of valued holdings.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PortfolioTotals {
    pub cost_basis: f64,
    pub current_value: f64,
    pub unrealized_gain_loss: f64,
    pub unrealized_gain_loss_percent: f64,
    pub daily_change: f64,
    pub daily_change_percent: f64,
}

/// Values holdings against quotes and aggregates them.
///
/// Pure business logic with no I/O. Shared by the portfolio
/// refresh cycle and the analytics engine so both report identical totals.
pub struct PortfolioService;

impl PortfolioService {
    pub fn new() -> Self {
        Self
    }

    /// Price every non-zero holding, falling back to average cost for
    /// symbols missing from `quotes`. Input order is preserved.
    pub fn value_holdings(
        &self,
        holdings: &[Holding],
        quotes: &HashMap<String, Quote>,
    ) -> Vec<ValuedHolding> {
        holdings
            .iter()
            .filter(|h| h.quantity != 0.0)
            .map(|h| {
                let cost_basis = h.cost_basis();
                match quotes.get(&h.symbol).filter(|q| q.is_valid()) {
                    Some(quote) => ValuedHolding {
                        holding: h.clone(),
                        price: quote.current_price,
                        price_source: PriceSource::Live,
                        cost_basis,
                        current_value: h.quantity * quote.current_price,
                        day_change: finite_or_zero(h.quantity * quote.change),
                    },
                    None => ValuedHolding {
                        holding: h.clone(),
                        price: h.average_cost,
                        price_source: PriceSource::CostBasis,
                        cost_basis,
                        current_value: cost_basis,
                        day_change: 0.0,
                    },
                }
            })
            .collect()
    }

    /// Sum valued holdings into portfolio totals.
    ///
    /// - `unrealized_gain_loss_percent` is 0 when the cost basis is 0.
    /// - `daily_change_percent` is relative to yesterday's value
    ///   (`current_value − daily_change`), 0 when that is 0.
    pub fn totals(&self, valued: &[ValuedHolding]) -> PortfolioTotals {
        let cost_basis: f64 = valued.iter().map(|v| v.cost_basis).sum();
        let current_value: f64 = valued.iter().map(|v| v.current_value).sum();
        let daily_change: f64 = valued.iter().map(|v| v.day_change).sum();
        let unrealized_gain_loss = current_value - cost_basis;
        let previous_value = current_value - daily_change;

        PortfolioTotals {
            cost_basis,
            current_value,
            unrealized_gain_loss,
            unrealized_gain_loss_percent: percent_of(unrealized_gain_loss, cost_basis),
            daily_change,
            daily_change_percent: percent_of(daily_change, previous_value),
        }
    }

    /// Build the `portfolio_update` payload for one user's current holdings.
    pub fn portfolio_update(
        &self,
        user_id: Option<&str>,
        holdings: &[Holding],
        quotes: &HashMap<String, Quote>,
    ) -> PortfolioUpdate {
        let totals = self.totals(&self.value_holdings(holdings, quotes));
        PortfolioUpdate {
            user_id: user_id.map(str::to_string),
            total_value: totals.current_value,
            daily_change: totals.daily_change,
            daily_change_percent: totals.daily_change_percent,
            unrealized_gain_loss: totals.unrealized_gain_loss,
            unrealized_gain_loss_percent: totals.unrealized_gain_loss_percent,
        }
    }
}

impl Default for PortfolioService {
    fn default() -> Self {
        Self::new()
    }
}

/// `part / whole × 100`, 0 when `whole` is 0 or the result is not finite.
pub(crate) fn percent_of(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    finite_or_zero(part / whole * 100.0)
}

pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
