// ═══════════════════════════════════════════════════════════════════
// Analytics Tests: valuation, performance, allocation, risk, what-if
// ═══════════════════════════════════════════════════════════════════

use chrono::{Duration, TimeZone, Utc};
use portfolio_pulse_core::errors::CoreError;
use portfolio_pulse_core::models::analytics::{
    ConcentrationLevel, PerformancePeriod, PriceSource, ReturnEstimateSource, TradeAction,
    WhatIfRequest,
};
use portfolio_pulse_core::models::asset::AssetType;
use portfolio_pulse_core::models::holding::{Holding, PortfolioSnapshot};
use portfolio_pulse_core::models::quote::Quote;
use portfolio_pulse_core::models::reference::ReferenceTable;
use portfolio_pulse_core::services::analytics_service::{
    AnalyticsService, RISK_FREE_RATE, Z_SCORE_95,
};
use portfolio_pulse_core::services::portfolio_service::PortfolioService;
use std::collections::HashMap;
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════

fn service() -> AnalyticsService {
    AnalyticsService::new(Arc::new(ReferenceTable::default()))
}

/// A flat quote (no change on the day).
fn quote(symbol: &str, price: f64) -> Quote {
    Quote::from_prices(symbol, price, price, price, price, price)
}

fn quotes(entries: &[(&str, f64)]) -> HashMap<String, Quote> {
    entries
        .iter()
        .map(|(symbol, price)| (symbol.to_string(), quote(symbol, *price)))
        .collect()
}

fn snapshot(days_ago: i64, total_value: f64) -> PortfolioSnapshot {
    PortfolioSnapshot {
        recorded_at: now() - Duration::days(days_ago),
        total_value,
    }
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

// ── Portfolio valuation ─────────────────────────────────────────────

mod valuation {
    use super::*;

    #[test]
    fn totals_with_daily_change() {
        let holdings = vec![Holding::new("AAPL", 10.0, 90.0)];
        let mut book = HashMap::new();
        book.insert(
            "AAPL".to_string(),
            Quote::from_prices("AAPL", 110.0, 100.0, 100.0, 110.0, 100.0),
        );

        let update = PortfolioService::new().portfolio_update(Some("alice"), &holdings, &book);
        assert_eq!(update.user_id.as_deref(), Some("alice"));
        assert_close(update.total_value, 1100.0);
        assert_close(update.daily_change, 100.0);
        assert_close(update.daily_change_percent, 10.0);
        assert_close(update.unrealized_gain_loss, 200.0);
        assert_close(update.unrealized_gain_loss_percent, 200.0 / 900.0 * 100.0);
    }

    #[test]
    fn missing_quote_falls_back_to_average_cost() {
        let holdings = vec![Holding::new("AAPL", 10.0, 150.0)];
        let update = PortfolioService::new().portfolio_update(None, &holdings, &HashMap::new());
        assert_close(update.total_value, 1500.0);
        assert_eq!(update.unrealized_gain_loss, 0.0);
        assert_eq!(update.daily_change_percent, 0.0);
    }

    #[test]
    fn zero_quantity_holdings_are_skipped() {
        let holdings = vec![Holding::new("AAPL", 0.0, 150.0), Holding::new("MSFT", 1.0, 10.0)];
        let valued = PortfolioService::new().value_holdings(&holdings, &quotes(&[("MSFT", 20.0)]));
        assert_eq!(valued.len(), 1);
        assert_eq!(valued[0].holding.symbol, "MSFT");
    }

    #[test]
    fn empty_portfolio_has_zero_totals() {
        let update = PortfolioService::new().portfolio_update(None, &[], &HashMap::new());
        assert_eq!(update.total_value, 0.0);
        assert_eq!(update.unrealized_gain_loss_percent, 0.0);
        assert_eq!(update.daily_change_percent, 0.0);
    }
}

// ── Performance ─────────────────────────────────────────────────────

mod performance {
    use super::*;

    #[test]
    fn failed_quote_keeps_holding_at_cost_basis() {
        let holdings = vec![Holding::new("AAPL", 10.0, 150.0), Holding::new("MSFT", 5.0, 300.0)];
        let result = service().compute_performance(
            &holdings,
            &quotes(&[("AAPL", 160.0)]),
            &[],
            PerformancePeriod::OneMonth,
            now(),
        );

        assert_eq!(result.holdings.len(), 2);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("MSFT"));

        let msft = result.holdings.iter().find(|h| h.symbol == "MSFT").unwrap();
        assert_eq!(msft.price_source, PriceSource::CostBasis);
        assert_close(msft.current_value, 1500.0);
        assert_close(msft.gain_loss, 0.0);

        assert_close(result.total_value, 3100.0);
        assert_close(result.total_cost, 3000.0);
        assert_close(result.total_gain_loss, 100.0);
    }

    #[test]
    fn allocation_percent_sums_to_hundred() {
        let holdings = vec![Holding::new("AAPL", 1.0, 1.0), Holding::new("MSFT", 3.0, 1.0)];
        let result = service().compute_performance(
            &holdings,
            &quotes(&[("AAPL", 100.0), ("MSFT", 100.0)]),
            &[],
            PerformancePeriod::All,
            now(),
        );
        let sum: f64 = result.holdings.iter().map(|h| h.allocation_percent).sum();
        assert_close(sum, 100.0);
        assert_close(result.holdings[1].allocation_percent, 75.0);
    }

    #[test]
    fn top_holdings_ordered_by_value_then_symbol() {
        let holdings = vec![
            Holding::new("MSFT", 10.0, 100.0),
            Holding::new("KO", 5.0, 100.0),
            Holding::new("AAPL", 10.0, 100.0),
        ];
        let result = service().with_top_n(2).compute_performance(
            &holdings,
            &HashMap::new(),
            &[],
            PerformancePeriod::OneMonth,
            now(),
        );
        let top: Vec<&str> = result.top_holdings.iter().map(|h| h.symbol.as_str()).collect();
        assert_eq!(top, vec!["AAPL", "MSFT"]);
        assert_eq!(result.holdings.len(), 3);
    }

    #[test]
    fn period_return_uses_first_snapshot_in_window() {
        let holdings = vec![Holding::new("AAPL", 10.0, 100.0)];
        let snapshots = vec![snapshot(40, 1000.0), snapshot(20, 1100.0)];
        let book = quotes(&[("AAPL", 121.0)]);

        let month = service()
            .compute_performance(&holdings, &book, &snapshots, PerformancePeriod::OneMonth, now())
            .period_return
            .unwrap();
        assert_close(month.start_value, 1100.0);
        assert_close(month.absolute_return, 110.0);
        assert_close(month.percent_return, 10.0);

        let all = service()
            .compute_performance(&holdings, &book, &snapshots, PerformancePeriod::All, now())
            .period_return
            .unwrap();
        assert_close(all.start_value, 1000.0);
    }

    #[test]
    fn no_snapshot_in_window_means_no_period_return() {
        let holdings = vec![Holding::new("AAPL", 10.0, 100.0)];
        let result = service().compute_performance(
            &holdings,
            &HashMap::new(),
            &[snapshot(40, 1000.0)],
            PerformancePeriod::OneDay,
            now(),
        );
        assert!(result.period_return.is_none());
    }
}

// ── Allocation ──────────────────────────────────────────────────────

mod allocation {
    use super::*;

    #[test]
    fn groups_by_asset_type_and_sector() {
        let svc = service();
        let holdings = vec![
            Holding::new("AAPL", 1.0, 1.0),
            Holding::new("MSFT", 1.0, 1.0),
            Holding::new("SPY", 2.0, 1.0).with_asset_type(AssetType::Etf),
        ];
        let valued = svc.value_holdings(
            &holdings,
            &quotes(&[("AAPL", 100.0), ("MSFT", 100.0), ("SPY", 100.0)]),
        );
        let allocation = svc.compute_allocation(&valued);

        assert_close(allocation.total_value, 400.0);
        assert_close(allocation.asset_type_percent(AssetType::Stock), 50.0);
        assert_close(allocation.asset_type_percent(AssetType::Etf), 50.0);

        // Technology (AAPL + MSFT) ties Diversified (SPY); label breaks the tie
        assert_eq!(allocation.by_sector[0].label, "Diversified");
        assert_eq!(allocation.by_sector[1].label, "Technology");
        assert_eq!(allocation.by_holding[0].label, "SPY");
    }

    #[test]
    fn stored_sector_overrides_reference() {
        let svc = service();
        let holdings = vec![Holding::new("AAPL", 1.0, 10.0).with_sector("Hardware")];
        let allocation = svc.compute_allocation(&svc.value_holdings(&holdings, &HashMap::new()));
        assert_eq!(allocation.by_sector[0].label, "Hardware");
        assert_close(allocation.by_sector[0].percent, 100.0);
    }

    #[test]
    fn empty_portfolio() {
        let allocation = service().compute_allocation(&[]);
        assert_eq!(allocation.total_value, 0.0);
        assert!(allocation.by_asset_type.is_empty());
    }
}

// ── Risk ────────────────────────────────────────────────────────────

mod risk {
    use super::*;

    #[test]
    fn dominant_sector_is_high_concentration() {
        let svc = service();
        let holdings = vec![
            Holding::new("AAA", 95.0, 1.0).with_sector("Technology"),
            Holding::new("BBB", 5.0, 1.0).with_sector("Healthcare"),
        ];
        let risk = svc.compute_risk(&svc.value_holdings(&holdings, &HashMap::new()), &[]);

        assert_eq!(risk.concentration_risk.level, ConcentrationLevel::High);
        assert_eq!(risk.concentration_risk.largest_sector.as_deref(), Some("Technology"));
        assert_close(risk.concentration_risk.largest_sector_weight, 95.0);
        assert!(risk.concentration_risk.recommendation.contains("Technology"));
        assert!(risk.concentration_risk.recommendation.contains("diversifying"));
        assert_close(risk.herfindahl_index, 0.905);
    }

    #[test]
    fn even_sectors_are_low_concentration() {
        let svc = service();
        let holdings: Vec<Holding> = ["Energy", "Financials", "Healthcare", "Technology"]
            .iter()
            .enumerate()
            .map(|(i, sector)| Holding::new(format!("S{i}"), 1.0, 100.0).with_sector(*sector))
            .collect();
        let risk = svc.compute_risk(&svc.value_holdings(&holdings, &HashMap::new()), &[]);

        assert_eq!(risk.concentration_risk.level, ConcentrationLevel::Low);
        assert_close(risk.herfindahl_index, 0.25);
        assert_close(risk.diversification_score, 75.0);
        assert!(risk.concentration_risk.recommendation.contains("4 sectors"));
    }

    #[test]
    fn near_even_sectors_are_low_concentration() {
        let svc = service();
        let holdings = vec![
            Holding::new("E", 26.0, 100.0).with_sector("Energy"),
            Holding::new("F", 25.0, 100.0).with_sector("Financials"),
            Holding::new("H", 25.0, 100.0).with_sector("Healthcare"),
            Holding::new("T", 24.0, 100.0).with_sector("Technology"),
        ];
        let risk = svc.compute_risk(&svc.value_holdings(&holdings, &HashMap::new()), &[]);

        assert!(risk.herfindahl_index > 0.25);
        assert_close(risk.herfindahl_index, 0.2502);
        assert_eq!(risk.concentration_risk.level, ConcentrationLevel::Low);
        assert_eq!(risk.concentration_risk.largest_sector.as_deref(), Some("Energy"));
        assert!(risk.concentration_risk.recommendation.contains("well diversified"));
    }

    #[test]
    fn moderately_skewed_sectors_are_medium_concentration() {
        let svc = service();
        let holdings = vec![
            Holding::new("E", 45.0, 100.0).with_sector("Energy"),
            Holding::new("F", 25.0, 100.0).with_sector("Financials"),
            Holding::new("H", 15.0, 100.0).with_sector("Healthcare"),
            Holding::new("T", 15.0, 100.0).with_sector("Technology"),
        ];
        let risk = svc.compute_risk(&svc.value_holdings(&holdings, &HashMap::new()), &[]);

        assert_close(risk.herfindahl_index, 0.31);
        assert_eq!(risk.concentration_risk.level, ConcentrationLevel::Medium);
        assert!(risk.concentration_risk.recommendation.contains("Energy"));
    }

    #[test]
    fn single_reference_holding() {
        let svc = service();
        let holdings = vec![Holding::new("AAPL", 10.0, 100.0)];
        let risk = svc.compute_risk(
            &svc.value_holdings(&holdings, &quotes(&[("AAPL", 100.0)])),
            &[],
        );

        assert_close(risk.portfolio_beta, 1.2);
        assert_close(risk.portfolio_return, 12.0);
        assert_close(risk.expected_volatility, 28.0);
        assert_close(risk.sharpe_ratio, (12.0 - RISK_FREE_RATE) / 28.0);
        assert_close(risk.var95, 1000.0 * 0.28 / 252f64.sqrt() * Z_SCORE_95);
    }

    #[test]
    fn correlation_lowers_volatility() {
        let svc = service();
        let holdings = vec![Holding::new("AAPL", 1.0, 100.0), Holding::new("JNJ", 1.0, 100.0)];
        let risk = svc.compute_risk(&svc.value_holdings(&holdings, &HashMap::new()), &[]);

        // 0.25·28² + 0.25·16² + 2·0.25·28·16·0.3
        let expected = (196.0_f64 + 64.0 + 67.2).sqrt();
        assert_close(risk.expected_volatility, expected);
        assert!(risk.expected_volatility < (28.0 + 16.0) / 2.0);
    }

    #[test]
    fn max_drawdown_from_snapshots() {
        let snapshots = vec![
            snapshot(4, 100.0),
            snapshot(3, 120.0),
            snapshot(2, 90.0),
            snapshot(1, 110.0),
        ];
        let risk = service().compute_risk(&[], &snapshots);
        assert_close(risk.max_drawdown, 25.0);
    }

    #[test]
    fn empty_portfolio_has_zeroed_metrics() {
        let risk = service().compute_risk(&[], &[]);
        assert_eq!(risk.herfindahl_index, 0.0);
        assert_eq!(risk.diversification_score, 0.0);
        assert_eq!(risk.portfolio_beta, 0.0);
        assert_eq!(risk.sharpe_ratio, 0.0);
        assert_eq!(risk.var95, 0.0);
        assert_eq!(risk.max_drawdown, 0.0);
        assert_eq!(risk.concentration_risk.level, ConcentrationLevel::Low);
        assert!(risk.concentration_risk.largest_sector.is_none());
    }
}

// ── What-if ─────────────────────────────────────────────────────────

mod what_if {
    use super::*;

    fn run(
        holdings: &[Holding],
        book: &HashMap<String, Quote>,
        request: WhatIfRequest,
    ) -> Result<portfolio_pulse_core::models::analytics::WhatIfResult, CoreError> {
        let svc = service();
        let valued = svc.value_holdings(holdings, book);
        let allocation = svc.compute_allocation(&valued);
        svc.what_if(&request, &valued, &allocation)
    }

    #[test]
    fn buy_updates_average_cost() {
        let holdings = vec![Holding::new("AAPL", 10.0, 100.0)];
        let result = run(
            &holdings,
            &quotes(&[("AAPL", 100.0)]),
            WhatIfRequest::new(TradeAction::Buy, "aapl", 10.0, 200.0),
        )
        .unwrap();

        assert_eq!(result.trade_details.symbol, "AAPL");
        assert_close(result.trade_details.notional, 2000.0);
        assert_close(result.position_impact.new_quantity, 20.0);
        assert_close(result.position_impact.new_average_cost, 150.0);
        assert_close(result.position_impact.new_cost_basis, 3000.0);
        assert_close(result.portfolio_impact.new_value, 3000.0);
        assert_close(result.portfolio_impact.cash_flow, -2000.0);
        assert_eq!(result.expected_returns.source, ReturnEstimateSource::Reference);
        assert_close(result.expected_returns.annual_return_percent, 12.0);
    }

    #[test]
    fn sell_realizes_gain_and_keeps_average_cost() {
        let holdings = vec![Holding::new("AAPL", 10.0, 100.0), Holding::new("KO", 10.0, 60.0)];
        let result = run(
            &holdings,
            &quotes(&[("AAPL", 120.0), ("KO", 60.0)]),
            WhatIfRequest::new(TradeAction::Sell, "AAPL", 5.0, 120.0),
        )
        .unwrap();

        assert_close(result.position_impact.new_quantity, 5.0);
        assert_close(result.position_impact.new_average_cost, 100.0);
        assert_close(result.position_impact.realized_gain_loss, 100.0);
        assert_close(result.portfolio_impact.current_value, 1800.0);
        assert_close(result.portfolio_impact.new_value, 1200.0);
        assert_close(result.portfolio_impact.cash_flow, 600.0);
        assert!(result.risk_impact.new_position_weight < result.risk_impact.current_position_weight);
        assert!(result.risk_impact.assessment.contains("decreases"));
    }

    #[test]
    fn sell_more_than_held_is_rejected() {
        let holdings = vec![Holding::new("AAPL", 5.0, 100.0)];
        let err = run(
            &holdings,
            &HashMap::new(),
            WhatIfRequest::new(TradeAction::Sell, "AAPL", 10.0, 100.0),
        )
        .unwrap_err();

        match err {
            CoreError::InsufficientQuantity {
                symbol,
                requested,
                held,
            } => {
                assert_eq!(symbol, "AAPL");
                assert_eq!(requested, 10.0);
                assert_eq!(held, 5.0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn sell_without_position_is_rejected() {
        let holdings = vec![Holding::new("AAPL", 5.0, 100.0)];
        let err = run(
            &holdings,
            &HashMap::new(),
            WhatIfRequest::new(TradeAction::Sell, "TSLA", 1.0, 200.0),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::NoPosition { ref symbol } if symbol == "TSLA"));
    }

    #[test]
    fn selling_everything_closes_the_position() {
        let holdings = vec![Holding::new("AAPL", 5.0, 100.0)];
        let result = run(
            &holdings,
            &HashMap::new(),
            WhatIfRequest::new(TradeAction::Sell, "AAPL", 5.0, 90.0),
        )
        .unwrap();
        assert_eq!(result.position_impact.new_quantity, 0.0);
        assert_eq!(result.position_impact.new_average_cost, 0.0);
        assert_close(result.position_impact.realized_gain_loss, -50.0);
        assert_eq!(result.portfolio_impact.new_value, 0.0);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let holdings = vec![Holding::new("AAPL", 5.0, 100.0)];
        for request in [
            WhatIfRequest::new(TradeAction::Buy, "  ", 1.0, 1.0),
            WhatIfRequest::new(TradeAction::Buy, "AAPL", 0.0, 1.0),
            WhatIfRequest::new(TradeAction::Buy, "AAPL", -1.0, 1.0),
            WhatIfRequest::new(TradeAction::Buy, "AAPL", 1.0, f64::NAN),
        ] {
            assert!(matches!(
                run(&holdings, &HashMap::new(), request),
                Err(CoreError::InvalidTrade(_))
            ));
        }
    }

    #[test]
    fn new_symbol_uses_industry_average_and_flags_concentration() {
        let holdings = vec![Holding::new("AAPL", 1.0, 100.0)];
        let result = run(
            &holdings,
            &HashMap::new(),
            WhatIfRequest::new(TradeAction::Buy, "ZZZZ", 1.0, 100.0),
        )
        .unwrap();

        assert_eq!(result.expected_returns.source, ReturnEstimateSource::IndustryAverage);
        assert_close(result.expected_returns.annual_return_percent, 8.0);
        assert_close(result.expected_returns.projected_gain, 8.0);
        assert_close(result.risk_impact.new_position_weight, 50.0);
        assert!(result.risk_impact.assessment.contains("guideline"));
    }

    #[test]
    fn allocation_impact_tracks_asset_type() {
        let holdings = vec![Holding::new("AAPL", 1.0, 100.0)];
        let mut request = WhatIfRequest::new(TradeAction::Buy, "BTC-USD", 1.0, 100.0);
        request.asset_type = Some(AssetType::Crypto);
        let result = run(&holdings, &HashMap::new(), request).unwrap();

        let crypto = result
            .allocation_impact
            .iter()
            .find(|c| c.asset_type == AssetType::Crypto)
            .unwrap();
        assert_close(crypto.current_percent, 0.0);
        assert_close(crypto.new_percent, 50.0);

        let stock = result
            .allocation_impact
            .iter()
            .find(|c| c.asset_type == AssetType::Stock)
            .unwrap();
        assert_close(stock.change, -50.0);
        assert_eq!(result.allocation_impact.len(), 2);
    }

    #[test]
    fn inputs_are_not_mutated() {
        let svc = service();
        let holdings = vec![Holding::new("AAPL", 10.0, 100.0)];
        let valued = svc.value_holdings(&holdings, &HashMap::new());
        let allocation = svc.compute_allocation(&valued);
        let before = (valued.clone(), allocation.clone());

        svc.what_if(
            &WhatIfRequest::new(TradeAction::Buy, "AAPL", 5.0, 50.0),
            &valued,
            &allocation,
        )
        .unwrap();
        assert_eq!(before, (valued, allocation));
    }
}
