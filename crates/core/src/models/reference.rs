//! Static per-symbol reference data used by the analytics engine.
//!
//! Beta, expected return and volatility are approximations, not live
//! regressions. The table is injectable: load one from JSON or extend the
//! built-in default without touching the risk/what-if algorithms.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::asset::normalize_symbol;
use crate::errors::CoreError;

/// Reference figures for a single symbol. Percentages are annualized
/// (e.g. `expected_return: 12.0` means +12%/year).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolProfile {
    pub beta: f64,
    pub expected_return: f64,
    pub volatility: f64,
    pub sector: String,
}

impl SymbolProfile {
    pub fn new(beta: f64, expected_return: f64, volatility: f64, sector: impl Into<String>) -> Self {
        Self {
            beta,
            expected_return,
            volatility,
            sector: sector.into(),
        }
    }

    /// Generic market profile used for unknown symbols.
    pub fn industry_average() -> Self {
        Self::new(1.0, 8.0, 25.0, "Other")
    }
}

/// Symbol → profile lookup with a fallback for unknown tickers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceTable {
    #[serde(default)]
    symbols: HashMap<String, SymbolProfile>,
    #[serde(default = "SymbolProfile::industry_average")]
    fallback: SymbolProfile,
}

impl ReferenceTable {
    /// An empty table: every symbol resolves to the industry average.
    pub fn empty() -> Self {
        Self {
            symbols: HashMap::new(),
            fallback: SymbolProfile::industry_average(),
        }
    }

    /// Parse a table from JSON: `{"symbols": {"AAPL": {...}}, "fallback": {...}}`.
    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        let mut table: ReferenceTable = serde_json::from_str(json)?;
        table.symbols = table
            .symbols
            .into_iter()
            .map(|(symbol, profile)| (normalize_symbol(&symbol), profile))
            .collect();
        Ok(table)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Add or replace the profile for a symbol.
    pub fn insert(&mut self, symbol: &str, profile: SymbolProfile) {
        self.symbols.insert(normalize_symbol(symbol), profile);
    }

    /// The profile for a known symbol, if any.
    pub fn get(&self, symbol: &str) -> Option<&SymbolProfile> {
        self.symbols.get(&normalize_symbol(symbol))
    }

    /// The profile for a symbol, or the fallback for unknown symbols.
    pub fn profile(&self, symbol: &str) -> &SymbolProfile {
        self.get(symbol).unwrap_or(&self.fallback)
    }

    pub fn fallback(&self) -> &SymbolProfile {
        &self.fallback
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl Default for ReferenceTable {
    /// Built-in table of widely held tickers.
    fn default() -> Self {
        let entries = [
            ("AAPL", 1.20, 12.0, 28.0, "Technology"),
            ("MSFT", 0.90, 11.0, 25.0, "Technology"),
            ("NVDA", 1.70, 20.0, 50.0, "Technology"),
            ("GOOGL", 1.05, 10.0, 28.0, "Communication Services"),
            ("META", 1.25, 14.0, 38.0, "Communication Services"),
            ("AMZN", 1.15, 13.0, 32.0, "Consumer Discretionary"),
            ("TSLA", 2.00, 15.0, 60.0, "Consumer Discretionary"),
            ("JPM", 1.10, 9.0, 24.0, "Financials"),
            ("V", 0.95, 10.0, 22.0, "Financials"),
            ("JNJ", 0.55, 7.0, 16.0, "Healthcare"),
            ("UNH", 0.60, 9.0, 20.0, "Healthcare"),
            ("XOM", 0.90, 8.0, 27.0, "Energy"),
            ("PG", 0.40, 7.0, 15.0, "Consumer Staples"),
            ("KO", 0.60, 6.0, 15.0, "Consumer Staples"),
            ("SPY", 1.00, 10.0, 18.0, "Diversified"),
            ("QQQ", 1.10, 12.0, 22.0, "Technology"),
            ("BTC-USD", 1.50, 25.0, 70.0, "Crypto"),
            ("ETH-USD", 1.60, 25.0, 80.0, "Crypto"),
        ];

        let mut table = Self::empty();
        for (symbol, beta, expected_return, volatility, sector) in entries {
            table.insert(
                symbol,
                SymbolProfile::new(beta, expected_return, volatility, sector),
            );
        }
        table
    }
}
