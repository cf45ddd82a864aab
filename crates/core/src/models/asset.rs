use serde::{Deserialize, Serialize};

/// The type/category of a held asset.
/// Drives the asset-type allocation breakdown and what-if allocation impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    /// Stocks / equities (AAPL, MSFT, etc.)
    #[default]
    Stock,
    /// Exchange-traded funds (SPY, QQQ, etc.)
    Etf,
    /// Cryptocurrencies (BTC-USD, ETH-USD, etc.)
    Crypto,
    /// Bonds and bond funds
    Bond,
    /// Cash and money-market positions
    Cash,
    /// Anything else
    Other,
}

impl AssetType {
    /// Every variant, in display order.
    pub const ALL: [AssetType; 6] = [
        AssetType::Stock,
        AssetType::Etf,
        AssetType::Crypto,
        AssetType::Bond,
        AssetType::Cash,
        AssetType::Other,
    ];
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetType::Stock => write!(f, "Stock"),
            AssetType::Etf => write!(f, "ETF"),
            AssetType::Crypto => write!(f, "Crypto"),
            AssetType::Bond => write!(f, "Bond"),
            AssetType::Cash => write!(f, "Cash"),
            AssetType::Other => write!(f, "Other"),
        }
    }
}

/// Normalize a ticker symbol: trimmed and uppercased.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
