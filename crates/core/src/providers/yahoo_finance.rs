use async_trait::async_trait;
use chrono::Utc;

use super::traits::QuoteSource;
use crate::errors::CoreError;
use crate::models::asset::normalize_symbol;
use crate::models::quote::Quote;

const PROVIDER: &str = "Yahoo Finance";

/// Yahoo Finance API provider for stock/ETF/crypto quotes.
///
/// - **Free**: No API key required.
/// - **No strict rate limits** (unofficial public API).
/// - **Coverage**: Global equities, ETFs, indices, crypto pairs (`BTC-USD`).
///
/// Uses the `yahoo_finance_api` crate. A quote is assembled from the last
/// five daily bars: the latest bar gives price/open/high/low, the bar
/// before it gives the previous close.
pub struct YahooFinanceProvider {
    connector: yahoo_finance_api::YahooConnector,
}

impl YahooFinanceProvider {
    pub fn new() -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::new().map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to create connector: {e}"),
        })?;
        Ok(Self { connector })
    }
}

#[async_trait]
impl QuoteSource for YahooFinanceProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote, CoreError> {
        let symbol = normalize_symbol(symbol);
        let resp = self
            .connector
            .get_quote_range(&symbol, "1d", "5d")
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to fetch quote range for {symbol}: {e}"),
            })?;

        let bars = resp.quotes().map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to parse quotes for {symbol}: {e}"),
        })?;

        let last = bars
            .last()
            .ok_or_else(|| CoreError::QuoteNotAvailable(symbol.clone()))?;
        let previous_close = bars
            .len()
            .checked_sub(2)
            .and_then(|idx| bars.get(idx))
            .map(|bar| bar.close)
            .unwrap_or(last.open);

        let mut quote = Quote::from_prices(
            symbol,
            last.close,
            previous_close,
            last.open,
            last.high,
            last.low,
        );
        quote.timestamp = chrono::DateTime::from_timestamp(last.timestamp as i64, 0)
            .unwrap_or_else(Utc::now);
        Ok(quote)
    }
}
