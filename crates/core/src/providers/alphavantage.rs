use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::traits::QuoteSource;
use crate::errors::CoreError;
use crate::models::asset::normalize_symbol;
use crate::models::quote::Quote;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER: &str = "Alpha Vantage";

/// Alpha Vantage API provider for stock/equity quotes.
///
/// - **Free tier**: 25 requests/day, 5 requests/minute.
/// - **Requires**: API key (set via settings as "alphavantage").
/// - **Endpoint**: `GLOBAL_QUOTE`, which carries every field of a [`Quote`].
///
/// When the rate limit is hit the API answers 200 with a `Note` or
/// `Information` field instead of a quote; that is reported as an error.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
}

impl AlphaVantageProvider {
    pub fn new(api_key: String) -> Self {
        let builder = Client::builder().timeout(Duration::from_secs(30));
        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            api_key,
        }
    }

    /// Parse a raw `GLOBAL_QUOTE` response body into a [`Quote`].
    pub fn parse_global_quote(symbol: &str, body: &str) -> Result<Quote, CoreError> {
        let resp: GlobalQuoteResponse = serde_json::from_str(body).map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to parse quote for {symbol}: {e}"),
        })?;

        if let Some(note) = resp.note.or(resp.information) {
            return Err(CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Rate limited while fetching {symbol}: {note}"),
            });
        }

        let q = resp
            .global_quote
            .filter(|q| q.price.is_some())
            .ok_or_else(|| CoreError::QuoteNotAvailable(symbol.to_string()))?;

        let price = parse_number(symbol, "price", q.price.as_deref())?;
        let previous_close = parse_number(symbol, "previous close", q.previous_close.as_deref())?;
        let change = match q.change.as_deref() {
            Some(raw) => parse_number(symbol, "change", Some(raw))?,
            None => price - previous_close,
        };
        let change_percent = match q.change_percent.as_deref() {
            Some(raw) => parse_number(symbol, "change percent", Some(raw.trim_end_matches('%')))?,
            None if previous_close != 0.0 => change / previous_close * 100.0,
            None => 0.0,
        };

        Ok(Quote {
            symbol: q
                .symbol
                .map(|s| normalize_symbol(&s))
                .unwrap_or_else(|| normalize_symbol(symbol)),
            current_price: price,
            change,
            change_percent,
            high: parse_number(symbol, "high", q.high.as_deref()).unwrap_or(price),
            low: parse_number(symbol, "low", q.low.as_deref()).unwrap_or(price),
            open: parse_number(symbol, "open", q.open.as_deref()).unwrap_or(price),
            previous_close,
            timestamp: Utc::now(),
        })
    }
}

fn parse_number(symbol: &str, field: &str, raw: Option<&str>) -> Result<f64, CoreError> {
    let raw = raw.ok_or_else(|| CoreError::Api {
        provider: PROVIDER.into(),
        message: format!("Missing {field} for {symbol}"),
    })?;
    raw.trim().parse().map_err(|e| CoreError::Api {
        provider: PROVIDER.into(),
        message: format!("Invalid {field} format for {symbol}: {e}"),
    })
}

// ── Alpha Vantage API response types ────────────────────────────────

#[derive(Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "02. open")]
    open: Option<String>,
    #[serde(rename = "03. high")]
    high: Option<String>,
    #[serde(rename = "04. low")]
    low: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "08. previous close")]
    previous_close: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

#[async_trait]
impl QuoteSource for AlphaVantageProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote, CoreError> {
        let body = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", &normalize_symbol(symbol)),
                ("apikey", &self.api_key),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Self::parse_global_quote(symbol, &body)
    }
}
