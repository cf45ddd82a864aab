use async_trait::async_trait;
use tracing::{debug, warn};

use super::alphavantage::AlphaVantageProvider;
use super::traits::QuoteSource;
use super::yahoo_finance::YahooFinanceProvider;
use crate::config::QuoteSourceSettings;
use crate::errors::CoreError;
use crate::models::quote::Quote;

/// Ordered list of quote providers with automatic fallback.
///
/// The registry is itself a [`QuoteSource`]: a lookup tries providers in
/// registration order and returns the first valid quote. An empty registry
/// means no quote source is configured.
pub struct QuoteSourceRegistry {
    providers: Vec<Box<dyn QuoteSource>>,
}

impl QuoteSourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Create a registry with the providers enabled in `settings`.
    pub fn new_with_defaults(settings: &QuoteSourceSettings) -> Self {
        let mut registry = Self::new();

        // Yahoo Finance: no API key needed (primary)
        if settings.yahoo_enabled {
            match YahooFinanceProvider::new() {
                Ok(yahoo) => registry.register(Box::new(yahoo)),
                Err(e) => warn!(error = %e, "Yahoo Finance provider unavailable"),
            }
        }

        // Alpha Vantage: requires an API key (fallback)
        if let Some(key) = settings.api_keys.get("alphavantage") {
            if !key.trim().is_empty() {
                registry.register(Box::new(AlphaVantageProvider::new(key.clone())));
            }
        }

        registry
    }

    /// Register a new quote provider. Earlier registrations take priority.
    pub fn register(&mut self, provider: Box<dyn QuoteSource>) {
        self.providers.push(provider);
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Names of all registered providers, in priority order.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }
}

impl Default for QuoteSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteSource for QuoteSourceRegistry {
    fn name(&self) -> &str {
        "registry"
    }

    /// Fetch a quote with automatic fallback.
    ///
    /// Quotes with a non-finite or negative price are rejected and the next
    /// provider is tried.
    async fn get_quote(&self, symbol: &str) -> Result<Quote, CoreError> {
        if self.providers.is_empty() {
            return Err(CoreError::NoQuoteSource);
        }

        let mut last_error = None;
        for provider in &self.providers {
            match provider.get_quote(symbol).await {
                Ok(quote) if quote.is_valid() => return Ok(quote),
                Ok(quote) => {
                    last_error = Some(CoreError::Api {
                        provider: provider.name().to_string(),
                        message: format!(
                            "Invalid price returned for {symbol}: {} (must be finite and non-negative)",
                            quote.current_price
                        ),
                    });
                }
                Err(e) => {
                    debug!(provider = provider.name(), symbol, error = %e, "quote provider failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(CoreError::NoQuoteSource))
    }
}
