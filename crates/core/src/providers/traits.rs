use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::quote::Quote;

/// Trait abstraction for all external quote providers.
///
/// Each API provider (Alpha Vantage, Yahoo Finance) implements this trait.
/// Providers are rate-limited and unreliable: every call may fail or be
/// slow, and callers treat any error as "no quote for this symbol right now".
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Fetch the latest quote for a ticker symbol.
    async fn get_quote(&self, symbol: &str) -> Result<Quote, CoreError>;
}
