pub mod config;
pub mod errors;
pub mod hub;
pub mod models;
pub mod providers;
pub mod scheduler;
pub mod services;
pub mod storage;

use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

use config::SchedulerConfig;
use errors::CoreError;
use hub::BroadcastHub;
use models::{
    analytics::{AllocationBreakdown, PerformancePeriod, PerformanceResult, RiskMetrics, WhatIfRequest, WhatIfResult},
    holding::Holding,
    quote::Quote,
    reference::ReferenceTable,
};
use providers::traits::QuoteSource;
use scheduler::RefreshScheduler;
use services::{analytics_service::AnalyticsService, quote_book::QuoteBook};
use storage::traits::HoldingsStore;

/// Main entry point for the Portfolio Pulse core library.
///
/// Wires the holdings store, the quote source, the shared quote book, the
/// analytics engine and the broadcast hub together. Analytics requests are
/// answered on demand; live updates come from the [`RefreshScheduler`]
/// returned by [`scheduler`](Self::scheduler).
#[must_use]
pub struct PortfolioPulse {
    store: Arc<dyn HoldingsStore>,
    quotes: Option<Arc<dyn QuoteSource>>,
    book: QuoteBook,
    analytics: AnalyticsService,
    hub: BroadcastHub,
}

impl std::fmt::Debug for PortfolioPulse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioPulse")
            .field("quote_source", &self.quotes.as_ref().map(|q| q.name().to_string()))
            .field("cached_quotes", &self.book.len())
            .field("reference_symbols", &self.analytics.reference().len())
            .field("hub", &self.hub)
            .finish()
    }
}

impl PortfolioPulse {
    /// `quotes` is `None` when no quote source is configured; analytics then
    /// value every holding at cost basis and the scheduler stays idle.
    pub fn new(
        store: Arc<dyn HoldingsStore>,
        quotes: Option<Arc<dyn QuoteSource>>,
        reference: Arc<ReferenceTable>,
        hub: BroadcastHub,
    ) -> Self {
        Self {
            store,
            quotes,
            book: QuoteBook::new(),
            analytics: AnalyticsService::new(reference),
            hub,
        }
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub fn quote_book(&self) -> &QuoteBook {
        &self.book
    }

    pub fn analytics(&self) -> &AnalyticsService {
        &self.analytics
    }

    pub fn has_quote_source(&self) -> bool {
        self.quotes.is_some()
    }

    /// A refresh scheduler sharing this instance's store, quote source,
    /// quote book and hub.
    pub fn scheduler(&self, config: SchedulerConfig) -> RefreshScheduler {
        RefreshScheduler::new(
            config,
            Arc::clone(&self.store),
            self.quotes.clone(),
            self.hub.clone(),
            self.book.clone(),
        )
    }

    // ── Analytics ───────────────────────────────────────────────────

    /// Performance of a user's portfolio over `period`.
    pub async fn performance(
        &self,
        user_id: &str,
        period: PerformancePeriod,
    ) -> Result<PerformanceResult, CoreError> {
        let holdings = self.store.holdings_for_user(user_id).await?;
        let snapshots = self.store.snapshots_for_user(user_id).await?;
        let quotes = self.current_quotes(&holdings).await;
        Ok(self
            .analytics
            .compute_performance(&holdings, &quotes, &snapshots, period, Utc::now()))
    }

    /// Risk metrics of a user's portfolio.
    pub async fn risk(&self, user_id: &str) -> Result<RiskMetrics, CoreError> {
        let holdings = self.store.holdings_for_user(user_id).await?;
        let snapshots = self.store.snapshots_for_user(user_id).await?;
        let quotes = self.current_quotes(&holdings).await;
        let valued = self.analytics.value_holdings(&holdings, &quotes);
        Ok(self.analytics.compute_risk(&valued, &snapshots))
    }

    /// Allocation of a user's portfolio by asset type, sector and holding.
    pub async fn allocation(&self, user_id: &str) -> Result<AllocationBreakdown, CoreError> {
        let holdings = self.store.holdings_for_user(user_id).await?;
        let quotes = self.current_quotes(&holdings).await;
        let valued = self.analytics.value_holdings(&holdings, &quotes);
        Ok(self.analytics.compute_allocation(&valued))
    }

    /// Simulate a trade against a user's current holdings. Nothing is written.
    pub async fn what_if(
        &self,
        user_id: &str,
        request: &WhatIfRequest,
    ) -> Result<WhatIfResult, CoreError> {
        let holdings = self.store.holdings_for_user(user_id).await?;
        let quotes = self.current_quotes(&holdings).await;
        let valued = self.analytics.value_holdings(&holdings, &quotes);
        let allocation = self.analytics.compute_allocation(&valued);
        self.analytics.what_if(request, &valued, &allocation)
    }

    /// Latest quote for every held symbol: from the quote book, else fetched
    /// from the quote source. Symbols with no quote are left out, which the
    /// analytics engine reports as a cost-basis fallback.
    async fn current_quotes(&self, holdings: &[Holding]) -> HashMap<String, Quote> {
        let symbols: BTreeSet<&str> = holdings.iter().map(|h| h.symbol.as_str()).collect();
        let mut quotes = self.book.quotes_for(symbols.iter().copied());

        let Some(source) = &self.quotes else {
            return quotes;
        };
        for symbol in symbols {
            if quotes.contains_key(symbol) {
                continue;
            }
            match source.get_quote(symbol).await {
                Ok(quote) => {
                    self.book.insert(quote.clone());
                    quotes.insert(symbol.to_string(), quote);
                }
                Err(e) => debug!(symbol, error = %e, "quote unavailable for analytics"),
            }
        }
        quotes
    }
}
