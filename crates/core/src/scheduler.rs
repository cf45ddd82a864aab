//! Background refresh cycles.
//!
//! Two independent periodic tasks:
//! - **price cycle**: fetch a quote for every held symbol, one at a time with
//!   a pause between requests, and broadcast each as a `price_update`;
//! - **portfolio cycle**: revalue every user's current holdings against the
//!   latest quotes and broadcast a `portfolio_update` per user.
//!
//! A failure for one symbol or one user is logged and skipped. A failure to
//! list symbols or users aborts that iteration only; the next tick still
//! fires. Missed ticks are delayed, never queued up.
//!
//! [`RefreshScheduler::stop`] cancels both tasks and joins them, so no
//! broadcast happens after it returns.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::errors::CoreError;
use crate::hub::BroadcastHub;
use crate::providers::traits::QuoteSource;
use crate::services::portfolio_service::PortfolioService;
use crate::services::quote_book::QuoteBook;
use crate::storage::traits::HoldingsStore;

/// Outcome of one price cycle iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriceCycleReport {
    pub symbols: usize,
    pub fetched: usize,
    pub failed: usize,
    /// Number of viewer deliveries across all price updates
    pub deliveries: usize,
    pub cancelled: bool,
}

/// Outcome of one portfolio cycle iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortfolioCycleReport {
    pub users: usize,
    pub updated: usize,
    pub failed: usize,
    pub deliveries: usize,
    pub cancelled: bool,
}

/// State shared by both cycle tasks.
struct CycleContext {
    config: SchedulerConfig,
    store: Arc<dyn HoldingsStore>,
    quotes: Arc<dyn QuoteSource>,
    hub: BroadcastHub,
    book: QuoteBook,
    portfolio_service: PortfolioService,
}

impl CycleContext {
    async fn refresh_prices(&self, cancel: &CancellationToken) -> Result<PriceCycleReport, CoreError> {
        let symbols = self.store.distinct_symbols().await?;
        let mut report = PriceCycleReport {
            symbols: symbols.len(),
            ..Default::default()
        };

        for (idx, symbol) in symbols.iter().enumerate() {
            if idx > 0 && !self.config.request_delay().is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        report.cancelled = true;
                        return Ok(report);
                    }
                    _ = sleep(self.config.request_delay()) => {}
                }
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    return Ok(report);
                }
                result = self.quotes.get_quote(symbol) => result,
            };

            let quote = match result {
                Ok(quote) => quote,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "quote fetch failed; skipping symbol");
                    report.failed += 1;
                    continue;
                }
            };

            if cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(report);
            }

            report.fetched += 1;
            self.book.insert(quote.clone());
            report.deliveries += self.hub.broadcast_price_update(&quote);

            if let Err(e) = self.store.save_quote(&quote).await {
                warn!(symbol = %symbol, error = %e, "failed to persist quote");
            }
        }

        Ok(report)
    }

    async fn refresh_portfolios(
        &self,
        cancel: &CancellationToken,
    ) -> Result<PortfolioCycleReport, CoreError> {
        let users = self.store.users_with_holdings().await?;
        let mut report = PortfolioCycleReport {
            users: users.len(),
            ..Default::default()
        };

        for user in &users {
            if cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(report);
            }

            let holdings = match self.store.holdings_for_user(user).await {
                Ok(holdings) => holdings,
                Err(e) => {
                    warn!(user = %user, error = %e, "failed to load holdings; skipping user");
                    report.failed += 1;
                    continue;
                }
            };

            let quotes = self.book.quotes_for(holdings.iter().map(|h| h.symbol.as_str()));
            let update = self
                .portfolio_service
                .portfolio_update(Some(user), &holdings, &quotes);

            if cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(report);
            }

            report.updated += 1;
            report.deliveries += self.hub.broadcast_portfolio_update(&update);
        }

        Ok(report)
    }
}

/// Runs the price and portfolio cycles until stopped.
pub struct RefreshScheduler {
    context: Option<Arc<CycleContext>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl RefreshScheduler {
    /// Build a scheduler. With `quotes` set to `None` (no quote source
    /// configured) the scheduler is inert: [`start`](Self::start) logs and
    /// returns false.
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn HoldingsStore>,
        quotes: Option<Arc<dyn QuoteSource>>,
        hub: BroadcastHub,
        book: QuoteBook,
    ) -> Self {
        let context = quotes.map(|quotes| {
            Arc::new(CycleContext {
                config,
                store,
                quotes,
                hub,
                book,
                portfolio_service: PortfolioService::new(),
            })
        });
        Self {
            context,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// True when a quote source is configured.
    pub fn is_configured(&self) -> bool {
        self.context.is_some()
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Spawn both cycles. Returns false, without spawning anything, when no
    /// quote source is configured.
    pub fn start(&mut self) -> bool {
        let Some(context) = self.context.clone() else {
            warn!("no quote source configured; refresh scheduler not started");
            return false;
        };
        if self.is_running() {
            return true;
        }

        info!(
            price_interval_ms = context.config.price_interval_ms,
            portfolio_interval_ms = context.config.portfolio_interval_ms,
            quote_source = context.quotes.name(),
            "starting refresh scheduler"
        );

        let price_ctx = Arc::clone(&context);
        let price_cancel = self.cancel.clone();
        self.tasks.push(tokio::spawn(async move {
            run_price_loop(price_ctx, price_cancel).await;
        }));

        let portfolio_cancel = self.cancel.clone();
        self.tasks.push(tokio::spawn(async move {
            run_portfolio_loop(context, portfolio_cancel).await;
        }));

        true
    }

    /// Cancel both cycles and wait for them to exit.
    pub async fn stop(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "refresh task ended abnormally");
            }
        }
        self.cancel = CancellationToken::new();
        info!("refresh scheduler stopped");
    }

    /// Run one price cycle iteration inline.
    pub async fn refresh_prices_once(&self) -> Result<PriceCycleReport, CoreError> {
        let context = self.context.as_ref().ok_or(CoreError::NoQuoteSource)?;
        context.refresh_prices(&self.cancel).await
    }

    /// Run one portfolio cycle iteration inline.
    pub async fn refresh_portfolios_once(&self) -> Result<PortfolioCycleReport, CoreError> {
        let context = self.context.as_ref().ok_or(CoreError::NoQuoteSource)?;
        context.refresh_portfolios(&self.cancel).await
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_price_loop(context: Arc<CycleContext>, cancel: CancellationToken) {
    let mut ticker = interval(context.config.price_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match context.refresh_prices(&cancel).await {
            Ok(report) => debug!(
                symbols = report.symbols,
                fetched = report.fetched,
                failed = report.failed,
                deliveries = report.deliveries,
                "price cycle complete"
            ),
            Err(e) => warn!(error = %e, "price cycle aborted"),
        }
    }
    debug!("price cycle stopped");
}

async fn run_portfolio_loop(context: Arc<CycleContext>, cancel: CancellationToken) {
    let mut ticker = interval(context.config.portfolio_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match context.refresh_portfolios(&cancel).await {
            Ok(report) => debug!(
                users = report.users,
                updated = report.updated,
                failed = report.failed,
                deliveries = report.deliveries,
                "portfolio cycle complete"
            ),
            Err(e) => warn!(error = %e, "portfolio cycle aborted"),
        }
    }
    debug!("portfolio cycle stopped");
}
