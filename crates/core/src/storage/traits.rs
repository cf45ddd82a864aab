use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::holding::{Holding, PortfolioSnapshot};
use crate::models::quote::Quote;

/// Read/write queries the core needs from the relational store.
///
/// The store belongs to the CRUD layer. The core reads holdings fresh on
/// every call and only ever writes quotes, best-effort.
#[async_trait]
pub trait HoldingsStore: Send + Sync {
    /// Distinct symbols with a non-zero quantity in any portfolio, sorted.
    async fn distinct_symbols(&self) -> Result<Vec<String>, CoreError>;

    /// Users owning at least one non-zero holding, sorted.
    async fn users_with_holdings(&self) -> Result<Vec<String>, CoreError>;

    /// Current holdings of a user. Unknown users have no holdings.
    async fn holdings_for_user(&self, user_id: &str) -> Result<Vec<Holding>, CoreError>;

    /// Recorded total-value history of a user, oldest first.
    async fn snapshots_for_user(&self, user_id: &str) -> Result<Vec<PortfolioSnapshot>, CoreError>;

    /// Persist the latest quote for a symbol.
    async fn save_quote(&self, quote: &Quote) -> Result<(), CoreError>;
}
