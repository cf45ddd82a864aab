use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use super::traits::HoldingsStore;
use crate::errors::CoreError;
use crate::models::asset::normalize_symbol;
use crate::models::holding::{Holding, PortfolioSnapshot};
use crate::models::quote::Quote;

/// One user's stored portfolio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPortfolio {
    #[serde(default)]
    pub holdings: Vec<Holding>,

    /// Total-value history, oldest first
    #[serde(default)]
    pub snapshots: Vec<PortfolioSnapshot>,
}

/// Serializable content of a [`MemoryStore`] (the holdings JSON file).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub users: BTreeMap<String, UserPortfolio>,
}

/// In-process [`HoldingsStore`], optionally seeded from a JSON file.
///
/// Used by the server for file-backed deployments and by tests. Saved
/// quotes are kept in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
    quotes: RwLock<HashMap<String, Quote>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: StoreData) -> Self {
        let data = StoreData {
            users: data
                .users
                .into_iter()
                .map(|(user, mut portfolio)| {
                    for h in &mut portfolio.holdings {
                        h.symbol = normalize_symbol(&h.symbol);
                    }
                    portfolio.snapshots.sort_by_key(|s| s.recorded_at);
                    (user, portfolio)
                })
                .collect(),
        };
        Self {
            data: RwLock::new(data),
            quotes: RwLock::new(HashMap::new()),
        }
    }

    /// Parse a holdings document: `{"users": {"alice": {"holdings": [...], "snapshots": [...]}}}`.
    pub fn load_from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let data: StoreData = serde_json::from_slice(bytes)
            .map_err(|e| CoreError::Deserialization(format!("Failed to parse holdings file: {e}")))?;
        Ok(Self::from_data(data))
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let bytes = std::fs::read(path)?;
        Self::load_from_bytes(&bytes)
    }

    /// Write the current holdings and snapshots as a holdings document.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), CoreError> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner).clone();
        let json = serde_json::to_vec_pretty(&data)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize holdings: {e}")))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Replace a user's holdings (what an external CRUD mutation would do).
    pub fn set_holdings(&self, user_id: &str, holdings: Vec<Holding>) {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.users.entry(user_id.to_string()).or_default().holdings = holdings;
    }

    /// Append a total-value snapshot, keeping the history sorted.
    pub fn add_snapshot(&self, user_id: &str, snapshot: PortfolioSnapshot) {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let snapshots = &mut data.users.entry(user_id.to_string()).or_default().snapshots;
        let pos = snapshots
            .binary_search_by_key(&snapshot.recorded_at, |s| s.recorded_at)
            .unwrap_or_else(|pos| pos);
        snapshots.insert(pos, snapshot);
    }

    /// The last quote saved for a symbol.
    pub fn saved_quote(&self, symbol: &str) -> Option<Quote> {
        self.quotes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize_symbol(symbol))
            .cloned()
    }

    pub fn saved_quote_count(&self) -> usize {
        self.quotes.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl HoldingsStore for MemoryStore {
    async fn distinct_symbols(&self) -> Result<Vec<String>, CoreError> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        let symbols: BTreeSet<String> = data
            .users
            .values()
            .flat_map(|p| p.holdings.iter())
            .filter(|h| h.quantity != 0.0)
            .map(|h| h.symbol.clone())
            .collect();
        Ok(symbols.into_iter().collect())
    }

    async fn users_with_holdings(&self) -> Result<Vec<String>, CoreError> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data
            .users
            .iter()
            .filter(|(_, p)| p.holdings.iter().any(|h| h.quantity != 0.0))
            .map(|(user, _)| user.clone())
            .collect())
    }

    async fn holdings_for_user(&self, user_id: &str) -> Result<Vec<Holding>, CoreError> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data
            .users
            .get(user_id)
            .map(|p| p.holdings.clone())
            .unwrap_or_default())
    }

    async fn snapshots_for_user(&self, user_id: &str) -> Result<Vec<PortfolioSnapshot>, CoreError> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data
            .users
            .get(user_id)
            .map(|p| p.snapshots.clone())
            .unwrap_or_default())
    }

    async fn save_quote(&self, quote: &Quote) -> Result<(), CoreError> {
        self.quotes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize_symbol(&quote.symbol), quote.clone());
        Ok(())
    }
}
