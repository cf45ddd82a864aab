use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::models::asset::normalize_symbol;
use crate::models::quote::Quote;

/// Latest quote per symbol, shared between the price cycle (writer) and the
/// portfolio cycle and analytics requests (readers).
///
/// Only quotes live here. Holdings are always read fresh from the store.
#[derive(Debug, Clone, Default)]
pub struct QuoteBook {
    quotes: Arc<RwLock<HashMap<String, Quote>>>,
}

impl QuoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a quote, replacing any older one for the same symbol.
    pub fn insert(&self, quote: Quote) {
        let symbol = normalize_symbol(&quote.symbol);
        self.quotes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(symbol, quote);
    }

    pub fn get(&self, symbol: &str) -> Option<Quote> {
        self.quotes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize_symbol(symbol))
            .cloned()
    }

    /// Copy out the quotes for `symbols` that are present in the book.
    pub fn quotes_for<'a>(&self, symbols: impl IntoIterator<Item = &'a str>) -> HashMap<String, Quote> {
        let quotes = self.quotes.read().unwrap_or_else(PoisonError::into_inner);
        symbols
            .into_iter()
            .filter_map(|s| {
                let symbol = normalize_symbol(s);
                quotes.get(&symbol).map(|q| (symbol, q.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.quotes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
