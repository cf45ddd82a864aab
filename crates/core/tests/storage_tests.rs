// ═══════════════════════════════════════════════════════════════════
// Storage Tests: MemoryStore queries, JSON load/save
// ═══════════════════════════════════════════════════════════════════

use chrono::{TimeZone, Utc};
use portfolio_pulse_core::errors::CoreError;
use portfolio_pulse_core::models::holding::{Holding, PortfolioSnapshot};
use portfolio_pulse_core::models::quote::Quote;
use portfolio_pulse_core::storage::memory::MemoryStore;
use portfolio_pulse_core::storage::traits::HoldingsStore;
use tempfile::TempDir;

const HOLDINGS_JSON: &str = r#"{
    "users": {
        "alice": {
            "holdings": [
                { "symbol": "aapl", "quantity": 10, "averageCost": 150.0 },
                { "symbol": "MSFT", "quantity": 5, "averageCost": 300.0, "sector": "Technology" }
            ],
            "snapshots": [
                { "recordedAt": "2024-03-01T00:00:00Z", "totalValue": 3200.0 },
                { "recordedAt": "2024-01-01T00:00:00Z", "totalValue": 3000.0 }
            ]
        },
        "bob": {
            "holdings": [
                { "symbol": "AAPL", "quantity": 2, "averageCost": 140.0, "assetType": "stock" },
                { "symbol": "TSLA", "quantity": 0, "averageCost": 200.0 }
            ]
        },
        "carol": { "holdings": [] }
    }
}"#;

fn loaded_store() -> MemoryStore {
    MemoryStore::load_from_bytes(HOLDINGS_JSON.as_bytes()).unwrap()
}

// ── Queries ─────────────────────────────────────────────────────────

mod queries {
    use super::*;

    #[tokio::test]
    async fn distinct_symbols_skip_zero_quantities() {
        let store = loaded_store();
        assert_eq!(store.distinct_symbols().await.unwrap(), vec!["AAPL", "MSFT"]);
    }

    #[tokio::test]
    async fn users_with_holdings_skip_empty_portfolios() {
        let store = loaded_store();
        assert_eq!(store.users_with_holdings().await.unwrap(), vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn holdings_are_normalized() {
        let store = loaded_store();
        let holdings = store.holdings_for_user("alice").await.unwrap();
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].symbol, "AAPL");
        assert_eq!(holdings[1].sector.as_deref(), Some("Technology"));
    }

    #[tokio::test]
    async fn unknown_user_has_no_holdings() {
        let store = loaded_store();
        assert!(store.holdings_for_user("nobody").await.unwrap().is_empty());
        assert!(store.snapshots_for_user("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshots_sorted_oldest_first() {
        let store = loaded_store();
        let snapshots = store.snapshots_for_user("alice").await.unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].total_value, 3000.0);
        assert_eq!(snapshots[1].total_value, 3200.0);
    }

    #[tokio::test]
    async fn set_holdings_is_visible_immediately() {
        let store = MemoryStore::new();
        assert!(store.users_with_holdings().await.unwrap().is_empty());

        store.set_holdings("dave", vec![Holding::new("nvda", 1.0, 500.0)]);
        assert_eq!(store.users_with_holdings().await.unwrap(), vec!["dave"]);
        assert_eq!(store.distinct_symbols().await.unwrap(), vec!["NVDA"]);
    }

    #[tokio::test]
    async fn add_snapshot_keeps_order() {
        let store = MemoryStore::new();
        let later = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        store.add_snapshot("dave", PortfolioSnapshot { recorded_at: later, total_value: 2.0 });
        store.add_snapshot("dave", PortfolioSnapshot { recorded_at: earlier, total_value: 1.0 });

        let snapshots = store.snapshots_for_user("dave").await.unwrap();
        assert_eq!(snapshots[0].recorded_at, earlier);
        assert_eq!(snapshots[1].recorded_at, later);
    }

    #[tokio::test]
    async fn save_quote_keeps_latest() {
        let store = MemoryStore::new();
        store.save_quote(&Quote::from_prices("aapl", 1.0, 1.0, 1.0, 1.0, 1.0)).await.unwrap();
        store.save_quote(&Quote::from_prices("AAPL", 2.0, 1.0, 1.0, 2.0, 1.0)).await.unwrap();

        assert_eq!(store.saved_quote_count(), 1);
        assert_eq!(store.saved_quote("AAPL").unwrap().current_price, 2.0);
    }
}

// ── Files ───────────────────────────────────────────────────────────

mod files {
    use super::*;

    #[tokio::test]
    async fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("holdings.json");

        let store = loaded_store();
        store.save_to_file(&path).unwrap();

        let reloaded = MemoryStore::load_from_file(&path).unwrap();
        assert_eq!(
            reloaded.holdings_for_user("alice").await.unwrap(),
            store.holdings_for_user("alice").await.unwrap()
        );
        assert_eq!(reloaded.users_with_holdings().await.unwrap(), vec!["alice", "bob"]);
    }

    #[test]
    fn missing_file_is_file_io_error() {
        let dir = TempDir::new().unwrap();
        let result = MemoryStore::load_from_file(dir.path().join("absent.json"));
        assert!(matches!(result, Err(CoreError::FileIO(_))));
    }

    #[test]
    fn corrupt_file_is_deserialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("holdings.json");
        std::fs::write(&path, "{ users: nope").unwrap();
        assert!(matches!(
            MemoryStore::load_from_file(&path),
            Err(CoreError::Deserialization(_))
        ));
    }
}
