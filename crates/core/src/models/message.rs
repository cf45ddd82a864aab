//! Wire protocol between the hub and connected viewers.
//!
//! Every frame is a JSON envelope discriminated by `type`:
//!
//! ```text
//! { "type": "connected" | "price_update" | "portfolio_update" | "subscribe" | "unsubscribe",
//!   "symbol": "AAPL",            (optional)
//!   "data": { ... },             (type-specific)
//!   "timestamp": 1700000000 }    (unix seconds)
//! ```
//!
//! Outbound frames are [`ServerMessage`], inbound frames are [`ClientMessage`].

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::asset::normalize_symbol;
use super::quote::Quote;
use crate::errors::CoreError;

/// Subscription sentinel: receive every price update plus portfolio-level updates.
pub const PORTFOLIO_CHANNEL: &str = "portfolio";

/// Frames pushed from the hub to a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        data: ConnectedData,
        timestamp: i64,
    },
    PriceUpdate {
        symbol: String,
        data: PriceData,
        timestamp: i64,
    },
    PortfolioUpdate {
        data: PortfolioUpdate,
        timestamp: i64,
    },
}

impl ServerMessage {
    pub fn connected(viewer_id: impl Into<String>) -> Self {
        ServerMessage::Connected {
            data: ConnectedData {
                viewer_id: viewer_id.into(),
                message: "Connected to live portfolio updates".to_string(),
            },
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn price_update(quote: &Quote) -> Self {
        ServerMessage::PriceUpdate {
            symbol: quote.symbol.clone(),
            data: PriceData::from(quote),
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn portfolio_update(update: PortfolioUpdate) -> Self {
        ServerMessage::PortfolioUpdate {
            data: update,
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Encode the frame as JSON text.
    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedData {
    pub viewer_id: String,
    pub message: String,
}

/// The subset of a [`Quote`] carried in a `price_update` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceData {
    pub current_price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub previous_close: f64,
}

impl From<&Quote> for PriceData {
    fn from(q: &Quote) -> Self {
        Self {
            current_price: q.current_price,
            change: q.change,
            change_percent: q.change_percent,
            high: q.high,
            low: q.low,
            open: q.open,
            previous_close: q.previous_close,
        }
    }
}

/// Aggregate figures for one user's portfolio, pushed once per portfolio cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub total_value: f64,
    pub daily_change: f64,
    pub daily_change_percent: f64,
    pub unrealized_gain_loss: f64,
    pub unrealized_gain_loss_percent: f64,
}

/// Frames sent by a viewer to the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        #[serde(alias = "data")]
        symbol: String,
    },
    Unsubscribe {
        #[serde(alias = "data")]
        symbol: String,
    },
    /// Any other `type`. Ignored by the hub.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse an inbound text frame. Malformed frames yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Normalize a subscription topic: the portfolio sentinel is matched
/// case-insensitively and kept lowercase, everything else is a symbol.
pub fn normalize_topic(topic: &str) -> String {
    let trimmed = topic.trim();
    if trimmed.eq_ignore_ascii_case(PORTFOLIO_CHANNEL) {
        PORTFOLIO_CHANNEL.to_string()
    } else {
        normalize_symbol(trimmed)
    }
}
