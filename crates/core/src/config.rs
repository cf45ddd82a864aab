use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Timing of the two refresh cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Period of the price cycle, in milliseconds.
    pub price_interval_ms: u64,

    /// Period of the portfolio cycle, in milliseconds.
    pub portfolio_interval_ms: u64,

    /// Pause between two quote requests within one price cycle, in milliseconds.
    /// Keeps the price cycle under the quote provider's rate limit.
    pub request_delay_ms: u64,
}

impl SchedulerConfig {
    pub fn price_interval(&self) -> Duration {
        Duration::from_millis(self.price_interval_ms.max(1))
    }

    pub fn portfolio_interval(&self) -> Duration {
        Duration::from_millis(self.portfolio_interval_ms.max(1))
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            price_interval_ms: 30_000,
            portfolio_interval_ms: 60_000,
            request_delay_ms: 200,
        }
    }
}

/// Which viewers receive a user's portfolio update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioScope {
    /// Only viewers bound to the update's user
    #[default]
    PerUser,
    /// Every registered viewer (single-tenant deployments)
    Global,
}

impl std::str::FromStr for PortfolioScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "per_user" | "per-user" | "user" => Ok(PortfolioScope::PerUser),
            "global" | "all" => Ok(PortfolioScope::Global),
            other => Err(format!("unknown portfolio scope '{other}'")),
        }
    }
}

/// Broadcast hub settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Capacity of each viewer's outbound queue. A viewer whose queue is full
    /// at broadcast time is disconnected.
    pub outbound_capacity: usize,

    pub portfolio_scope: PortfolioScope,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 64,
            portfolio_scope: PortfolioScope::PerUser,
        }
    }
}

/// Which quote providers to register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteSourceSettings {
    /// Register Yahoo Finance (no API key needed).
    pub yahoo_enabled: bool,

    /// API keys for providers that require them.
    /// Keys: provider name (e.g., "alphavantage").
    pub api_keys: HashMap<String, String>,
}

impl Default for QuoteSourceSettings {
    fn default() -> Self {
        Self {
            yahoo_enabled: true,
            api_keys: HashMap::new(),
        }
    }
}
