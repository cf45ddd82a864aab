use std::collections::HashMap;
use std::net::SocketAddr;

use portfolio_pulse_core::config::{
    HubConfig, PortfolioScope, QuoteSourceSettings, SchedulerConfig,
};
use portfolio_pulse_core::errors::CoreError;

/// Server settings, read from `PULSE_*` environment variables.
pub struct Config {
    pub listen_addr: SocketAddr,
    pub holdings_path: String,
    pub reference_path: Option<String>,
    pub scheduler: SchedulerConfig,
    pub hub: HubConfig,
    pub quote_sources: QuoteSourceSettings,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, CoreError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let env_or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());
        let env_u64 = |key: &str, default: u64| {
            var(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        let listen_addr: SocketAddr = env_or("PULSE_LISTEN_ADDR", "0.0.0.0:8080")
            .parse()
            .map_err(|e| CoreError::Config(format!("PULSE_LISTEN_ADDR: {e}")))?;
        let holdings_path = env_or("PULSE_HOLDINGS_FILE", "./data/holdings.json");
        let reference_path = var("PULSE_REFERENCE_FILE").filter(|s| !s.trim().is_empty());

        let scheduler = SchedulerConfig {
            price_interval_ms: secs_to_ms(env_u64("PULSE_PRICE_INTERVAL_SECS", 30)),
            portfolio_interval_ms: secs_to_ms(env_u64("PULSE_PORTFOLIO_INTERVAL_SECS", 60)),
            request_delay_ms: env_u64("PULSE_REQUEST_DELAY_MS", 200),
        };

        let hub = HubConfig {
            outbound_capacity: usize::try_from(env_u64("PULSE_OUTBOUND_CAPACITY", 64))
                .unwrap_or(usize::MAX),
            portfolio_scope: env_or("PULSE_PORTFOLIO_SCOPE", "per_user")
                .parse::<PortfolioScope>()
                .map_err(|e| CoreError::Config(format!("PULSE_PORTFOLIO_SCOPE: {e}")))?,
        };

        let mut api_keys = HashMap::new();
        if let Some(key) = var("ALPHAVANTAGE_API_KEY") {
            api_keys.insert("alphavantage".to_string(), key);
        }
        let quote_sources = QuoteSourceSettings {
            yahoo_enabled: env_or("PULSE_YAHOO_ENABLED", "true")
                .parse()
                .unwrap_or(true),
            api_keys,
        };

        Ok(Self {
            listen_addr,
            holdings_path,
            reference_path,
            scheduler,
            hub,
            quote_sources,
        })
    }
}

fn secs_to_ms(secs: u64) -> u64 {
    secs.saturating_mul(1000)
}
