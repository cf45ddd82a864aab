use thiserror::Error;

/// Unified error type for the entire portfolio-pulse-core library.
/// Every public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Storage ─────────────────────────────────────────────────────
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("File I/O error: {0}")]
    FileIO(String),

    // ── API / Network ───────────────────────────────────────────────
    #[error("API error ({provider}): {message}")]
    Api {
        provider: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("No quote source configured")]
    NoQuoteSource,

    #[error("Quote not available for {0}")]
    QuoteNotAvailable(String),

    // ── Configuration ───────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    Config(String),

    // ── Client validation ───────────────────────────────────────────
    #[error("Invalid trade: {0}")]
    InvalidTrade(String),

    #[error("No current position in {symbol}")]
    NoPosition { symbol: String },

    #[error("Insufficient quantity of {symbol}: requested {requested}, held {held}")]
    InsufficientQuantity {
        symbol: String,
        requested: f64,
        held: f64,
    },

    #[error("Unknown performance period: {0}")]
    InvalidPeriod(String),
}

impl CoreError {
    /// True for errors caused by the caller's request rather than a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidTrade(_)
                | CoreError::NoPosition { .. }
                | CoreError::InsufficientQuantity { .. }
                | CoreError::InvalidPeriod(_)
        )
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors carry the full URL, including the apikey query parameter.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::Network(sanitized)
    }
}
