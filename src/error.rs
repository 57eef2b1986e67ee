use thiserror::Error;

/// Main error type for the trading bot
#[derive(Error, Debug)]
pub enum SkewError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Market data errors
    #[error("Market data unavailable: {0}")]
    MarketDataUnavailable(String),

    #[error("Invalid market data: {0}")]
    InvalidMarketData(String),

    // Order execution errors
    #[error("Order submission failed: {0}")]
    OrderSubmission(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    // Position errors
    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Invalid position state: {0}")]
    InvalidPositionState(String),

    // Risk management errors
    #[error("Risk limit exceeded: {0}")]
    RiskLimitExceeded(String),

    #[error("Emergency stop active: {0}")]
    EmergencyStop(String),

    // AI gate errors
    #[error("AI gate error: {0}")]
    AiGate(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for SkewError
pub type Result<T> = std::result::Result<T, SkewError>;

/// Specific error types for risk management
///
/// `RiskManager::check_entry` returns the first failing check. A rejection is
/// normal control flow for the engine (it becomes a rule-out entry), not a
/// reason to abort the cycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error("Position too large: requested ${requested}, limit ${limit}")]
    PositionTooLarge {
        requested: rust_decimal::Decimal,
        limit: rust_decimal::Decimal,
    },

    #[error("Position too small: requested ${requested}, minimum ${minimum}")]
    PositionTooSmall {
        requested: rust_decimal::Decimal,
        minimum: rust_decimal::Decimal,
    },

    #[error("Max exposure exceeded: current ${current} + requested ${requested} > limit ${limit}")]
    MaxExposureExceeded {
        current: rust_decimal::Decimal,
        requested: rust_decimal::Decimal,
        limit: rust_decimal::Decimal,
    },

    #[error("Max positions reached: {count} >= {limit}")]
    MaxPositionsReached { count: usize, limit: usize },

    #[error("Spread too wide: {spread_pct}% > {max_pct}%")]
    SpreadTooWide {
        spread_pct: rust_decimal::Decimal,
        max_pct: rust_decimal::Decimal,
    },

    #[error("Drawdown limit breached: {drawdown_pct}% > {max_pct}%")]
    DrawdownBreached {
        drawdown_pct: rust_decimal::Decimal,
        max_pct: rust_decimal::Decimal,
    },

    #[error("Trading halted: {reason}")]
    TradingHalted { reason: String },
}

impl From<RiskError> for SkewError {
    fn from(err: RiskError) -> Self {
        SkewError::RiskLimitExceeded(err.to_string())
    }
}
