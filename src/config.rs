use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub signals: SignalConfig,
    pub sizing: SizingConfig,
    pub risk: RiskConfig,
    pub lifecycle: LifecycleConfig,
    pub execution: ExecutionConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ai: AiConfig,
    pub dry_run: DryRunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// REST endpoint serving market snapshots
    pub gamma_url: String,
    /// Markets fetched per scan
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: u32,
    /// HTTP timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_fetch_limit() -> u32 {
    500
}

fn default_http_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    /// Minimum lifetime volume to consider a market
    pub min_volume_usd: Decimal,
    /// YES price below which the market is a longshot (buy YES)
    pub longshot_threshold: Decimal,
    /// YES price above which the market is a heavy favorite (buy NO)
    pub favorite_threshold: Decimal,
    /// Minimum mispricing percentage required to emit a signal
    pub min_mispricing_pct: Decimal,
    /// Minutes a rule-out verdict stays valid before re-evaluation
    #[serde(default = "default_ruleout_refresh")]
    pub ruleout_refresh_mins: i64,
    /// Price move that eagerly invalidates a rule-out verdict
    #[serde(default = "default_ruleout_delta")]
    pub ruleout_invalidation_delta: Decimal,
}

fn default_ruleout_refresh() -> i64 {
    30
}

fn default_ruleout_delta() -> Decimal {
    rust_decimal_macros::dec!(0.05)
}

#[derive(Debug, Clone, Deserialize)]
pub struct SizingConfig {
    /// Fraction of full Kelly to stake (conservatism multiplier)
    pub kelly_fraction: Decimal,
    pub min_position_usd: Decimal,
    pub max_position_usd: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    pub starting_bankroll_usd: Decimal,
    pub min_position_usd: Decimal,
    pub max_position_usd: Decimal,
    pub max_total_exposure_usd: Decimal,
    pub max_positions: usize,
    /// Maximum acceptable deviation of yes+no from parity, in percent
    pub max_spread_pct: Decimal,
    /// Drawdown from peak equity that trips the emergency stop, in percent
    pub max_drawdown_pct: Decimal,
    /// Daily realized-loss floor in USD (absolute value)
    pub daily_loss_limit_usd: Decimal,
    /// When true, breaching the daily loss floor halts trading; otherwise it
    /// is only logged
    #[serde(default)]
    pub daily_loss_halts: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Close at this unrealized gain, in percent
    pub take_profit_pct: Decimal,
    /// Close at this unrealized loss, in percent (negative)
    pub stop_loss_pct: Decimal,
    /// Reversion-complete applies only to entries below this price
    pub reversion_entry_ceiling: Decimal,
    /// Reversion-complete fires once the held side trades at or above this
    pub reversion_exit_threshold: Decimal,
    /// Held-side price on a closed market at or above this settles as a win
    #[serde(default = "default_settle_win")]
    pub settlement_win_price: Decimal,
    /// Held-side price on a closed market at or below this settles as a loss
    #[serde(default = "default_settle_loss")]
    pub settlement_loss_price: Decimal,
}

fn default_settle_win() -> Decimal {
    rust_decimal_macros::dec!(0.95)
}

fn default_settle_loss() -> Decimal {
    rust_decimal_macros::dec!(0.05)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Seconds between scan cycles
    pub check_interval_secs: u64,
    /// Bound on each best-effort close during shutdown, in seconds
    #[serde(default = "default_close_timeout")]
    pub close_timeout_secs: u64,
}

fn default_close_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AiConfig {
    /// Enable the qualitative AI gate; disabled runs with the always-approve
    /// variant
    #[serde(default)]
    pub enabled: bool,
    /// OpenAI-compatible chat completions endpoint
    #[serde(default = "default_ai_url")]
    pub api_url: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
    /// Environment variable holding the API key
    #[serde(default = "default_ai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

fn default_ai_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_ai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_ai_timeout() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize)]
pub struct DryRunConfig {
    /// Enable dry run mode (no real orders)
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("api.fetch_limit", 500)?
            .set_default("database.max_connections", 5)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SKEW_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (SKEW_RISK__MAX_POSITIONS, etc.)
            .add_source(
                Environment::with_prefix("SKEW")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Create a default configuration for CLI usage
    pub fn default_config(dry_run: bool) -> Self {
        use rust_decimal_macros::dec;

        Self {
            api: ApiConfig {
                gamma_url: "https://gamma-api.polymarket.com".to_string(),
                fetch_limit: 500,
                timeout_secs: 30,
            },
            signals: SignalConfig {
                min_volume_usd: dec!(10000),
                longshot_threshold: dec!(0.30),
                favorite_threshold: dec!(0.70),
                min_mispricing_pct: dec!(5.0),
                ruleout_refresh_mins: 30,
                ruleout_invalidation_delta: dec!(0.05),
            },
            sizing: SizingConfig {
                kelly_fraction: dec!(0.25),
                min_position_usd: dec!(10),
                max_position_usd: dec!(500),
            },
            risk: RiskConfig {
                starting_bankroll_usd: dec!(1000),
                min_position_usd: dec!(10),
                max_position_usd: dec!(500),
                max_total_exposure_usd: dec!(2000),
                max_positions: 10,
                max_spread_pct: dec!(5),
                max_drawdown_pct: dec!(25),
                daily_loss_limit_usd: dec!(200),
                daily_loss_halts: false,
            },
            lifecycle: LifecycleConfig {
                take_profit_pct: dec!(50),
                stop_loss_pct: dec!(-50),
                reversion_entry_ceiling: dec!(0.30),
                reversion_exit_threshold: dec!(0.40),
                settlement_win_price: dec!(0.95),
                settlement_loss_price: dec!(0.05),
            },
            execution: ExecutionConfig {
                check_interval_secs: 300,
                close_timeout_secs: 10,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/skew".to_string(),
                max_connections: 5,
            },
            ai: AiConfig::default(),
            dry_run: DryRunConfig { enabled: dry_run },
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        use rust_decimal::Decimal;

        let mut errors = Vec::new();
        let unit = |p: Decimal| p > Decimal::ZERO && p < Decimal::ONE;

        if !unit(self.signals.longshot_threshold) {
            errors.push("longshot_threshold must be between 0 and 1".to_string());
        }
        if !unit(self.signals.favorite_threshold) {
            errors.push("favorite_threshold must be between 0 and 1".to_string());
        }
        if self.signals.longshot_threshold >= self.signals.favorite_threshold {
            errors.push("longshot_threshold must be below favorite_threshold".to_string());
        }
        if self.signals.min_mispricing_pct < Decimal::ZERO {
            errors.push("min_mispricing_pct must be non-negative".to_string());
        }
        if self.signals.ruleout_refresh_mins <= 0 {
            errors.push("ruleout_refresh_mins must be positive".to_string());
        }
        if !unit(self.signals.ruleout_invalidation_delta) {
            errors.push("ruleout_invalidation_delta must be between 0 and 1".to_string());
        }

        if self.sizing.kelly_fraction <= Decimal::ZERO || self.sizing.kelly_fraction > Decimal::ONE
        {
            errors.push("kelly_fraction must be in (0, 1]".to_string());
        }
        if self.sizing.min_position_usd > self.sizing.max_position_usd {
            errors.push("min_position_usd must not exceed max_position_usd".to_string());
        }

        if self.risk.starting_bankroll_usd <= Decimal::ZERO {
            errors.push("starting_bankroll_usd must be positive".to_string());
        }
        if self.risk.max_total_exposure_usd <= Decimal::ZERO {
            errors.push("max_total_exposure_usd must be positive".to_string());
        }
        if self.risk.max_positions == 0 {
            errors.push("max_positions must be at least 1".to_string());
        }
        if self.risk.max_drawdown_pct <= Decimal::ZERO {
            errors.push("max_drawdown_pct must be positive".to_string());
        }

        if self.lifecycle.take_profit_pct <= Decimal::ZERO {
            errors.push("take_profit_pct must be positive".to_string());
        }
        if self.lifecycle.stop_loss_pct >= Decimal::ZERO {
            errors.push("stop_loss_pct must be negative".to_string());
        }
        if self.lifecycle.reversion_exit_threshold <= self.lifecycle.reversion_entry_ceiling {
            errors.push(
                "reversion_exit_threshold must be above reversion_entry_ceiling".to_string(),
            );
        }

        if self.execution.check_interval_secs == 0 {
            errors.push("check_interval_secs must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
