use clap::Parser;
use skew::adapters::{
    AiGate, ApproveAll, ChatGate, GammaClient, MemoryStore, PositionStore, PostgresStore,
};
use skew::cli::{self, Cli, Commands};
use skew::config::AppConfig;
use skew::error::{Result, SkewError};
use skew::exchange::PaperExecutor;
use skew::strategy::TradeEngine;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match AppConfig::load_from(&cli.config) {
        Ok(mut c) => {
            c.dry_run.enabled = cli.dry_run;
            c
        }
        Err(e) => {
            eprintln!("Failed to load configuration ({}), using defaults", e);
            AppConfig::default_config(cli.dry_run)
        }
    };

    init_logging(&config);

    if let Err(errors) = config.validate() {
        for message in &errors {
            error!("config: {}", message);
        }
        return Err(SkewError::Validation(format!(
            "{} configuration error(s)",
            errors.len()
        )));
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_bot(config, &cli.strategy_id).await,
        Commands::Scan => cli::run_scan(&config).await,
        Commands::Status => run_status(config, &cli.strategy_id).await,
    }
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run_bot(config: AppConfig, strategy_id: &str) -> Result<()> {
    info!("Starting mean-reversion trading bot (skew)");
    info!(
        strategy_id,
        dry_run = config.dry_run.enabled,
        interval_secs = config.execution.check_interval_secs,
        "configuration loaded"
    );

    let store = connect_store(&config).await;
    let feed = Arc::new(GammaClient::new(&config.api)?);
    let ai_gate = build_ai_gate(&config);
    let executor = Arc::new(PaperExecutor::new(config.dry_run.enabled));

    let mut engine =
        TradeEngine::new(config, strategy_id, feed, ai_gate, executor, store).await?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received");
            let _ = stop_tx.send(true);
        }
    });

    engine.run(stop_rx).await
}

async fn run_status(config: AppConfig, strategy_id: &str) -> Result<()> {
    let store = PostgresStore::new(&config.database.url, config.database.max_connections).await?;
    cli::show_status(&store, strategy_id, config.risk.starting_bankroll_usd).await
}

/// Connect to PostgreSQL, degrading to the in-memory store when unreachable
/// so the bot keeps trading without persistence.
async fn connect_store(config: &AppConfig) -> Arc<dyn PositionStore> {
    match PostgresStore::new(&config.database.url, config.database.max_connections).await {
        Ok(store) => {
            if let Err(e) = store.migrate().await {
                error!("Database migration failed: {}", e);
            }
            info!("Database connected");
            Arc::new(store)
        }
        Err(e) => {
            warn!(
                "Database connection failed: {} - continuing with in-memory store",
                e
            );
            Arc::new(MemoryStore::new())
        }
    }
}

fn build_ai_gate(config: &AppConfig) -> Arc<dyn AiGate> {
    if !config.ai.enabled {
        return Arc::new(ApproveAll);
    }

    match ChatGate::from_env(config.ai.clone()) {
        Some(gate) => {
            info!(model = %config.ai.model, "AI gate enabled");
            Arc::new(gate)
        }
        None => {
            warn!(
                "AI gate enabled but {} is unset, falling back to approve-all",
                config.ai.api_key_env
            );
            Arc::new(ApproveAll)
        }
    }
}
