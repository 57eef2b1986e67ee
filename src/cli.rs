use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use crate::adapters::{GammaClient, MarketFeed, PositionStore};
use crate::config::AppConfig;
use crate::error::Result;
use crate::strategy::SignalEvaluator;

#[derive(Parser)]
#[command(
    name = "skew",
    about = "Mean-reversion trading bot for binary prediction markets",
    version
)]
pub struct Cli {
    /// Configuration directory
    #[arg(short, long, default_value = "config")]
    pub config: String,

    /// Strategy instance identifier; isolates positions, equity, and journal
    #[arg(short, long, default_value = "default")]
    pub strategy_id: String,

    /// Simulate fills without placing real orders
    #[arg(
        long,
        action = clap::ArgAction::Set,
        default_value_t = true,
        value_name = "BOOL"
    )]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the trading loop (default)
    Run,
    /// One-shot scan: list current candidate signals without trading
    Scan,
    /// Show open positions and equity from the store
    Status,
}

/// Scan the venue once and print every candidate signal
pub async fn run_scan(config: &AppConfig) -> Result<()> {
    let client = GammaClient::new(&config.api)?;
    let evaluator = SignalEvaluator::new(config.signals.clone());

    let snapshots = client.fetch_snapshots().await?;
    println!("Scanned {} markets\n", snapshots.len());

    let mut found = 0;
    for snapshot in &snapshots {
        if let Some(signal) = evaluator.evaluate(snapshot) {
            found += 1;
            println!(
                "  {:<4} @ {:.3}  edge {:>6.1}%  [{}]  {}",
                signal.side.as_str(),
                signal.entry_price,
                signal.mispricing_pct,
                signal.strength,
                truncate(&snapshot.question, 70),
            );
        }
    }

    if found == 0 {
        println!("No candidate signals at current prices.");
    } else {
        println!("\n{} candidate(s) found.", found);
    }
    Ok(())
}

/// Print open positions and equity for one strategy instance
pub async fn show_status(
    store: &dyn PositionStore,
    strategy_id: &str,
    starting_bankroll: Decimal,
) -> Result<()> {
    let positions = store.load_open_positions(strategy_id).await?;
    let equity = store
        .load_equity(strategy_id)
        .await?
        .unwrap_or(starting_bankroll);
    let open_cost: Decimal = positions.iter().map(|p| p.size_usd).sum();

    println!("Strategy: {}", strategy_id);
    println!("Equity:   ${:.2}", equity);
    println!("Cash:     ${:.2}", equity - open_cost);
    println!("Open positions: {}", positions.len());

    for position in &positions {
        println!(
            "  {:<4} {:>8.3} -> {:<8} ${:<8.2} {}",
            position.side.as_str(),
            position.entry_price,
            position
                .current_price
                .map(|p| format!("{:.3}", p))
                .unwrap_or_else(|| "-".to_string()),
            position.size_usd,
            truncate(&position.question, 60),
        );
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    }
}
