//! End-to-end cycle tests: the engine against in-memory collaborators.

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use skew::adapters::{AiGate, AiVerdict, ApproveAll, MarketFeed, MemoryStore, PositionStore};
use skew::config::AppConfig;
use skew::domain::{ExitReason, MarketSnapshot, Position, Side, Signal};
use skew::error::{Result, SkewError};
use skew::exchange::{Executor, Fill, OpenRequest, PaperExecutor};
use skew::strategy::{CycleControl, TradeEngine};

fn test_config() -> AppConfig {
    let mut config = AppConfig::default_config(true);
    config.risk.starting_bankroll_usd = dec!(1000);
    config
}

fn snapshot(id: &str, yes: Decimal) -> MarketSnapshot {
    MarketSnapshot {
        market_id: id.to_string(),
        question: format!("Question for {}?", id),
        yes_price: yes,
        no_price: Decimal::ONE - yes,
        volume_usd: dec!(50000),
        volume_24h_usd: dec!(5000),
        end_date: None,
        closed: false,
        resolved: false,
        fetched_at: Utc::now(),
    }
}

/// Feed that replays a scripted sequence of cycles, repeating the last one
struct ScriptedFeed {
    cycles: Mutex<VecDeque<Vec<MarketSnapshot>>>,
}

impl ScriptedFeed {
    fn new(cycles: Vec<Vec<MarketSnapshot>>) -> Arc<Self> {
        Arc::new(Self {
            cycles: Mutex::new(cycles.into()),
        })
    }
}

#[async_trait]
impl MarketFeed for ScriptedFeed {
    async fn fetch_snapshots(&self) -> Result<Vec<MarketSnapshot>> {
        let mut cycles = self.cycles.lock().await;
        if cycles.len() > 1 {
            Ok(cycles.pop_front().unwrap())
        } else {
            Ok(cycles.front().cloned().unwrap_or_default())
        }
    }
}

/// Executor whose close calls fail a set number of times before succeeding
struct FlakyCloseExecutor {
    inner: PaperExecutor,
    failures_left: Mutex<u32>,
}

impl FlakyCloseExecutor {
    fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            inner: PaperExecutor::new(true),
            failures_left: Mutex::new(failures),
        })
    }
}

#[async_trait]
impl Executor for FlakyCloseExecutor {
    fn is_dry_run(&self) -> bool {
        true
    }

    async fn open(&self, request: &OpenRequest) -> Result<Fill> {
        self.inner.open(request).await
    }

    async fn close(&self, position: &Position, target_price: Decimal) -> Result<Fill> {
        {
            let mut left = self.failures_left.lock().await;
            if *left > 0 {
                *left -= 1;
                return Err(SkewError::OrderSubmission("simulated outage".to_string()));
            }
        }
        self.inner.close(position, target_price).await
    }
}

struct RejectGate;

#[async_trait]
impl AiGate for RejectGate {
    async fn review(&self, _snapshot: &MarketSnapshot, _signal: &Signal) -> Result<AiVerdict> {
        Ok(AiVerdict {
            approve: false,
            confidence: dec!(0.1),
            reason: "correctly priced longshot".to_string(),
        })
    }
}

struct ErrorGate;

#[async_trait]
impl AiGate for ErrorGate {
    async fn review(&self, _snapshot: &MarketSnapshot, _signal: &Signal) -> Result<AiVerdict> {
        Err(SkewError::AiGate("reviewer unavailable".to_string()))
    }
}

async fn build_engine(
    config: AppConfig,
    feed: Arc<dyn MarketFeed>,
    ai_gate: Arc<dyn AiGate>,
    executor: Arc<dyn Executor>,
    store: Arc<MemoryStore>,
) -> TradeEngine {
    let store: Arc<dyn PositionStore> = store;
    TradeEngine::new(config, "alpha", feed, ai_gate, executor, store)
        .await
        .expect("engine should build")
}

#[tokio::test]
async fn test_longshot_entry_then_reversion_exit() {
    let mut config = test_config();
    // Park take-profit out of the way so reversion-complete is the rule that
    // fires when the price recovers to 0.42
    config.lifecycle.take_profit_pct = dec!(400);

    let feed = ScriptedFeed::new(vec![
        vec![snapshot("m1", dec!(0.10))],
        vec![snapshot("m1", dec!(0.42))],
    ]);
    let store = Arc::new(MemoryStore::new());
    let mut engine = build_engine(
        config,
        feed,
        Arc::new(ApproveAll),
        Arc::new(PaperExecutor::new(true)),
        store.clone(),
    )
    .await;

    // Cycle 1: signal fires (mispricing 400%), Kelly sizes it, risk allows
    assert_eq!(engine.run_cycle().await, CycleControl::Continue);
    assert_eq!(engine.open_position_count(), 1);

    let status = engine.status();
    let position = &status.open_positions[0];
    assert_eq!(position.side, Side::Yes);
    assert_eq!(position.entry_price, dec!(0.10));
    let notional = position.size_usd;
    assert!(notional >= dec!(10) && notional <= dec!(500));
    assert_eq!(status.bankroll, dec!(1000) - notional);
    assert_eq!(status.last_cycle.opened, 1);

    // Cycle 2: price reverted past 0.40, the position closes in profit
    assert_eq!(engine.run_cycle().await, CycleControl::Continue);
    assert_eq!(engine.open_position_count(), 0);

    let status = engine.status();
    assert_eq!(status.last_cycle.closed, 1);
    assert!(status.equity > dec!(1000));
    assert_eq!(status.bankroll, status.equity);

    let trades = store.trades().await;
    assert_eq!(trades.len(), 2);
    assert_eq!(
        trades[1].reason.as_deref(),
        Some(ExitReason::ReversionComplete.as_str())
    );
    assert!(trades[1].pnl.unwrap() > Decimal::ZERO);
}

#[tokio::test]
async fn test_crash_recovery_restores_open_positions() {
    let store = Arc::new(MemoryStore::new());
    let p1 = Position::open("alpha", "m1", "q1", Side::Yes, dec!(0.20), dec!(100));
    let p2 = Position::open("alpha", "m2", "q2", Side::No, dec!(0.25), dec!(50));
    store.seed_positions(vec![p1.clone(), p2.clone()]).await;
    store.save_equity("alpha", dec!(1100)).await.unwrap();

    let feed = ScriptedFeed::new(vec![vec![]]);
    let engine = build_engine(
        test_config(),
        feed,
        Arc::new(ApproveAll),
        Arc::new(PaperExecutor::new(true)),
        store,
    )
    .await;

    // Exactly the persisted positions, entry data unchanged, before any cycle
    let status = engine.status();
    assert_eq!(status.open_positions.len(), 2);
    let restored = status
        .open_positions
        .iter()
        .find(|p| p.market_id == "m1")
        .unwrap();
    assert_eq!(restored.entry_price, p1.entry_price);
    assert_eq!(restored.size_usd, p1.size_usd);
    assert_eq!(restored.side, p1.side);

    // Equity restored; cash = equity minus open cost
    assert_eq!(status.equity, dec!(1100));
    assert_eq!(status.bankroll, dec!(1100) - dec!(150));
}

#[tokio::test]
async fn test_failed_close_is_retried_and_idempotent() {
    let mut config = test_config();
    config.lifecycle.take_profit_pct = dec!(400);

    let feed = ScriptedFeed::new(vec![
        vec![snapshot("m1", dec!(0.10))],
        vec![snapshot("m1", dec!(0.42))],
    ]);
    let store = Arc::new(MemoryStore::new());
    let executor = FlakyCloseExecutor::new(1);
    let mut engine = build_engine(
        config,
        feed,
        Arc::new(ApproveAll),
        executor,
        store.clone(),
    )
    .await;

    engine.run_cycle().await;
    assert_eq!(engine.open_position_count(), 1);
    let entry_before = engine.status().open_positions[0].clone();

    // Exit fires but the close call fails: position must stay OPEN with
    // identical entry data
    engine.run_cycle().await;
    assert_eq!(engine.open_position_count(), 1);
    let after_failure = engine.status().open_positions[0].clone();
    assert_eq!(after_failure.id, entry_before.id);
    assert_eq!(after_failure.entry_price, entry_before.entry_price);
    assert_eq!(after_failure.size_usd, entry_before.size_usd);
    assert_eq!(engine.status().last_cycle.closed, 0);

    // Same price next tick: the same exit re-fires and now succeeds
    engine.run_cycle().await;
    assert_eq!(engine.open_position_count(), 0);
    let trades = store.trades().await;
    assert_eq!(
        trades.last().unwrap().reason.as_deref(),
        Some(ExitReason::ReversionComplete.as_str())
    );
}

#[tokio::test]
async fn test_ai_rejection_rules_market_out() {
    let feed = ScriptedFeed::new(vec![vec![snapshot("m1", dec!(0.10))]]);
    let store = Arc::new(MemoryStore::new());
    let mut engine = build_engine(
        test_config(),
        feed,
        Arc::new(RejectGate),
        Arc::new(PaperExecutor::new(true)),
        store.clone(),
    )
    .await;

    engine.run_cycle().await;
    assert_eq!(engine.open_position_count(), 0);
    assert_eq!(engine.status().last_cycle.ruled_out, 1);

    // Second cycle at the same price: cached, not re-evaluated
    engine.run_cycle().await;
    let status = engine.status();
    assert_eq!(status.last_cycle.signals, 0);
    assert_eq!(status.last_cycle.ruled_out, 0);
}

#[tokio::test]
async fn test_ai_error_fails_open() {
    let feed = ScriptedFeed::new(vec![vec![snapshot("m1", dec!(0.10))]]);
    let store = Arc::new(MemoryStore::new());
    let mut engine = build_engine(
        test_config(),
        feed,
        Arc::new(ErrorGate),
        Arc::new(PaperExecutor::new(true)),
        store,
    )
    .await;

    engine.run_cycle().await;
    // Reviewer down: trade proceeds unfiltered
    assert_eq!(engine.open_position_count(), 1);
}

#[tokio::test]
async fn test_ruleout_invalidated_by_price_move() {
    // 0.50 produces no signal; 0.52 is inside the 0.05 delta (still cached);
    // 0.20 is far outside it and must be re-evaluated
    let feed = ScriptedFeed::new(vec![
        vec![snapshot("m1", dec!(0.50))],
        vec![snapshot("m1", dec!(0.52))],
        vec![snapshot("m1", dec!(0.20))],
    ]);
    let store = Arc::new(MemoryStore::new());
    let mut engine = build_engine(
        test_config(),
        feed,
        Arc::new(ApproveAll),
        Arc::new(PaperExecutor::new(true)),
        store,
    )
    .await;

    engine.run_cycle().await;
    assert_eq!(engine.status().last_cycle.ruled_out, 1);

    engine.run_cycle().await;
    let status = engine.status();
    assert_eq!(status.last_cycle.signals, 0);
    assert_eq!(status.last_cycle.opened, 0);

    engine.run_cycle().await;
    let status = engine.status();
    assert_eq!(status.last_cycle.signals, 1);
    assert_eq!(status.last_cycle.opened, 1);
}

#[tokio::test]
async fn test_kill_switch_closes_everything_and_halts() {
    let feed = ScriptedFeed::new(vec![vec![
        snapshot("m1", dec!(0.10)),
        snapshot("m2", dec!(0.15)),
    ]]);
    let store = Arc::new(MemoryStore::new());
    let mut engine = build_engine(
        test_config(),
        feed,
        Arc::new(ApproveAll),
        Arc::new(PaperExecutor::new(true)),
        store.clone(),
    )
    .await;

    engine.run_cycle().await;
    assert_eq!(engine.open_position_count(), 2);

    engine.trip_kill_switch("operator stop");
    assert_eq!(engine.run_cycle().await, CycleControl::EmergencyStop);
    assert_eq!(engine.open_position_count(), 0);
    assert!(store
        .load_open_positions("alpha")
        .await
        .unwrap()
        .is_empty());
}

/// Feed producing random prices across a fixed market set
struct RandomFeed {
    rng: Mutex<StdRng>,
    market_count: usize,
}

#[async_trait]
impl MarketFeed for RandomFeed {
    async fn fetch_snapshots(&self) -> Result<Vec<MarketSnapshot>> {
        let mut rng = self.rng.lock().await;
        Ok((0..self.market_count)
            .map(|i| {
                let cents: i64 = rng.gen_range(2..99);
                snapshot(&format!("m{}", i), Decimal::new(cents, 2))
            })
            .collect())
    }
}

#[tokio::test]
async fn test_exposure_invariant_under_random_cycles() {
    let mut config = test_config();
    config.risk.starting_bankroll_usd = dec!(5000);
    config.risk.max_total_exposure_usd = dec!(1500);
    config.risk.max_positions = 6;
    // Keep the halting rails out of the way; this test is about exposure
    config.risk.max_drawdown_pct = dec!(99);

    let feed = Arc::new(RandomFeed {
        rng: Mutex::new(StdRng::seed_from_u64(7)),
        market_count: 12,
    });
    let store = Arc::new(MemoryStore::new());
    let mut engine = build_engine(
        config,
        feed,
        Arc::new(ApproveAll),
        Arc::new(PaperExecutor::new(true)),
        store,
    )
    .await;

    for cycle in 0..40 {
        engine.run_cycle().await;
        let status = engine.status();
        let exposure: Decimal = status.open_positions.iter().map(|p| p.size_usd).sum();
        assert!(
            exposure <= dec!(1500),
            "cycle {}: exposure {} exceeded cap",
            cycle,
            exposure
        );
        assert!(status.open_positions.len() <= 6);
    }
}
