use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::adapters::{AiGate, MarketFeed, PositionStore, TradeRecord};
use crate::config::AppConfig;
use crate::domain::{ExitReason, MarketSnapshot, Position, RiskState};
use crate::error::Result;
use crate::exchange::{Executor, Fill, OpenRequest};
use crate::strategy::lifecycle::PositionLifecycle;
use crate::strategy::ruleout::RuleOutCache;
use crate::strategy::risk::RiskManager;
use crate::strategy::signal::SignalEvaluator;
use crate::strategy::sizing::PositionSizer;

/// Whether the scheduling loop may continue after a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleControl {
    Continue,
    EmergencyStop,
}

/// Counters from the most recent scan cycle, exposed for reporting
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleSummary {
    pub scanned: usize,
    pub signals: usize,
    pub opened: usize,
    pub closed: usize,
    pub ruled_out: usize,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Read-only engine state for operators and dashboards
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub strategy_id: String,
    pub bankroll: Decimal,
    pub equity: Decimal,
    pub open_positions: Vec<Position>,
    pub last_cycle: CycleSummary,
}

/// The scheduler: wires evaluator, rule-out cache, sizer, risk gate, and
/// lifecycle together and talks to the external collaborators.
///
/// One engine per strategy instance. All state mutation happens on this
/// single cooperative loop: exits are processed to completion before entries
/// are evaluated, so a market can never be exited and re-entered within one
/// cycle, and no locks are needed around the rule-out cache or risk state.
pub struct TradeEngine {
    config: AppConfig,
    strategy_id: String,
    feed: Arc<dyn MarketFeed>,
    ai_gate: Arc<dyn AiGate>,
    executor: Arc<dyn Executor>,
    store: Arc<dyn PositionStore>,
    evaluator: SignalEvaluator,
    sizer: PositionSizer,
    risk: RiskManager,
    lifecycle: PositionLifecycle,
    ruleouts: RuleOutCache,
    /// Open positions keyed by market id (at most one per market)
    positions: HashMap<String, Position>,
    /// Uncommitted cash; equity = bankroll + open notional at cost
    bankroll: Decimal,
    last_cycle: CycleSummary,
}

impl TradeEngine {
    /// Build an engine, reconstructing persisted open positions and equity
    /// before the first cycle runs.
    pub async fn new(
        config: AppConfig,
        strategy_id: impl Into<String>,
        feed: Arc<dyn MarketFeed>,
        ai_gate: Arc<dyn AiGate>,
        executor: Arc<dyn Executor>,
        store: Arc<dyn PositionStore>,
    ) -> Result<Self> {
        let strategy_id = strategy_id.into();

        let recovered = store.load_open_positions(&strategy_id).await?;
        let open_cost: Decimal = recovered.iter().map(|p| p.size_usd).sum();
        let mut positions = HashMap::with_capacity(recovered.len());
        for position in recovered {
            positions.insert(position.market_id.clone(), position);
        }

        let state = match store.load_equity(&strategy_id).await? {
            Some(equity) => RiskState::restored(config.risk.starting_bankroll_usd, equity),
            None => RiskState::new(config.risk.starting_bankroll_usd),
        };
        let bankroll = state.current_equity - open_cost;

        info!(
            %strategy_id,
            recovered = positions.len(),
            equity = %state.current_equity,
            %bankroll,
            "engine state restored"
        );

        let risk = RiskManager::with_state(config.risk.clone(), state);
        let evaluator = SignalEvaluator::new(config.signals.clone());
        let sizer = PositionSizer::new(config.sizing.clone());
        let lifecycle = PositionLifecycle::new(config.lifecycle.clone());
        let ruleouts = RuleOutCache::new(
            ChronoDuration::minutes(config.signals.ruleout_refresh_mins),
            config.signals.ruleout_invalidation_delta,
        );

        Ok(Self {
            config,
            strategy_id,
            feed,
            ai_gate,
            executor,
            store,
            evaluator,
            sizer,
            risk,
            lifecycle,
            ruleouts,
            positions,
            bankroll,
            last_cycle: CycleSummary::default(),
        })
    }

    pub fn bankroll(&self) -> Decimal {
        self.bankroll
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn open_positions(&self) -> Vec<&Position> {
        self.positions.values().collect()
    }

    pub fn status(&self) -> EngineStatus {
        let mut open_positions: Vec<Position> = self.positions.values().cloned().collect();
        open_positions.sort_by_key(|p| p.opened_at);
        EngineStatus {
            strategy_id: self.strategy_id.clone(),
            bankroll: self.bankroll,
            equity: self.risk.state().current_equity,
            open_positions,
            last_cycle: self.last_cycle.clone(),
        }
    }

    /// Manual kill switch, honored at the start of the next cycle
    pub fn trip_kill_switch(&mut self, reason: impl Into<String>) {
        self.risk.trip_kill_switch(reason);
    }

    /// Drive cycles on the configured interval until shutdown or emergency
    /// stop. On either, a close is attempted for every open position with a
    /// bounded timeout; unresolved positions stay OPEN for the next run.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            strategy_id = %self.strategy_id,
            interval_secs = self.config.execution.check_interval_secs,
            dry_run = self.executor.is_dry_run(),
            "engine starting"
        );

        let mut ticker = interval(Duration::from_secs(
            self.config.execution.check_interval_secs,
        ));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.run_cycle().await == CycleControl::EmergencyStop {
                        error!(
                            reason = self.risk.halt_reason().unwrap_or("unknown"),
                            "engine halted by emergency stop"
                        );
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("stop signal received, closing open positions");
                        self.close_all().await;
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// One scan cycle: emergency check, fetch, exits, then entries.
    pub async fn run_cycle(&mut self) -> CycleControl {
        if self.risk.should_emergency_stop() {
            error!(
                reason = self.risk.halt_reason().unwrap_or("drawdown limit"),
                "emergency stop tripped, closing all positions"
            );
            self.close_all().await;
            return CycleControl::EmergencyStop;
        }

        let snapshots = match self.feed.fetch_snapshots().await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                error!(collaborator = "fetcher", error = %e, "fetch failed, skipping cycle");
                return CycleControl::Continue;
            }
        };

        let mut summary = CycleSummary {
            scanned: snapshots.len(),
            ..Default::default()
        };

        self.ruleouts.purge_expired();
        self.process_exits(&snapshots, &mut summary).await;
        self.process_entries(&snapshots, &mut summary).await;

        summary.completed_at = Some(Utc::now());
        info!(
            scanned = summary.scanned,
            signals = summary.signals,
            opened = summary.opened,
            closed = summary.closed,
            ruled_out = summary.ruled_out,
            positions = self.positions.len(),
            bankroll = %self.bankroll,
            equity = %self.risk.state().current_equity,
            "cycle done"
        );
        self.last_cycle = summary;

        CycleControl::Continue
    }

    /// Evaluate exit conditions for every open position against the fresh
    /// snapshot set. Lookup is by market id first, question text as fallback
    /// (upstream ids occasionally churn).
    async fn process_exits(&mut self, snapshots: &[MarketSnapshot], summary: &mut CycleSummary) {
        let by_id: HashMap<&str, &MarketSnapshot> = snapshots
            .iter()
            .map(|s| (s.market_id.as_str(), s))
            .collect();
        let by_question: HashMap<&str, &MarketSnapshot> = snapshots
            .iter()
            .map(|s| (s.question.as_str(), s))
            .collect();

        let market_ids: Vec<String> = self.positions.keys().cloned().collect();
        for market_id in market_ids {
            let decision = {
                let Some(position) = self.positions.get_mut(&market_id) else {
                    continue;
                };

                let snapshot = by_id
                    .get(market_id.as_str())
                    .or_else(|| by_question.get(position.question.as_str()))
                    .copied();
                let Some(snapshot) = snapshot else {
                    debug!(%market_id, "open position has no snapshot this cycle");
                    continue;
                };

                let current = snapshot.price(position.side);
                position.update_price(current);

                self.lifecycle
                    .check_exit(position, current, snapshot.closed || snapshot.resolved)
            };

            if let Some(decision) = decision {
                let filled = {
                    let position = &self.positions[&market_id];
                    info!(
                        %market_id,
                        reason = %decision.reason,
                        exit_price = %decision.exit_price,
                        "exit fired"
                    );
                    match self.executor.close(position, decision.exit_price).await {
                        Ok(fill) => Some(fill),
                        Err(e) => {
                            warn!(
                                collaborator = "executor",
                                %market_id,
                                error = %e,
                                "close failed, position stays open for retry"
                            );
                            None
                        }
                    }
                };

                if let Some(fill) = filled {
                    self.apply_close(&market_id, fill, decision.reason).await;
                    summary.closed += 1;
                }
            }
        }
    }

    /// Evaluate entry candidates for every snapshot without an open position.
    async fn process_entries(&mut self, snapshots: &[MarketSnapshot], summary: &mut CycleSummary) {
        for snapshot in snapshots {
            if self.positions.len() >= self.config.risk.max_positions {
                debug!("max positions reached, skipping remaining candidates");
                break;
            }
            if self.positions.contains_key(&snapshot.market_id) {
                continue;
            }

            let market_id = snapshot.market_id.as_str();
            let decision_price = snapshot.yes_price;
            if self.ruleouts.is_ruled_out(market_id, decision_price) {
                continue;
            }

            let Some(signal) = self.evaluator.evaluate(snapshot) else {
                self.ruleouts.rule_out(market_id, "no signal", decision_price);
                summary.ruled_out += 1;
                continue;
            };
            summary.signals += 1;

            // Fail-open gate: an error proceeds unfiltered at neutral confidence
            let signal = match self.ai_gate.review(snapshot, &signal).await {
                Ok(verdict) if !verdict.approve => {
                    self.ruleouts.rule_out(
                        market_id,
                        format!("ai rejected: {}", verdict.reason),
                        decision_price,
                    );
                    summary.ruled_out += 1;
                    continue;
                }
                Ok(verdict) => signal.with_confidence(verdict.confidence),
                Err(e) => {
                    warn!(
                        collaborator = "ai_gate",
                        market_id,
                        error = %e,
                        "review failed, proceeding unfiltered"
                    );
                    signal
                }
            };

            let notional = self.sizer.size(&signal, self.bankroll);
            if notional <= Decimal::ZERO {
                self.ruleouts
                    .rule_out(market_id, "non-positive Kelly stake", decision_price);
                summary.ruled_out += 1;
                continue;
            }
            if notional > self.bankroll {
                self.ruleouts
                    .rule_out(market_id, "insufficient bankroll", decision_price);
                summary.ruled_out += 1;
                continue;
            }

            let open: Vec<Position> = self.positions.values().cloned().collect();
            if let Err(reason) = self.risk.check_entry(notional, &open, snapshot.spread_pct()) {
                debug!(market_id, %reason, "risk rejected entry");
                self.ruleouts
                    .rule_out(market_id, reason.to_string(), decision_price);
                summary.ruled_out += 1;
                continue;
            }

            let request = OpenRequest {
                market_id: snapshot.market_id.clone(),
                question: snapshot.question.clone(),
                side: signal.side,
                price: signal.entry_price,
                size_usd: notional,
            };

            match self.executor.open(&request).await {
                Ok(fill) => {
                    let position = Position::open(
                        self.strategy_id.as_str(),
                        snapshot.market_id.as_str(),
                        snapshot.question.as_str(),
                        signal.side,
                        fill.price,
                        fill.size_usd,
                    );
                    self.bankroll -= fill.size_usd;

                    if let Err(e) = self.store.save_position(&position).await {
                        error!(market_id, error = %e, "failed to persist position");
                    }
                    if let Err(e) = self.store.append_trade(&TradeRecord::opened(&position)).await
                    {
                        error!(market_id, error = %e, "failed to journal trade");
                    }

                    info!(
                        market_id,
                        side = %signal.side,
                        entry = %fill.price,
                        size_usd = %fill.size_usd,
                        mispricing_pct = %signal.mispricing_pct,
                        strength = %signal.strength,
                        bankroll = %self.bankroll,
                        "position opened"
                    );
                    self.positions.insert(snapshot.market_id.clone(), position);
                    summary.opened += 1;
                }
                Err(e) => {
                    // Transient: no rule-out, the market is re-evaluated next cycle
                    warn!(
                        collaborator = "executor",
                        market_id,
                        error = %e,
                        "open failed"
                    );
                }
            }
        }
    }

    /// Commit a filled close: mutate the position, settle cash and equity,
    /// and persist. Only called after executor success, so a failure earlier
    /// leaves every piece of state untouched.
    async fn apply_close(&mut self, market_id: &str, fill: Fill, reason: ExitReason) {
        let Some(mut position) = self.positions.remove(market_id) else {
            return;
        };

        position.close(fill.price, reason, Utc::now());
        let pnl = position.pnl.unwrap_or_default();

        self.bankroll += fill.size_usd;
        self.risk.record_close(pnl);

        if let Err(e) = self.store.save_position(&position).await {
            error!(market_id, error = %e, "failed to persist closed position");
        }
        if let Err(e) = self
            .store
            .append_trade(&TradeRecord::closed(&position, fill.price, reason))
            .await
        {
            error!(market_id, error = %e, "failed to journal trade");
        }
        if let Err(e) = self
            .store
            .save_equity(&self.strategy_id, self.risk.state().current_equity)
            .await
        {
            error!(market_id, error = %e, "failed to persist equity");
        }

        info!(
            market_id,
            reason = %reason,
            exit_price = %fill.price,
            %pnl,
            bankroll = %self.bankroll,
            "position closed"
        );
    }

    /// Best-effort close of every open position, each bounded by the
    /// configured timeout. Failures and timeouts leave the position OPEN for
    /// the next run to retry.
    pub async fn close_all(&mut self) {
        let deadline = Duration::from_secs(self.config.execution.close_timeout_secs);
        let market_ids: Vec<String> = self.positions.keys().cloned().collect();

        for market_id in market_ids {
            let outcome = {
                let Some(position) = self.positions.get(&market_id) else {
                    continue;
                };
                let target = position.current_price.unwrap_or(position.entry_price);
                timeout(deadline, self.executor.close(position, target)).await
            };

            match outcome {
                Ok(Ok(fill)) => {
                    self.apply_close(&market_id, fill, ExitReason::EmergencyStop)
                        .await;
                }
                Ok(Err(e)) => {
                    warn!(
                        collaborator = "executor",
                        %market_id,
                        error = %e,
                        "close failed, position remains open"
                    );
                }
                Err(_) => {
                    warn!(
                        collaborator = "executor",
                        %market_id, "close timed out, position remains open"
                    );
                }
            }
        }
    }
}
