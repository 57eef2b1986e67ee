use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::config::RiskConfig;
use crate::domain::{Position, RiskState};
use crate::error::RiskError;

/// Stateful gatekeeper enforcing per-position, aggregate, spread, drawdown,
/// and kill-switch limits.
///
/// Owns its `RiskState` by value: every strategy instance constructs its own
/// manager, and all mutation happens from that instance's single orchestrator
/// loop, so no synchronization is needed.
#[derive(Debug)]
pub struct RiskManager {
    config: RiskConfig,
    state: RiskState,
    kill_switch: bool,
    halt_reason: Option<String>,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        let state = RiskState::new(config.starting_bankroll_usd);
        Self::with_state(config, state)
    }

    /// Construct with a restored `RiskState` (crash recovery)
    pub fn with_state(config: RiskConfig, state: RiskState) -> Self {
        Self {
            config,
            state,
            kill_switch: false,
            halt_reason: None,
        }
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    pub fn halt_reason(&self) -> Option<&str> {
        self.halt_reason.as_deref()
    }

    /// Gate a proposed entry. Checks run in a fixed order and the first
    /// failure wins, so a given input always reports the same reason.
    pub fn check_entry(
        &mut self,
        proposed_notional: Decimal,
        open_positions: &[Position],
        spread_pct: Decimal,
    ) -> Result<(), RiskError> {
        if let Some(reason) = &self.halt_reason {
            return Err(RiskError::TradingHalted {
                reason: reason.clone(),
            });
        }

        if proposed_notional > self.config.max_position_usd {
            return Err(RiskError::PositionTooLarge {
                requested: proposed_notional,
                limit: self.config.max_position_usd,
            });
        }

        if proposed_notional < self.config.min_position_usd {
            return Err(RiskError::PositionTooSmall {
                requested: proposed_notional,
                minimum: self.config.min_position_usd,
            });
        }

        let exposure: Decimal = open_positions.iter().map(|p| p.size_usd).sum();
        if exposure + proposed_notional > self.config.max_total_exposure_usd {
            return Err(RiskError::MaxExposureExceeded {
                current: exposure,
                requested: proposed_notional,
                limit: self.config.max_total_exposure_usd,
            });
        }

        if open_positions.len() >= self.config.max_positions {
            return Err(RiskError::MaxPositionsReached {
                count: open_positions.len(),
                limit: self.config.max_positions,
            });
        }

        if spread_pct > self.config.max_spread_pct {
            return Err(RiskError::SpreadTooWide {
                spread_pct,
                max_pct: self.config.max_spread_pct,
            });
        }

        let drawdown = self.state.drawdown_pct();
        if drawdown > self.config.max_drawdown_pct {
            self.halt(format!(
                "drawdown {:.2}% exceeds limit {:.2}%",
                drawdown, self.config.max_drawdown_pct
            ));
            return Err(RiskError::DrawdownBreached {
                drawdown_pct: drawdown,
                max_pct: self.config.max_drawdown_pct,
            });
        }

        Ok(())
    }

    /// Standing predicate, checked once per cycle before any new entries.
    /// True halts the scheduling loop after closing every open position.
    pub fn should_emergency_stop(&self) -> bool {
        if self.kill_switch {
            return true;
        }
        if self.halt_reason.is_some() {
            return true;
        }
        self.state.drawdown_pct() > self.config.max_drawdown_pct
    }

    /// Manual kill switch; short-circuits the emergency predicate
    /// unconditionally.
    pub fn trip_kill_switch(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        error!(reason, "kill switch tripped");
        self.kill_switch = true;
        self.halt_reason = Some(reason);
    }

    /// Record realized P&L from a closed position
    pub fn record_close(&mut self, pnl: Decimal) {
        self.record_close_at(pnl, Utc::now().date_naive());
    }

    pub(crate) fn record_close_at(&mut self, pnl: Decimal, date: NaiveDate) {
        self.state.apply_realized(pnl, date);
        info!(
            %pnl,
            daily_pnl = %self.state.daily_pnl,
            equity = %self.state.current_equity,
            "realized close"
        );

        if self.state.daily_pnl <= -self.config.daily_loss_limit_usd {
            if self.config.daily_loss_halts {
                self.halt(format!(
                    "daily loss {} breached limit {}",
                    self.state.daily_pnl, self.config.daily_loss_limit_usd
                ));
            } else {
                warn!(
                    daily_pnl = %self.state.daily_pnl,
                    limit = %self.config.daily_loss_limit_usd,
                    "daily loss floor breached"
                );
            }
        }
    }

    fn halt(&mut self, reason: String) {
        if self.halt_reason.is_none() {
            error!(reason, "trading halted");
            self.halt_reason = Some(reason);
        }
    }
}
