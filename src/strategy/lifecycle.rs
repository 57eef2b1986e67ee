use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LifecycleConfig;
use crate::domain::{ExitReason, Position};

/// A fired exit condition: close at `exit_price` for `reason`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitDecision {
    pub reason: ExitReason,
    pub exit_price: Decimal,
}

/// Exit rules for an open position.
///
/// Positions have exactly two states: a position is atomically open or
/// closed, and the transition is driven by idempotent checks against the
/// held side's live price. A failed close leaves the position open and the
/// same decision re-fires on the next tick.
#[derive(Debug, Clone)]
pub struct PositionLifecycle {
    config: LifecycleConfig,
}

impl PositionLifecycle {
    pub fn new(config: LifecycleConfig) -> Self {
        Self { config }
    }

    /// Evaluate exit conditions in priority order against the held side's
    /// current price. Settlement outranks everything; on a closed market
    /// whose price has not pinned to either bound, nothing fires this cycle.
    pub fn check_exit(
        &self,
        position: &Position,
        current_price: Decimal,
        market_closed: bool,
    ) -> Option<ExitDecision> {
        if market_closed {
            if current_price >= self.config.settlement_win_price {
                return Some(ExitDecision {
                    reason: ExitReason::Win,
                    exit_price: Decimal::ONE,
                });
            }
            if current_price <= self.config.settlement_loss_price {
                return Some(ExitDecision {
                    reason: ExitReason::Loss,
                    exit_price: Decimal::ZERO,
                });
            }
            debug!(
                market_id = %position.market_id,
                %current_price,
                "closed market not yet settled"
            );
            return None;
        }

        let pnl_pct = position.unrealized_pnl_pct(current_price);

        if pnl_pct >= self.config.take_profit_pct {
            return Some(ExitDecision {
                reason: ExitReason::TakeProfit,
                exit_price: current_price,
            });
        }

        if pnl_pct <= self.config.stop_loss_pct {
            return Some(ExitDecision {
                reason: ExitReason::StopLoss,
                exit_price: current_price,
            });
        }

        // Reversion-complete: the mispricing has substantially closed,
        // regardless of absolute P&L. One rule for whichever side is held;
        // only entries taken deep below the anchor are eligible.
        if position.entry_price < self.config.reversion_entry_ceiling
            && current_price >= self.config.reversion_exit_threshold
        {
            return Some(ExitDecision {
                reason: ExitReason::ReversionComplete,
                exit_price: current_price,
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use rust_decimal_macros::dec;

    fn lifecycle() -> PositionLifecycle {
        PositionLifecycle::new(LifecycleConfig {
            take_profit_pct: dec!(50),
            stop_loss_pct: dec!(-50),
            reversion_entry_ceiling: dec!(0.30),
            reversion_exit_threshold: dec!(0.40),
            settlement_win_price: dec!(0.95),
            settlement_loss_price: dec!(0.05),
        })
    }

    fn position(entry: Decimal) -> Position {
        Position::open("alpha", "m1", "q", Side::Yes, entry, dec!(100))
    }

    #[test]
    fn test_settlement_win() {
        let decision = lifecycle()
            .check_exit(&position(dec!(0.60)), dec!(0.97), true)
            .unwrap();
        assert_eq!(decision.reason, ExitReason::Win);
        assert_eq!(decision.exit_price, Decimal::ONE);
    }

    #[test]
    fn test_settlement_loss() {
        let decision = lifecycle()
            .check_exit(&position(dec!(0.60)), dec!(0.03), true)
            .unwrap();
        assert_eq!(decision.reason, ExitReason::Loss);
        assert_eq!(decision.exit_price, Decimal::ZERO);
    }

    #[test]
    fn test_closed_market_mid_price_waits() {
        // 0.60 on a closed market is not yet settled; even a big unrealized
        // gain must not fire while the venue has not pinned the price
        let pos = position(dec!(0.20));
        assert!(lifecycle().check_exit(&pos, dec!(0.60), true).is_none());
    }

    #[test]
    fn test_settlement_outranks_take_profit() {
        // +385% unrealized, but the market is closed and pinned high: WIN at
        // 1.0, not TAKE_PROFIT at 0.97
        let decision = lifecycle()
            .check_exit(&position(dec!(0.20)), dec!(0.97), true)
            .unwrap();
        assert_eq!(decision.reason, ExitReason::Win);
    }

    #[test]
    fn test_take_profit() {
        let decision = lifecycle()
            .check_exit(&position(dec!(0.40)), dec!(0.60), false)
            .unwrap();
        assert_eq!(decision.reason, ExitReason::TakeProfit);
        assert_eq!(decision.exit_price, dec!(0.60));
    }

    #[test]
    fn test_stop_loss() {
        let decision = lifecycle()
            .check_exit(&position(dec!(0.40)), dec!(0.20), false)
            .unwrap();
        assert_eq!(decision.reason, ExitReason::StopLoss);
        assert_eq!(decision.exit_price, dec!(0.20));
    }

    #[test]
    fn test_reversion_complete() {
        // Entry 0.10, price recovered to 0.42: +320% would already take
        // profit, so use an entry where reversion fires on its own merits
        let pos = position(dec!(0.28));
        let decision = lifecycle().check_exit(&pos, dec!(0.41), false).unwrap();
        assert_eq!(decision.reason, ExitReason::ReversionComplete);
        assert_eq!(decision.exit_price, dec!(0.41));
    }

    #[test]
    fn test_reversion_requires_cheap_entry() {
        // Entry 0.35 is above the eligibility ceiling; 0.41 is only +17%
        let pos = position(dec!(0.35));
        assert!(lifecycle().check_exit(&pos, dec!(0.41), false).is_none());
    }

    #[test]
    fn test_take_profit_outranks_reversion() {
        // Entry 0.20 at 0.42 satisfies both; take-profit is checked first
        let decision = lifecycle()
            .check_exit(&position(dec!(0.20)), dec!(0.42), false)
            .unwrap();
        assert_eq!(decision.reason, ExitReason::TakeProfit);
    }

    #[test]
    fn test_hold_zone() {
        let pos = position(dec!(0.40));
        assert!(lifecycle().check_exit(&pos, dec!(0.45), false).is_none());
        assert!(lifecycle().check_exit(&pos, dec!(0.30), false).is_none());
    }

    #[test]
    fn test_idempotent_decisions() {
        // Same inputs, same decision, any number of times (a failed close
        // retries the identical exit next tick)
        let pos = position(dec!(0.28));
        let first = lifecycle().check_exit(&pos, dec!(0.41), false);
        let second = lifecycle().check_exit(&pos, dec!(0.41), false);
        assert_eq!(first, second);
        assert!(first.is_some());
    }
}
