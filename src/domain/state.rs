use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Process-lifetime equity tracking for one strategy instance.
///
/// Owned by that instance's RiskManager and mutated only from the single
/// orchestrator loop; each instance gets its own value, so there is no
/// cross-instance coupling. The daily component resets when the UTC date
/// advances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    pub starting_bankroll: Decimal,
    pub current_equity: Decimal,
    pub peak_equity: Decimal,
    pub daily_date: Option<NaiveDate>,
    pub daily_pnl: Decimal,
}

impl RiskState {
    pub fn new(starting_bankroll: Decimal) -> Self {
        Self {
            starting_bankroll,
            current_equity: starting_bankroll,
            peak_equity: starting_bankroll,
            daily_date: None,
            daily_pnl: Decimal::ZERO,
        }
    }

    /// Restore from a persisted equity figure (crash recovery)
    pub fn restored(starting_bankroll: Decimal, persisted_equity: Decimal) -> Self {
        Self {
            starting_bankroll,
            current_equity: persisted_equity,
            peak_equity: persisted_equity.max(starting_bankroll),
            daily_date: None,
            daily_pnl: Decimal::ZERO,
        }
    }

    /// Apply a realized P&L figure for `date`, rolling the daily accumulator
    /// when the date has advanced
    pub fn apply_realized(&mut self, pnl: Decimal, date: NaiveDate) {
        if self.daily_date != Some(date) {
            self.daily_date = Some(date);
            self.daily_pnl = Decimal::ZERO;
        }
        self.daily_pnl += pnl;
        self.current_equity += pnl;
        if self.current_equity > self.peak_equity {
            self.peak_equity = self.current_equity;
        }
    }

    /// Current drawdown from peak, as a percentage of peak. Zero when no peak
    /// has been established.
    pub fn drawdown_pct(&self) -> Decimal {
        if self.peak_equity <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        ((self.peak_equity - self.current_equity) / self.peak_equity * dec!(100))
            .max(Decimal::ZERO)
    }
}
