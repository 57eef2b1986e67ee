use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::config::SizingConfig;
use crate::domain::Signal;

/// Converts a signal plus current bankroll into a notional stake using
/// fractional Kelly for a binary payout.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: SizingConfig,
}

impl PositionSizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    /// Notional stake in USD, clamped to `[min_position_usd,
    /// max_position_usd]`, or zero when the Kelly edge estimate is
    /// non-positive.
    ///
    /// A zero here is a deliberate secondary filter: a raw mispricing signal
    /// fired, but the formal edge estimate does not support a stake.
    pub fn size(&self, signal: &Signal, bankroll: Decimal) -> Decimal {
        let entry = signal.entry_price;
        if entry <= Decimal::ZERO || entry >= Decimal::ONE || bankroll <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        // Implied odds from price: entry 0.20 pays 4:1
        let b = (Decimal::ONE - entry) / entry;

        // Win probability from mispricing, scaled toward the AI confidence
        // scalar, clamped to [0.1, 0.9]
        let base = dec!(0.5) + signal.mispricing_pct / dec!(200);
        let p = (base * (dec!(0.7) + dec!(0.3) * signal.confidence)).clamp(dec!(0.1), dec!(0.9));
        let q = Decimal::ONE - p;

        let kelly = (b * p - q) / b;
        if kelly <= Decimal::ZERO {
            debug!(%entry, %p, %kelly, "non-positive Kelly fraction, no stake");
            return Decimal::ZERO;
        }

        let notional = bankroll * kelly * self.config.kelly_fraction;
        notional
            .min(self.config.max_position_usd)
            .max(self.config.min_position_usd)
            .round_dp(2)
    }
}
