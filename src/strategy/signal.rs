use rust_decimal::Decimal;
use tracing::debug;

use crate::config::SignalConfig;
use crate::domain::{MarketSnapshot, Side, Signal};

/// Evaluates one market snapshot for a mean-reversion entry.
///
/// Pure function of the snapshot and its configuration; the engine consults
/// the rule-out cache before calling it.
#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    config: SignalConfig,
}

impl SignalEvaluator {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    /// Evaluate a snapshot, returning an entry signal when the price sits far
    /// enough from the anchor.
    ///
    /// Longshot: YES priced at or below the longshot threshold, buy YES at
    /// that price. Favorite: YES priced at or above the favorite threshold,
    /// buy the complementary NO at `1 - p`. Either way the signal carries the
    /// mispricing toward the 0.50 anchor, normalized by entry price.
    pub fn evaluate(&self, snapshot: &MarketSnapshot) -> Option<Signal> {
        if snapshot.closed || snapshot.resolved {
            debug!(market_id = %snapshot.market_id, "skipping closed/resolved market");
            return None;
        }

        if snapshot.volume_usd < self.config.min_volume_usd {
            debug!(
                market_id = %snapshot.market_id,
                volume = %snapshot.volume_usd,
                "volume below floor"
            );
            return None;
        }

        if !snapshot.has_valid_prices() {
            debug!(market_id = %snapshot.market_id, "malformed prices");
            return None;
        }

        let yes = snapshot.yes_price;

        let candidate = if yes <= self.config.longshot_threshold {
            Some(Signal::new(Side::Yes, yes))
        } else if yes >= self.config.favorite_threshold {
            Some(Signal::new(Side::No, Decimal::ONE - yes))
        } else {
            None
        };

        candidate.filter(|signal| signal.mispricing_pct >= self.config.min_mispricing_pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn test_config() -> SignalConfig {
        SignalConfig {
            min_volume_usd: dec!(10000),
            longshot_threshold: dec!(0.30),
            favorite_threshold: dec!(0.70),
            min_mispricing_pct: dec!(5.0),
            ruleout_refresh_mins: 30,
            ruleout_invalidation_delta: dec!(0.05),
        }
    }

    fn snapshot(yes: Decimal) -> MarketSnapshot {
        MarketSnapshot {
            market_id: "m1".to_string(),
            question: "Will it happen?".to_string(),
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

    #[test]
    fn test_longshot_buys_yes() {
        let evaluator = SignalEvaluator::new(test_config());
        let signal = evaluator.evaluate(&snapshot(dec!(0.20))).unwrap();

        assert_eq!(signal.side, Side::Yes);
        assert_eq!(signal.entry_price, dec!(0.20));
        // (0.5 - 0.2) / 0.2 * 100 = 150%
        assert_eq!(signal.mispricing_pct, dec!(150));
    }

    #[test]
    fn test_favorite_buys_complementary_no() {
        let evaluator = SignalEvaluator::new(test_config());
        let signal = evaluator.evaluate(&snapshot(dec!(0.80))).unwrap();

        assert_eq!(signal.side, Side::No);
        assert_eq!(signal.entry_price, dec!(0.20));
        assert_eq!(signal.mispricing_pct, dec!(150));
    }

    #[test]
    fn test_mid_range_price_is_quiet() {
        let evaluator = SignalEvaluator::new(test_config());
        assert!(evaluator.evaluate(&snapshot(dec!(0.50))).is_none());
        assert!(evaluator.evaluate(&snapshot(dec!(0.35))).is_none());
        assert!(evaluator.evaluate(&snapshot(dec!(0.65))).is_none());
    }

    #[test]
    fn test_min_mispricing_boundary() {
        let mut config = test_config();
        // entry 0.30 gives (0.5-0.3)/0.3*100 = 66.67%; raise the bar above it
        config.min_mispricing_pct = dec!(70);
        let evaluator = SignalEvaluator::new(config);
        assert!(evaluator.evaluate(&snapshot(dec!(0.30))).is_none());

        let mut config = test_config();
        config.min_mispricing_pct = dec!(66);
        let evaluator = SignalEvaluator::new(config);
        assert!(evaluator.evaluate(&snapshot(dec!(0.30))).is_some());
    }

    #[test]
    fn test_volume_floor() {
        let evaluator = SignalEvaluator::new(test_config());
        let mut snap = snapshot(dec!(0.20));
        snap.volume_usd = dec!(500);
        assert!(evaluator.evaluate(&snap).is_none());
    }

    #[test]
    fn test_closed_and_resolved_rejected() {
        let evaluator = SignalEvaluator::new(test_config());

        let mut snap = snapshot(dec!(0.20));
        snap.closed = true;
        assert!(evaluator.evaluate(&snap).is_none());

        let mut snap = snapshot(dec!(0.20));
        snap.resolved = true;
        assert!(evaluator.evaluate(&snap).is_none());
    }

    #[test]
    fn test_malformed_prices_rejected() {
        let evaluator = SignalEvaluator::new(test_config());
        let mut snap = snapshot(dec!(0.20));
        snap.no_price = dec!(1.5);
        assert!(evaluator.evaluate(&snap).is_none());
    }
}
