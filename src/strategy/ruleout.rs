use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

/// A cached negative verdict for one market
#[derive(Debug, Clone)]
pub struct RuleOutEntry {
    pub reason: String,
    pub price_at_decision: Decimal,
    pub ruled_out_at: DateTime<Utc>,
}

/// Per-market negative cache: "not tradable now and why".
///
/// An entry is honored only while it is younger than the refresh window AND
/// the current price sits within the invalidation delta of the price at
/// decision time. Either condition failing drops the entry before the lookup
/// returns, so a stale "no" verdict is always re-evaluated once price has
/// moved materially. Skips re-computation only; it can never suppress a
/// signal that would otherwise fire.
#[derive(Debug)]
pub struct RuleOutCache {
    entries: HashMap<String, RuleOutEntry>,
    refresh_window: Duration,
    invalidation_delta: Decimal,
}

impl RuleOutCache {
    pub fn new(refresh_window: Duration, invalidation_delta: Decimal) -> Self {
        Self {
            entries: HashMap::new(),
            refresh_window,
            invalidation_delta,
        }
    }

    /// Record a negative verdict at the price it was decided on
    pub fn rule_out(
        &mut self,
        market_id: &str,
        reason: impl Into<String>,
        price_at_decision: Decimal,
    ) {
        self.rule_out_at(market_id, reason, price_at_decision, Utc::now());
    }

    pub(crate) fn rule_out_at(
        &mut self,
        market_id: &str,
        reason: impl Into<String>,
        price_at_decision: Decimal,
        now: DateTime<Utc>,
    ) {
        let reason = reason.into();
        debug!(market_id, %price_at_decision, reason, "ruled out");
        self.entries.insert(
            market_id.to_string(),
            RuleOutEntry {
                reason,
                price_at_decision,
                ruled_out_at: now,
            },
        );
    }

    /// Is this market still ruled out at the current price? Invalid entries
    /// are removed eagerly before answering.
    pub fn is_ruled_out(&mut self, market_id: &str, current_price: Decimal) -> bool {
        self.is_ruled_out_at(market_id, current_price, Utc::now())
    }

    pub(crate) fn is_ruled_out_at(
        &mut self,
        market_id: &str,
        current_price: Decimal,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(entry) = self.entries.get(market_id) else {
            return false;
        };

        if now - entry.ruled_out_at >= self.refresh_window {
            debug!(market_id, "rule-out expired");
            self.entries.remove(market_id);
            return false;
        }

        if (current_price - entry.price_at_decision).abs() > self.invalidation_delta {
            debug!(
                market_id,
                %current_price,
                price_at_decision = %entry.price_at_decision,
                "rule-out invalidated by price move"
            );
            self.entries.remove(market_id);
            return false;
        }

        true
    }

    /// Drop every entry older than the refresh window
    pub fn purge_expired(&mut self) {
        self.purge_expired_at(Utc::now());
    }

    pub(crate) fn purge_expired_at(&mut self, now: DateTime<Utc>) {
        let window = self.refresh_window;
        self.entries
            .retain(|_, entry| now - entry.ruled_out_at < window);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
