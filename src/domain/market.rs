use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Fixed fair-value anchor for mean reversion (binary markets revert toward 50%)
pub const FAIR_VALUE: Decimal = dec!(0.50);

/// Side of the binary market (YES or NO)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Yes => "YES",
            Side::No => "NO",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Side {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "YES" => Ok(Side::Yes),
            "NO" => Ok(Side::No),
            _ => Err(format!("Unknown side: {}", s)),
        }
    }
}

/// Normalized view of one market at one instant.
///
/// Built only by the fetcher boundary, which drops venue records with missing
/// or out-of-range prices. A new snapshot supersedes the prior one for the
/// same market id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub market_id: String,
    pub question: String,
    /// Price of the YES outcome, in (0, 1)
    pub yes_price: Decimal,
    /// Price of the NO outcome, in (0, 1); yes + no ~= 1
    pub no_price: Decimal,
    /// Lifetime traded volume in USD
    pub volume_usd: Decimal,
    /// Volume over the trailing 24h window in USD
    pub volume_24h_usd: Decimal,
    /// Scheduled resolution time, when the venue reports one
    pub end_date: Option<DateTime<Utc>>,
    pub closed: bool,
    pub resolved: bool,
    pub fetched_at: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Price of the given outcome
    pub fn price(&self, side: Side) -> Decimal {
        match side {
            Side::Yes => self.yes_price,
            Side::No => self.no_price,
        }
    }

    /// Both prices strictly inside (0, 1)
    pub fn has_valid_prices(&self) -> bool {
        let open = |p: Decimal| p > Decimal::ZERO && p < Decimal::ONE;
        open(self.yes_price) && open(self.no_price)
    }

    /// Deviation of yes+no from 1, as a percentage.
    ///
    /// The two quoted outcome prices of a binary market sum to ~1; the gap is
    /// the only spread measure a two-price snapshot supports.
    pub fn spread_pct(&self) -> Decimal {
        ((Decimal::ONE - (self.yes_price + self.no_price)).abs()) * dec!(100)
    }
}

/// Discrete signal strength tier, derived from mispricing magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrength {
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl SignalStrength {
    /// Tier from mispricing magnitude in absolute percentage points
    pub fn from_mispricing_pct(pct: Decimal) -> Self {
        let pct = pct.abs();
        if pct >= dec!(15) {
            SignalStrength::VeryStrong
        } else if pct >= dec!(10) {
            SignalStrength::Strong
        } else if pct >= dec!(5) {
            SignalStrength::Moderate
        } else {
            SignalStrength::Weak
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStrength::Weak => "weak",
            SignalStrength::Moderate => "moderate",
            SignalStrength::Strong => "strong",
            SignalStrength::VeryStrong => "very_strong",
        }
    }
}

impl std::fmt::Display for SignalStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Entry signal for one market, valid for the cycle that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// The underpriced outcome to buy
    pub side: Side,
    /// Price at which the side would be bought
    pub entry_price: Decimal,
    /// Fair-value anchor the price is expected to revert toward
    pub anchor: Decimal,
    /// Percentage distance between entry price and anchor, normalized by entry
    pub mispricing_pct: Decimal,
    pub strength: SignalStrength,
    /// External confidence scalar in [0, 1]; neutral 0.5 unless the AI gate
    /// supplies one
    pub confidence: Decimal,
}

impl Signal {
    pub fn new(side: Side, entry_price: Decimal) -> Self {
        let mispricing_pct = (FAIR_VALUE - entry_price) / entry_price * dec!(100);
        Self {
            side,
            entry_price,
            anchor: FAIR_VALUE,
            mispricing_pct,
            strength: SignalStrength::from_mispricing_pct(mispricing_pct),
            confidence: dec!(0.5),
        }
    }

    pub fn with_confidence(mut self, confidence: Decimal) -> Self {
        self.confidence = confidence.clamp(Decimal::ZERO, Decimal::ONE);
        self
    }
}
