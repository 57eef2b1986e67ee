use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::market::Side;

/// Position status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Open => "OPEN",
            PositionStatus::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PositionStatus {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "OPEN" => Ok(PositionStatus::Open),
            "CLOSED" => Ok(PositionStatus::Closed),
            _ => Err(format!("Unknown position status: {}", s)),
        }
    }
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Market settled with the held side winning
    Win,
    /// Market settled against the held side
    Loss,
    TakeProfit,
    StopLoss,
    /// Price climbed back toward the anchor far enough that the mispricing
    /// thesis is considered realized
    ReversionComplete,
    /// Closed by the emergency stop or operator shutdown
    EmergencyStop,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Win => "WIN",
            ExitReason::Loss => "LOSS",
            ExitReason::TakeProfit => "TAKE_PROFIT",
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::ReversionComplete => "REVERSION_COMPLETE",
            ExitReason::EmergencyStop => "EMERGENCY_STOP",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ExitReason {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "WIN" => Ok(ExitReason::Win),
            "LOSS" => Ok(ExitReason::Loss),
            "TAKE_PROFIT" => Ok(ExitReason::TakeProfit),
            "STOP_LOSS" => Ok(ExitReason::StopLoss),
            "REVERSION_COMPLETE" => Ok(ExitReason::ReversionComplete),
            "EMERGENCY_STOP" => Ok(ExitReason::EmergencyStop),
            _ => Err(format!("Unknown exit reason: {}", s)),
        }
    }
}

/// A durable holding in one market.
///
/// Invariants: `shares * entry_price == size_usd` at creation; at most one
/// OPEN position per market id per strategy instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub strategy_id: String,
    pub market_id: String,
    pub question: String,
    pub side: Side,
    pub entry_price: Decimal,
    /// Notional at entry, USD
    pub size_usd: Decimal,
    /// size_usd / entry_price
    pub shares: Decimal,
    pub opened_at: DateTime<Utc>,
    pub status: PositionStatus,
    /// Last observed price of the held side, refreshed each cycle
    pub current_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub exit_reason: Option<ExitReason>,
    pub pnl: Option<Decimal>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn open(
        strategy_id: impl Into<String>,
        market_id: impl Into<String>,
        question: impl Into<String>,
        side: Side,
        entry_price: Decimal,
        size_usd: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy_id: strategy_id.into(),
            market_id: market_id.into(),
            question: question.into(),
            side,
            entry_price,
            size_usd,
            shares: size_usd / entry_price,
            opened_at: Utc::now(),
            status: PositionStatus::Open,
            current_price: None,
            exit_price: None,
            exit_reason: None,
            pnl: None,
            closed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Refresh the last observed price of the held side
    pub fn update_price(&mut self, price: Decimal) {
        self.current_price = Some(price);
    }

    /// Unrealized P&L as a percentage of entry price
    pub fn unrealized_pnl_pct(&self, current_price: Decimal) -> Decimal {
        (current_price - self.entry_price) / self.entry_price * dec!(100)
    }

    /// Realized P&L for a hypothetical exit at `exit_price`
    pub fn pnl_at(&self, exit_price: Decimal) -> Decimal {
        self.shares * exit_price - self.size_usd
    }

    /// Mark the position closed. Proceeds (`shares * exit_price`) are credited
    /// back to the bankroll by the caller.
    pub fn close(&mut self, exit_price: Decimal, reason: ExitReason, now: DateTime<Utc>) {
        self.status = PositionStatus::Closed;
        self.exit_price = Some(exit_price);
        self.exit_reason = Some(reason);
        self.pnl = Some(self.pnl_at(exit_price));
        self.closed_at = Some(now);
    }
}
