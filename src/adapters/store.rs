use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{ExitReason, Position, Side};
use crate::error::Result;

/// Immutable journal entry for one executed order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub strategy_id: String,
    pub market_id: String,
    pub question: String,
    pub action: TradeAction,
    pub side: Side,
    pub price: Decimal,
    pub size_usd: Decimal,
    pub shares: Decimal,
    pub pnl: Option<Decimal>,
    pub reason: Option<String>,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    Open,
    Close,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Open => "OPEN",
            TradeAction::Close => "CLOSE",
        }
    }
}

impl TradeRecord {
    pub fn opened(position: &Position) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy_id: position.strategy_id.clone(),
            market_id: position.market_id.clone(),
            question: position.question.clone(),
            action: TradeAction::Open,
            side: position.side,
            price: position.entry_price,
            size_usd: position.size_usd,
            shares: position.shares,
            pnl: None,
            reason: None,
            executed_at: position.opened_at,
        }
    }

    pub fn closed(position: &Position, exit_price: Decimal, reason: ExitReason) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy_id: position.strategy_id.clone(),
            market_id: position.market_id.clone(),
            question: position.question.clone(),
            action: TradeAction::Close,
            side: position.side,
            price: exit_price,
            size_usd: position.shares * exit_price,
            shares: position.shares,
            pnl: position.pnl,
            reason: Some(reason.as_str().to_string()),
            executed_at: position.closed_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Persistent store for positions, trade records, and equity.
///
/// Positions must survive a process restart: `load_open_positions` is called
/// once at startup to reconstruct the active set before the first cycle.
#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn load_open_positions(&self, strategy_id: &str) -> Result<Vec<Position>>;

    /// Insert or update a position by id
    async fn save_position(&self, position: &Position) -> Result<()>;

    async fn append_trade(&self, record: &TradeRecord) -> Result<()>;

    async fn load_equity(&self, strategy_id: &str) -> Result<Option<Decimal>>;

    async fn save_equity(&self, strategy_id: &str, equity: Decimal) -> Result<()>;
}

/// In-memory store: the degraded mode when the database is unreachable at
/// startup, and the backing store for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    positions: RwLock<HashMap<Uuid, Position>>,
    trades: RwLock<Vec<TradeRecord>>,
    equity: RwLock<HashMap<String, Decimal>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load positions (crash-recovery fixtures)
    pub async fn seed_positions(&self, positions: Vec<Position>) {
        let mut map = self.positions.write().await;
        for position in positions {
            map.insert(position.id, position);
        }
    }

    pub async fn trade_count(&self) -> usize {
        self.trades.read().await.len()
    }

    pub async fn trades(&self) -> Vec<TradeRecord> {
        self.trades.read().await.clone()
    }
}

#[async_trait]
impl PositionStore for MemoryStore {
    async fn load_open_positions(&self, strategy_id: &str) -> Result<Vec<Position>> {
        let map = self.positions.read().await;
        Ok(map
            .values()
            .filter(|p| p.is_open() && p.strategy_id == strategy_id)
            .cloned()
            .collect())
    }

    async fn save_position(&self, position: &Position) -> Result<()> {
        let mut map = self.positions.write().await;
        map.insert(position.id, position.clone());
        Ok(())
    }

    async fn append_trade(&self, record: &TradeRecord) -> Result<()> {
        self.trades.write().await.push(record.clone());
        Ok(())
    }

    async fn load_equity(&self, strategy_id: &str) -> Result<Option<Decimal>> {
        Ok(self.equity.read().await.get(strategy_id).copied())
    }

    async fn save_equity(&self, strategy_id: &str, equity: Decimal) -> Result<()> {
        self.equity
            .write()
            .await
            .insert(strategy_id.to_string(), equity);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        let mut position = Position::open("alpha", "m1", "q", Side::Yes, dec!(0.20), dec!(100));

        store.save_position(&position).await.unwrap();
        let open = store.load_open_positions("alpha").await.unwrap();
        assert_eq!(open.len(), 1);

        // Other strategies see nothing
        assert!(store.load_open_positions("beta").await.unwrap().is_empty());

        position.close(dec!(0.42), ExitReason::ReversionComplete, Utc::now());
        store.save_position(&position).await.unwrap();
        assert!(store.load_open_positions("alpha").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_equity_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.load_equity("alpha").await.unwrap(), None);

        store.save_equity("alpha", dec!(1234.56)).await.unwrap();
        assert_eq!(
            store.load_equity("alpha").await.unwrap(),
            Some(dec!(1234.56))
        );
    }
}
