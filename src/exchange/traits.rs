use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Position, Side};
use crate::error::Result;

/// Intent to open a position, handed to the executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRequest {
    pub market_id: String,
    pub question: String,
    pub side: Side,
    pub price: Decimal,
    pub size_usd: Decimal,
}

impl OpenRequest {
    pub fn shares(&self) -> Decimal {
        self.size_usd / self.price
    }
}

/// Result of a filled order
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Fill {
    pub price: Decimal,
    pub size_usd: Decimal,
    pub shares: Decimal,
}

/// Order-execution backend.
///
/// The engine treats fills as all-or-nothing: `open` either fills the full
/// size or errors (no position is created on error), and a failed `close`
/// leaves the position open for a retry next cycle.
#[async_trait]
pub trait Executor: Send + Sync {
    fn is_dry_run(&self) -> bool;

    async fn open(&self, request: &OpenRequest) -> Result<Fill>;

    async fn close(&self, position: &Position, target_price: Decimal) -> Result<Fill>;
}
