use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use super::traits::{Executor, Fill, OpenRequest};
use crate::domain::Position;
use crate::error::{Result, SkewError};

/// Paper-trading executor: fills every order at the requested price.
///
/// Keeps the execution seam exercised end to end without touching the venue;
/// a live CLOB backend would implement the same trait.
#[derive(Debug, Default)]
pub struct PaperExecutor {
    dry_run: bool,
}

impl PaperExecutor {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

#[async_trait]
impl Executor for PaperExecutor {
    fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    async fn open(&self, request: &OpenRequest) -> Result<Fill> {
        if request.price <= Decimal::ZERO || request.price >= Decimal::ONE {
            return Err(SkewError::OrderRejected(format!(
                "price {} outside (0, 1)",
                request.price
            )));
        }
        if request.size_usd <= Decimal::ZERO {
            return Err(SkewError::OrderRejected(format!(
                "non-positive size {}",
                request.size_usd
            )));
        }

        info!(
            market_id = %request.market_id,
            side = %request.side,
            price = %request.price,
            size_usd = %request.size_usd,
            "paper fill: open"
        );

        Ok(Fill {
            price: request.price,
            size_usd: request.size_usd,
            shares: request.shares(),
        })
    }

    async fn close(&self, position: &Position, target_price: Decimal) -> Result<Fill> {
        if target_price < Decimal::ZERO || target_price > Decimal::ONE {
            return Err(SkewError::OrderRejected(format!(
                "price {} outside [0, 1]",
                target_price
            )));
        }

        info!(
            market_id = %position.market_id,
            side = %position.side,
            price = %target_price,
            shares = %position.shares,
            "paper fill: close"
        );

        Ok(Fill {
            price: target_price,
            size_usd: position.shares * target_price,
            shares: position.shares,
        })
    }
}
