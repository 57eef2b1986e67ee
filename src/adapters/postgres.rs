use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, info};

use super::store::{PositionStore, TradeRecord};
use crate::domain::{ExitReason, Position, PositionStatus, Side};
use crate::error::{Result, SkewError};

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn position_from_row(row: &sqlx::postgres::PgRow) -> Result<Position> {
        let side_str: String = row.get("side");
        let side = Side::try_from(side_str.as_str()).map_err(SkewError::Internal)?;

        let status_str: String = row.get("status");
        let status = PositionStatus::try_from(status_str.as_str()).map_err(SkewError::Internal)?;

        let exit_reason = row
            .get::<Option<String>, _>("exit_reason")
            .and_then(|s| ExitReason::try_from(s.as_str()).ok());

        Ok(Position {
            id: row.get("id"),
            strategy_id: row.get("strategy_id"),
            market_id: row.get("market_id"),
            question: row.get("question"),
            side,
            entry_price: row.get("entry_price"),
            size_usd: row.get("size_usd"),
            shares: row.get("shares"),
            opened_at: row.get("opened_at"),
            status,
            current_price: row.get("current_price"),
            exit_price: row.get("exit_price"),
            exit_reason,
            pnl: row.get("pnl"),
            closed_at: row.get("closed_at"),
        })
    }
}

#[async_trait]
impl PositionStore for PostgresStore {
    async fn load_open_positions(&self, strategy_id: &str) -> Result<Vec<Position>> {
        let rows = sqlx::query(
            r#"
            SELECT id, strategy_id, market_id, question, side,
                   entry_price, size_usd, shares, opened_at, status,
                   current_price, exit_price, exit_reason, pnl, closed_at
            FROM positions
            WHERE status = 'OPEN' AND strategy_id = $1
            ORDER BY opened_at ASC
            "#,
        )
        .bind(strategy_id)
        .fetch_all(&self.pool)
        .await?;

        let mut positions = Vec::with_capacity(rows.len());
        for row in &rows {
            positions.push(Self::position_from_row(row)?);
        }

        debug!(
            strategy_id,
            count = positions.len(),
            "loaded open positions"
        );
        Ok(positions)
    }

    async fn save_position(&self, position: &Position) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO positions (
                id, strategy_id, market_id, question, side,
                entry_price, size_usd, shares, opened_at, status,
                current_price, exit_price, exit_reason, pnl, closed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                current_price = EXCLUDED.current_price,
                exit_price = EXCLUDED.exit_price,
                exit_reason = EXCLUDED.exit_reason,
                pnl = EXCLUDED.pnl,
                closed_at = EXCLUDED.closed_at
            "#,
        )
        .bind(position.id)
        .bind(&position.strategy_id)
        .bind(&position.market_id)
        .bind(&position.question)
        .bind(position.side.as_str())
        .bind(position.entry_price)
        .bind(position.size_usd)
        .bind(position.shares)
        .bind(position.opened_at)
        .bind(position.status.as_str())
        .bind(position.current_price)
        .bind(position.exit_price)
        .bind(position.exit_reason.map(|r| r.as_str()))
        .bind(position.pnl)
        .bind(position.closed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn append_trade(&self, record: &TradeRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trades (
                id, strategy_id, market_id, question, action, side,
                price, size_usd, shares, pnl, reason, executed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(record.id)
        .bind(&record.strategy_id)
        .bind(&record.market_id)
        .bind(&record.question)
        .bind(record.action.as_str())
        .bind(record.side.as_str())
        .bind(record.price)
        .bind(record.size_usd)
        .bind(record.shares)
        .bind(record.pnl)
        .bind(&record.reason)
        .bind(record.executed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_equity(&self, strategy_id: &str) -> Result<Option<Decimal>> {
        let row = sqlx::query(
            r#"
            SELECT equity FROM strategy_equity WHERE strategy_id = $1
            "#,
        )
        .bind(strategy_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get("equity")))
    }

    async fn save_equity(&self, strategy_id: &str, equity: Decimal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO strategy_equity (strategy_id, equity, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (strategy_id) DO UPDATE SET
                equity = EXCLUDED.equity,
                updated_at = NOW()
            "#,
        )
        .bind(strategy_id)
        .bind(equity)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
