pub mod ai;
pub mod gamma;
pub mod postgres;
pub mod store;

pub use ai::{AiGate, AiVerdict, ApproveAll, ChatGate};
pub use gamma::{GammaClient, MarketFeed};
pub use postgres::PostgresStore;
pub use store::{MemoryStore, PositionStore, TradeAction, TradeRecord};
