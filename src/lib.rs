pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod strategy;

pub use adapters::{
    AiGate, AiVerdict, ApproveAll, ChatGate, GammaClient, MarketFeed, MemoryStore, PositionStore,
    PostgresStore, TradeAction, TradeRecord,
};
pub use config::AppConfig;
pub use error::{Result, RiskError, SkewError};
pub use exchange::{Executor, Fill, OpenRequest, PaperExecutor};
pub use strategy::{
    CycleControl, CycleSummary, EngineStatus, PositionLifecycle, PositionSizer, RiskManager,
    RuleOutCache, SignalEvaluator, TradeEngine,
};
