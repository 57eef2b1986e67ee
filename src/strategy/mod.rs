//! Strategy module
//!
//! The trading-decision and position-lifecycle core: signal evaluation, the
//! rule-out cache, Kelly sizing, risk gating, exit rules, and the engine
//! that drives one scan cycle after another.

pub mod engine;
pub mod lifecycle;
pub mod risk;
pub mod ruleout;
pub mod signal;
pub mod sizing;

pub use engine::{CycleControl, CycleSummary, EngineStatus, TradeEngine};
pub use lifecycle::{ExitDecision, PositionLifecycle};
pub use risk::RiskManager;
pub use ruleout::{RuleOutCache, RuleOutEntry};
pub use signal::SignalEvaluator;
pub use sizing::PositionSizer;
