pub mod market;
pub mod position;
pub mod state;

pub use market::{MarketSnapshot, Side, Signal, SignalStrength, FAIR_VALUE};
pub use position::{ExitReason, Position, PositionStatus};
pub use state::RiskState;
