//a Rust-based cash-and-carry basis trade backtesting engine for futures contracts

pub mod basis;
pub mod config;
pub mod costs;
pub mod data;
pub mod engine;
pub mod instrument;
pub mod metrics;
pub mod portfolio;
pub mod signal;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::basis::{net_return, BasisMetrics, NetReturn};
    pub use crate::config::{
        AccountConfig, BasisConfig, ConfigError, CostConfig, ExpirySource, HoldingPolicy,
        SignalThresholds,
    };
    pub use crate::costs::{
        CommissionSchedule, CostBreakdown, CostModel, SlippageAssumption, TradeLegs,
    };
    pub use crate::data::{
        load_csv, save_csv, CsvSource, MarketSnapshot, SnapshotError, SnapshotRecord,
        SnapshotSource, SourceError, SyntheticParams, SyntheticSource,
    };
    pub use crate::engine::{
        run_pairs, BacktestEngine, BacktestRun, ExitReason, PositionAction, StepOutcome, Trade,
    };
    pub use crate::instrument::{generate_schedule, BasisPair, ContractSchedule, ExpiryRule};
    pub use crate::metrics::{calculate_equity_curve, BacktestResult, EquityPoint};
    pub use crate::portfolio::{Position, PositionSizing, PositionStatus};
    pub use crate::signal::risk::{assess_risk, RiskAssessment, RiskLevel};
    pub use crate::signal::{RiskContext, Signal, SignalDecision, SignalEngine};
}
