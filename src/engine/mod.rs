pub mod backtest;
pub mod ledger;
pub mod runner;

pub use backtest::{BacktestEngine, BacktestRun, PositionAction, RejectedSnapshot, StepOutcome};
pub use ledger::{ExitReason, Trade};
pub use runner::run_pairs;
