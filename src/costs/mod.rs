pub mod model;

pub use model::{
    CommissionSchedule, CostBreakdown, CostModel, SlippageAssumption, TradeLegs,
    DEFAULT_ETF_EXPENSE_RATIO,
};
