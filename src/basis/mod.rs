pub mod metrics;

pub use metrics::{net_return, BasisMetrics, NetReturn, MONTH_DAYS, YEAR_DAYS};
