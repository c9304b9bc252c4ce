pub mod basis_config;

pub use basis_config::{
    AccountConfig, BasisConfig, ConfigError, CostConfig, ExpirySource, HoldingPolicy,
    SignalThresholds,
};
