pub mod pair;
pub mod schedule;

pub use pair::BasisPair;
pub use schedule::{
    generate_schedule, ContractExpiry, ContractMonth, ContractSchedule, ExpiryRule,
};
