use crate::config::AccountConfig;
use crate::instrument::BasisPair;
use serde::{Deserialize, Serialize};

//legs further apart than this in dollars are not treated as delta neutral
const DELTA_NEUTRAL_TOLERANCE: f64 = 1000.0;

//how a new basis position is split across its two legs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSizing {
    pub contracts: f64,

    //underlying units on each leg
    pub units: f64,

    pub futures_value: f64,

    //whole etf shares covering the futures value, when the spot leg is an etf
    pub etf_shares: Option<f64>,
    pub spot_value: f64,

    //the account's spot allocation
    pub spot_budget: f64,
}

impl PositionSizing {
    //futures leg first, whole contracts with a minimum of one
    //leverage scales returns, not the position
    pub fn compute(
        pair: &BasisPair,
        account: &AccountConfig,
        spot_price: f64,
        etf_price: Option<f64>,
    ) -> Self {
        let contracts = pair.contracts_for(account.futures_target_amount() / spot_price);
        let units = pair.underlying_for(contracts);
        let futures_value = units * spot_price;

        let etf_shares = etf_price
            .filter(|p| p.is_finite() && *p > 0.0)
            .map(|p| (futures_value / p).floor());
        let spot_value = match (etf_shares, etf_price) {
            (Some(shares), Some(price)) => shares * price,
            _ => futures_value,
        };

        PositionSizing {
            contracts,
            units,
            futures_value,
            etf_shares,
            spot_value,
            spot_budget: account.spot_target_amount(),
        }
    }

    pub fn total_exposure(&self) -> f64 {
        self.spot_value + self.futures_value
    }

    pub fn is_delta_neutral(&self) -> bool {
        (self.spot_value - self.futures_value).abs() < DELTA_NEUTRAL_TOLERANCE
    }

    //spot leg fits the configured spot allocation
    pub fn within_spot_budget(&self) -> bool {
        self.spot_value <= self.spot_budget
    }
}
