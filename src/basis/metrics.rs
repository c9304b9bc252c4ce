use crate::data::MarketSnapshot;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

//days in the normalized holding period
pub const MONTH_DAYS: f64 = 30.0;

//days in the annualization period
pub const YEAR_DAYS: f64 = 365.0;

//basis measurements for one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasisMetrics {
    //futures - spot
    pub basis_absolute: f64,

    //basis as a fraction of spot
    pub basis_percent: f64,

    //calendar days to expiry, never negative
    pub days_to_expiry: i64,

    //basis normalized to a 30-day hold
    pub monthly_basis: f64,

    //basis normalized to a 365-day hold
    pub annualized_basis: f64,

    //the quoted contract expired before the snapshot date
    pub expired: bool,

    //no days left to normalize over, normalized metrics forced to zero
    pub zero_duration: bool,
}

impl BasisMetrics {
    //computes metrics for a snapshot against its quoted expiry
    pub fn from_snapshot(snapshot: &MarketSnapshot) -> Self {
        BasisMetrics::compute(
            snapshot.spot_price,
            snapshot.futures_price,
            snapshot.date,
            snapshot.futures_expiry,
        )
    }

    //computes metrics from raw prices and dates
    //spot must be positive, which validated snapshots guarantee
    pub fn compute(spot_price: f64, futures_price: f64, date: NaiveDate, expiry: NaiveDate) -> Self {
        let basis_absolute = futures_price - spot_price;
        let basis_percent = basis_absolute / spot_price;

        let raw_days = (expiry - date).num_days();
        let expired = raw_days < 0;
        let days_to_expiry = raw_days.max(0);
        let zero_duration = days_to_expiry == 0;

        let (monthly_basis, annualized_basis) = if zero_duration {
            (0.0, 0.0)
        } else {
            let days = days_to_expiry as f64;
            (
                basis_percent * (MONTH_DAYS / days),
                basis_percent * (YEAR_DAYS / days),
            )
        };

        BasisMetrics {
            basis_absolute,
            basis_percent,
            days_to_expiry,
            monthly_basis,
            annualized_basis,
            expired,
            zero_duration,
        }
    }

    //futures above spot
    pub fn is_contango(&self) -> bool {
        self.basis_absolute > 0.0
    }

    //futures below spot
    pub fn is_backwardation(&self) -> bool {
        self.basis_absolute < 0.0
    }
}

//carry returns after funding
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetReturn {
    pub gross_annualized: f64,
    pub net_annualized: f64,
    pub leveraged_return: f64,
}

//annualized carry net of funding, all zero when there is no duration left
pub fn net_return(
    basis_percent: f64,
    days_to_expiry: i64,
    funding_cost_annual: f64,
    leverage: f64,
) -> NetReturn {
    if days_to_expiry <= 0 {
        return NetReturn {
            gross_annualized: 0.0,
            net_annualized: 0.0,
            leveraged_return: 0.0,
        };
    }

    let gross_annualized = basis_percent * (YEAR_DAYS / days_to_expiry as f64);
    let net_annualized = gross_annualized - funding_cost_annual;

    NetReturn {
        gross_annualized,
        net_annualized,
        leveraged_return: net_annualized * leverage,
    }
}
