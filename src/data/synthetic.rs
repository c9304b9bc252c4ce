use crate::basis::MONTH_DAYS;
use crate::data::snapshot::SnapshotRecord;
use crate::data::source::{SnapshotSource, SourceError};
use crate::instrument::{ContractSchedule, ExpiryRule};
use chrono::{Duration, NaiveDate};
use indexmap::IndexMap;
use rand::distributions::Distribution;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

//parameters of a generated daily series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticParams {
    pub pair_id: String,
    pub start: NaiveDate,
    pub days: usize,
    pub start_price: f64,

    //daily standard deviation of spot returns
    pub daily_volatility: f64,

    //monthly carry drawn each day, floored at carry_floor
    pub carry_mean: f64,
    pub carry_std: f64,
    pub carry_floor: f64,

    pub expiry_rule: ExpiryRule,
    pub seed: u64,
}

impl SyntheticParams {
    pub fn new(pair_id: &str, start: NaiveDate, days: usize, seed: u64) -> Self {
        SyntheticParams {
            pair_id: pair_id.to_uppercase(),
            start,
            days,
            start_price: 50_000.0,
            daily_volatility: 0.02,
            carry_mean: 0.015,
            carry_std: 0.01,
            carry_floor: -0.01,
            expiry_rule: ExpiryRule::LastFriday,
            seed,
        }
    }

    pub fn with_start_price(mut self, start_price: f64) -> Self {
        self.start_price = start_price;
        self
    }

    pub fn with_carry(mut self, mean: f64, std: f64) -> Self {
        self.carry_mean = mean;
        self.carry_std = std;
        self
    }
}

//seeded random-walk spot with a noisy monthly carry priced against the front month
//the same params always produce the same series
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    params: Vec<SyntheticParams>,
}

impl SyntheticSource {
    pub fn new(params: SyntheticParams) -> Self {
        SyntheticSource {
            params: vec![params],
        }
    }

    pub fn with_pair(mut self, params: SyntheticParams) -> Self {
        self.params.push(params);
        self
    }

    pub fn generate(params: &SyntheticParams) -> Result<Vec<SnapshotRecord>, SourceError> {
        if !params.start_price.is_finite() || params.start_price <= 0.0 {
            return Err(SourceError::InvalidParameter {
                field: "start_price",
                reason: format!("{} is not a positive price", params.start_price),
            });
        }

        let returns = Normal::new(0.0, params.daily_volatility).map_err(|e| {
            SourceError::InvalidParameter {
                field: "daily_volatility",
                reason: e.to_string(),
            }
        })?;
        let carry = Normal::new(params.carry_mean, params.carry_std).map_err(|e| {
            SourceError::InvalidParameter {
                field: "carry_std",
                reason: e.to_string(),
            }
        })?;

        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let mut schedule = ContractSchedule::new(params.expiry_rule);
        let floor_price = params.start_price * 0.2;
        let mut spot = params.start_price;
        let mut records = Vec::with_capacity(params.days);

        for day in 0..params.days {
            let date = params.start + Duration::days(day as i64);

            spot = (spot * (1.0 + returns.sample(&mut rng))).max(floor_price);
            let monthly_carry = carry.sample(&mut rng).max(params.carry_floor);

            let expiry = schedule.front_month_expiry(date);
            let days_to_expiry = (expiry - date).num_days() as f64;
            let futures = spot * (1.0 + monthly_carry * days_to_expiry / MONTH_DAYS);

            records.push(SnapshotRecord::new(date, spot, futures, expiry));
        }

        Ok(records)
    }
}

impl SnapshotSource for SyntheticSource {
    fn load_all(&self) -> Result<IndexMap<String, Vec<SnapshotRecord>>, SourceError> {
        let mut series = IndexMap::new();
        for params in &self.params {
            series.insert(params.pair_id.clone(), SyntheticSource::generate(params)?);
        }
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::BasisMetrics;

    fn params(seed: u64) -> SyntheticParams {
        SyntheticParams::new("btc", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 90, seed)
    }

    #[test]
    fn same_seed_same_series() {
        let a = SyntheticSource::generate(&params(7)).unwrap();
        let b = SyntheticSource::generate(&params(7)).unwrap();
        let c = SyntheticSource::generate(&params(8)).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn series_is_daily_positive_and_priced_to_front_month() {
        let records = SyntheticSource::generate(&params(42)).unwrap();
        assert_eq!(records.len(), 90);

        for pair in records.windows(2) {
            assert_eq!((pair[1].date - pair[0].date).num_days(), 1);
        }

        for record in &records {
            assert!(record.spot_price >= 10_000.0);
            assert!(record.futures_price > 0.0);
            assert!(record.futures_expiry > record.date);

            let metrics = BasisMetrics::compute(
                record.spot_price,
                record.futures_price,
                record.date,
                record.futures_expiry,
            );
            assert!(metrics.monthly_basis >= -0.01 - 1e-9);
        }
    }

    #[test]
    fn rejects_bad_parameters() {
        let mut p = params(1);
        p.carry_std = -1.0;
        assert!(matches!(
            SyntheticSource::generate(&p),
            Err(SourceError::InvalidParameter { field: "carry_std", .. })
        ));
    }

    #[test]
    fn serves_every_configured_pair() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let source = SyntheticSource::new(params(1))
            .with_pair(SyntheticParams::new("gold", start, 30, 2).with_start_price(2000.0));

        let all = source.load_all().unwrap();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["BTC", "GOLD"]);
        assert_eq!(all["GOLD"].len(), 30);
        assert_eq!(source.load("gold").unwrap(), all["GOLD"]);
    }
}
