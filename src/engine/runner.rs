use crate::config::{BasisConfig, ConfigError};
use crate::data::SnapshotRecord;
use crate::engine::backtest::{BacktestEngine, BacktestRun};
use crate::instrument::BasisPair;
use indexmap::IndexMap;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::info_span;

//backtests every pair independently on the rayon pool
//pairs share only the read-only configuration, results keep input order
pub fn run_pairs<F>(
    config: Arc<BasisConfig>,
    series: IndexMap<String, Vec<SnapshotRecord>>,
    resolve_pair: F,
) -> Result<IndexMap<String, BacktestRun>, ConfigError>
where
    F: Fn(&str) -> BasisPair + Sync,
{
    config.validate()?;

    let jobs: Vec<(String, Vec<SnapshotRecord>)> = series.into_iter().collect();

    let runs: Vec<(String, BacktestRun)> = jobs
        .into_par_iter()
        .map(|(pair_id, records)| {
            let pair = resolve_pair(&pair_id);
            let span = info_span!("pair", pair = %pair_id);
            let engine = BacktestEngine::new(Arc::clone(&config), pair)?.with_span(span);
            Ok((pair_id, engine.run(records)))
        })
        .collect::<Result<_, ConfigError>>()?;

    Ok(runs.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn series(start_basis: f64, days: i64) -> Vec<SnapshotRecord> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..days)
            .map(|i| {
                let date = start + Duration::days(i);
                let basis = start_basis + 0.001 * i as f64;
                SnapshotRecord::new(date, 100.0, 100.0 * (1.0 + basis), date + Duration::days(30))
            })
            .collect()
    }

    #[test]
    fn parallel_runs_match_sequential_runs() {
        let config = Arc::new(BasisConfig::default());
        let mut input = IndexMap::new();
        input.insert("GOLD".to_string(), series(0.006, 40));
        input.insert("BTC".to_string(), series(0.012, 20));
        input.insert("OIL".to_string(), series(-0.001, 10));

        let runs = run_pairs(Arc::clone(&config), input.clone(), BasisPair::resolve).unwrap();
        assert_eq!(
            runs.keys().cloned().collect::<Vec<_>>(),
            vec!["GOLD", "BTC", "OIL"]
        );

        for (pair_id, records) in input {
            let engine = BacktestEngine::new(Arc::clone(&config), BasisPair::resolve(&pair_id)).unwrap();
            let sequential = engine.run(records);
            assert_eq!(runs[&pair_id], sequential);
        }
    }

    #[test]
    fn invalid_configuration_is_reported_before_running() {
        let mut config = BasisConfig::default();
        config.account.leverage = 0.5;
        let mut input = IndexMap::new();
        input.insert("BTC".to_string(), series(0.012, 5));

        assert!(run_pairs(Arc::new(config), input, BasisPair::resolve).is_err());
    }
}
