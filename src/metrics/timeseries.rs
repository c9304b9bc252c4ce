use crate::engine::Trade;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

//a point in the realized equity curve, one per trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
    pub drawdown: f64,
    pub cumulative_return: f64,
}

impl EquityPoint {
    pub fn new(date: NaiveDate, equity: f64, drawdown: f64, cumulative_return: f64) -> Self {
        EquityPoint {
            date,
            equity,
            drawdown,
            cumulative_return,
        }
    }
}

//walks the ledger in order, adding each trade's net pnl to the initial capital
pub fn calculate_equity_curve(trades: &[Trade], initial_capital: f64) -> Vec<EquityPoint> {
    let mut curve = Vec::with_capacity(trades.len());
    let mut peak = initial_capital;
    let mut equity = initial_capital;

    for trade in trades {
        equity += trade.net_pnl;

        //update peak
        if equity > peak {
            peak = equity;
        }

        //calculate drawdown
        let drawdown = if peak > 0.0 {
            (peak - equity) / peak
        } else {
            0.0
        };

        let cumulative_return = (equity - initial_capital) / initial_capital;

        curve.push(EquityPoint::new(
            trade.exit_date,
            equity,
            drawdown,
            cumulative_return,
        ));
    }

    curve
}

//calculates maximum drawdown from equity curve
pub fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    equity_curve
        .iter()
        .map(|point| point.drawdown)
        .fold(0.0, f64::max)
}
