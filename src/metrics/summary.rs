use crate::basis::YEAR_DAYS;
use crate::engine::Trade;
use crate::metrics::timeseries::{calculate_equity_curve, max_drawdown};
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

//aggregate performance over a complete ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_pnl: f64,
    pub total_return: f64,
    pub win_rate: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub trade_count: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub avg_win: f64,
    pub avg_loss: f64,
    //none when there were no losing trades
    pub profit_factor: Option<f64>,
    pub total_costs: f64,
    pub avg_holding_days: f64,
}

impl BacktestResult {
    //computes every statistic once over the ledger, trades in chronological order
    pub fn from_ledger(trades: &[Trade], initial_capital: f64) -> Self {
        let total_pnl: f64 = trades.iter().map(|t| t.net_pnl).sum();
        let total_costs: f64 = trades.iter().map(|t| t.total_cost).sum();

        let curve = calculate_equity_curve(trades, initial_capital);
        let trade_stats = calculate_trade_statistics(trades);
        let avg_holding_days = average_holding_days(trades);

        let returns: Vec<f64> = trades.iter().map(|t| t.return_pct).collect();
        let sharpe_ratio = calculate_sharpe_ratio(&returns, avg_holding_days);

        BacktestResult {
            initial_capital,
            final_capital: initial_capital + total_pnl,
            total_pnl,
            total_return: total_pnl / initial_capital,
            win_rate: trade_stats.win_rate,
            sharpe_ratio,
            max_drawdown: max_drawdown(&curve),
            trade_count: trades.len(),
            winning_trades: trade_stats.winning,
            losing_trades: trade_stats.losing,
            avg_win: trade_stats.avg_win,
            avg_loss: trade_stats.avg_loss,
            profit_factor: trade_stats.profit_factor,
            total_costs,
            avg_holding_days,
        }
    }

    //prints metrics in a formatted table
    pub fn pretty_print_table(&self, title: &str) {
        let mut table = Table::new();

        table.add_row(Row::new(vec![Cell::new(title), Cell::new("Value")]));

        let profit_factor = match self.profit_factor {
            Some(pf) => format!("{:.3}", pf),
            None => "n/a".to_string(),
        };

        let rows = [
            ("Initial Capital", format!("${:.2}", self.initial_capital)),
            ("Final Capital", format!("${:.2}", self.final_capital)),
            (
                "Total Return",
                format!("${:.2} ({:.2}%)", self.total_pnl, self.total_return * 100.0),
            ),
            ("Max Drawdown", format!("{:.2}%", self.max_drawdown * 100.0)),
            ("Sharpe Ratio", format!("{:.3}", self.sharpe_ratio)),
            ("Number of Trades", format!("{}", self.trade_count)),
            (
                "Win Rate",
                format!(
                    "{:.2}% ({}W / {}L)",
                    self.win_rate * 100.0,
                    self.winning_trades,
                    self.losing_trades
                ),
            ),
            ("Avg Win", format!("{:.3}%", self.avg_win * 100.0)),
            ("Avg Loss", format!("{:.3}%", self.avg_loss * 100.0)),
            ("Profit Factor", profit_factor),
            ("Total Costs", format!("${:.2}", self.total_costs)),
            ("Avg Holding", format!("{:.1} days", self.avg_holding_days)),
        ];

        for (label, value) in rows {
            table.add_row(Row::new(vec![Cell::new(label), Cell::new(&value)]));
        }

        table.printstd();
    }
}

struct TradeStats {
    winning: usize,
    losing: usize,
    win_rate: f64,
    avg_win: f64,
    avg_loss: f64,
    profit_factor: Option<f64>,
}

fn calculate_trade_statistics(trades: &[Trade]) -> TradeStats {
    if trades.is_empty() {
        return TradeStats {
            winning: 0,
            losing: 0,
            win_rate: 0.0,
            avg_win: 0.0,
            avg_loss: 0.0,
            profit_factor: None,
        };
    }

    let wins: Vec<&Trade> = trades.iter().filter(|t| t.is_win()).collect();
    let losses: Vec<&Trade> = trades.iter().filter(|t| t.net_pnl < 0.0).collect();

    let avg_return = |group: &[&Trade]| {
        if group.is_empty() {
            0.0
        } else {
            group.iter().map(|t| t.return_pct).sum::<f64>() / group.len() as f64
        }
    };

    let gross_wins: f64 = wins.iter().map(|t| t.net_pnl).sum();
    let gross_losses: f64 = losses.iter().map(|t| t.net_pnl).sum::<f64>().abs();

    let profit_factor = if gross_losses > 0.0 {
        Some(gross_wins / gross_losses)
    } else {
        None
    };

    TradeStats {
        winning: wins.len(),
        losing: losses.len(),
        win_rate: wins.len() as f64 / trades.len() as f64,
        avg_win: avg_return(&wins),
        avg_loss: avg_return(&losses),
        profit_factor,
    }
}

fn average_holding_days(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.holding_days as f64).sum::<f64>() / trades.len() as f64
}

//per-trade sharpe annualized by how many average holds fit in a year
fn calculate_sharpe_ratio(returns: &[f64], avg_holding_days: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let mean = returns.mean();
    let std_dev = returns.std_dev();

    if !std_dev.is_finite() || std_dev == 0.0 {
        return 0.0;
    }

    let periods_per_year = YEAR_DAYS / avg_holding_days.max(1.0);
    (mean / std_dev) * periods_per_year.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costs::CostBreakdown;
    use crate::engine::ExitReason;
    use chrono::NaiveDate;

    fn trade(day: u32, net_pnl: f64, holding_days: i64) -> Trade {
        let date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        Trade {
            pair_id: "BTC".to_string(),
            entry_date: date,
            exit_date: date,
            entry_spot_price: 100.0,
            entry_futures_price: 101.0,
            exit_spot_price: 100.0,
            exit_futures_price: 100.0,
            spot_qty: 100.0,
            futures_qty: 100.0,
            exit_reason: ExitReason::FullExit,
            entry_monthly_basis: 0.01,
            exit_monthly_basis: 0.0,
            gross_pnl: net_pnl,
            costs: CostBreakdown::default(),
            total_cost: 0.0,
            net_pnl,
            holding_days,
            entry_notional: 10_000.0,
            return_pct: net_pnl / 10_000.0,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_ledger_is_all_zero() {
        let result = BacktestResult::from_ledger(&[], 100_000.0);
        assert_eq!(result.trade_count, 0);
        assert_eq!(result.total_return, 0.0);
        assert_eq!(result.win_rate, 0.0);
        assert_eq!(result.sharpe_ratio, 0.0);
        assert_eq!(result.max_drawdown, 0.0);
        assert_eq!(result.final_capital, 100_000.0);
    }

    #[test]
    fn totals_and_win_rate() {
        let trades = vec![trade(1, 1000.0, 10), trade(2, -500.0, 20), trade(3, 1500.0, 30)];
        let result = BacktestResult::from_ledger(&trades, 100_000.0);

        assert!(close(result.total_return, 0.02));
        assert!(close(result.win_rate, 2.0 / 3.0));
        assert_eq!(result.winning_trades, 2);
        assert_eq!(result.losing_trades, 1);
        assert!(close(result.profit_factor.unwrap(), 5.0));
        assert!(close(result.avg_holding_days, 20.0));
        assert!(close(result.avg_win, 0.125));
    }

    #[test]
    fn drawdown_walks_the_ledger_in_order() {
        //100k -> 110k -> 99k -> 104.5k
        let trades = vec![trade(1, 10_000.0, 5), trade(2, -11_000.0, 5), trade(3, 5_500.0, 5)];
        let result = BacktestResult::from_ledger(&trades, 100_000.0);
        assert!(close(result.max_drawdown, 0.1));
    }

    #[test]
    fn drawdown_from_initial_capital() {
        let trades = vec![trade(1, -2_000.0, 5), trade(2, -3_000.0, 5)];
        let result = BacktestResult::from_ledger(&trades, 100_000.0);
        assert!(close(result.max_drawdown, 0.05));
        assert_eq!(result.profit_factor, Some(0.0));
    }

    #[test]
    fn sharpe_uses_actual_holding_spacing() {
        let trades = vec![trade(1, 100.0, 73), trade(2, 300.0, 73)];
        let result = BacktestResult::from_ledger(&trades, 100_000.0);

        //returns 0.01 and 0.03, mean 0.02, sample sd sqrt(0.0002), five holds per year
        let expected = (0.02 / 0.0002_f64.sqrt()) * 5.0_f64.sqrt();
        assert!(close(result.sharpe_ratio, expected));
    }

    #[test]
    fn sharpe_is_zero_without_dispersion() {
        let single = BacktestResult::from_ledger(&[trade(1, 100.0, 10)], 100_000.0);
        assert_eq!(single.sharpe_ratio, 0.0);

        let flat = vec![trade(1, 100.0, 10), trade(2, 100.0, 10)];
        let result = BacktestResult::from_ledger(&flat, 100_000.0);
        assert_eq!(result.sharpe_ratio, 0.0);
    }
}
