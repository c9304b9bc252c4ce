use crate::costs::CostBreakdown;
use crate::portfolio::Position;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

//why a trade was realized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    PartialExit,
    FullExit,
    StopLoss,
    MaxHolding,
    EndOfData,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::PartialExit => "partial_exit",
            ExitReason::FullExit => "full_exit",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::MaxHolding => "max_holding",
            ExitReason::EndOfData => "end_of_data",
        }
    }

    //true when the whole position is gone afterwards
    pub fn closes_position(&self) -> bool {
        !matches!(self, ExitReason::PartialExit)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//immutable record of a realized slice of a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub pair_id: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_spot_price: f64,
    pub entry_futures_price: f64,
    pub exit_spot_price: f64,
    pub exit_futures_price: f64,
    pub spot_qty: f64,
    pub futures_qty: f64,
    pub exit_reason: ExitReason,
    pub entry_monthly_basis: f64,
    pub exit_monthly_basis: f64,
    pub gross_pnl: f64,
    pub costs: CostBreakdown,
    pub total_cost: f64,
    pub net_pnl: f64,
    pub holding_days: i64,

    //spot notional committed at entry for this slice
    pub entry_notional: f64,

    //net pnl over entry notional
    pub return_pct: f64,
}

impl Trade {
    //realizes a position slice at the given exit prices
    pub fn realize(
        slice: &Position,
        exit_date: NaiveDate,
        exit_spot_price: f64,
        exit_futures_price: f64,
        exit_monthly_basis: f64,
        exit_reason: ExitReason,
        costs: CostBreakdown,
    ) -> Self {
        let gross_pnl = slice.gross_pnl(exit_spot_price, exit_futures_price);
        let net_pnl = gross_pnl - costs.total_cost;
        let entry_notional = slice.entry_spot_notional();
        let return_pct = if entry_notional > 0.0 {
            net_pnl / entry_notional
        } else {
            0.0
        };

        Trade {
            pair_id: slice.pair_id.clone(),
            entry_date: slice.entry_date,
            exit_date,
            entry_spot_price: slice.entry_spot_price,
            entry_futures_price: slice.entry_futures_price,
            exit_spot_price,
            exit_futures_price,
            spot_qty: slice.spot_qty,
            futures_qty: slice.futures_qty,
            exit_reason,
            entry_monthly_basis: slice.entry_monthly_basis,
            exit_monthly_basis,
            gross_pnl,
            costs,
            total_cost: costs.total_cost,
            net_pnl,
            holding_days: slice.holding_days(exit_date).max(0),
            entry_notional,
            return_pct,
        }
    }

    pub fn is_win(&self) -> bool {
        self.net_pnl > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_pnl_is_gross_minus_every_cost() {
        let slice = Position::open(
            "BTC".to_string(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            50_000.0,
            51_000.0,
            1.0,
            0.2,
            5.0,
            25.4,
            15.2,
            0.02,
        );
        let costs = CostBreakdown::new(25.4, 25.4, 205.48, 30.2);

        let trade = Trade::realize(
            &slice,
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            51_000.0,
            51_000.0,
            0.0,
            ExitReason::MaxHolding,
            costs,
        );

        assert_eq!(trade.gross_pnl, 1000.0);
        assert!((trade.net_pnl - (1000.0 - 286.48)).abs() < 1e-9);
        assert_eq!(trade.holding_days, 30);
        assert_eq!(trade.entry_notional, 50_000.0);
        assert!((trade.return_pct - trade.net_pnl / 50_000.0).abs() < 1e-15);
        assert!(trade.is_win());
    }

    #[test]
    fn exit_reasons_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&ExitReason::EndOfData).unwrap(),
            "\"end_of_data\""
        );
        assert!(!ExitReason::PartialExit.closes_position());
        assert!(ExitReason::StopLoss.closes_position());
    }
}
