use crate::costs::TradeLegs;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Flat,
    Open,
}

//an open long-spot / short-futures position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub pair_id: String,
    pub entry_date: NaiveDate,
    pub entry_spot_price: f64,
    pub entry_futures_price: f64,

    //underlying units held long on the spot leg
    pub spot_qty: f64,

    //futures contracts held short
    pub futures_qty: f64,

    //underlying units per futures contract
    pub contract_size: f64,

    //entry costs not yet attributed to a realized trade
    pub entry_commission: f64,
    pub entry_slippage: f64,

    //monthly basis when the position was opened
    pub entry_monthly_basis: f64,

    pub partial_exits: u32,

    //spot leg held through an etf, which charges a management fee
    #[serde(default)]
    pub spot_via_etf: bool,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        pair_id: String,
        entry_date: NaiveDate,
        entry_spot_price: f64,
        entry_futures_price: f64,
        spot_qty: f64,
        futures_qty: f64,
        contract_size: f64,
        entry_commission: f64,
        entry_slippage: f64,
        entry_monthly_basis: f64,
    ) -> Self {
        Position {
            pair_id,
            entry_date,
            entry_spot_price,
            entry_futures_price,
            spot_qty,
            futures_qty,
            contract_size,
            entry_commission,
            entry_slippage,
            entry_monthly_basis,
            partial_exits: 0,
            spot_via_etf: false,
        }
    }

    pub fn with_etf_spot_leg(mut self, spot_via_etf: bool) -> Self {
        self.spot_via_etf = spot_via_etf;
        self
    }

    //calendar days held as of a date
    pub fn holding_days(&self, date: NaiveDate) -> i64 {
        (date - self.entry_date).num_days()
    }

    pub fn entry_spot_notional(&self) -> f64 {
        self.entry_spot_price * self.spot_qty
    }

    pub fn futures_notional(&self, futures_price: f64) -> f64 {
        futures_price * self.contract_size * self.futures_qty
    }

    //both legs valued at the given prices
    pub fn legs_at(&self, spot_price: f64, futures_price: f64) -> TradeLegs {
        TradeLegs::new(
            spot_price * self.spot_qty,
            self.futures_notional(futures_price),
            self.futures_qty,
        )
    }

    pub fn entry_legs(&self) -> TradeLegs {
        self.legs_at(self.entry_spot_price, self.entry_futures_price)
    }

    //pnl of the long spot leg
    pub fn spot_pnl(&self, spot_price: f64) -> f64 {
        (spot_price - self.entry_spot_price) * self.spot_qty
    }

    //pnl of the short futures leg
    pub fn futures_pnl(&self, futures_price: f64) -> f64 {
        (self.entry_futures_price - futures_price) * self.contract_size * self.futures_qty
    }

    //combined pnl before costs, the basis change times the hedged quantity
    pub fn gross_pnl(&self, spot_price: f64, futures_price: f64) -> f64 {
        self.spot_pnl(spot_price) + self.futures_pnl(futures_price)
    }

    //reduces this position by a fraction and returns the removed slice
    //entry costs are split in the same proportion
    pub fn split_off(&mut self, fraction: f64) -> Position {
        let fraction = fraction.clamp(0.0, 1.0);
        let keep = 1.0 - fraction;

        let slice = Position {
            spot_qty: self.spot_qty * fraction,
            futures_qty: self.futures_qty * fraction,
            entry_commission: self.entry_commission * fraction,
            entry_slippage: self.entry_slippage * fraction,
            ..self.clone()
        };

        self.spot_qty *= keep;
        self.futures_qty *= keep;
        self.entry_commission *= keep;
        self.entry_slippage *= keep;
        self.partial_exits += 1;

        slice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> Position {
        Position::open(
            "BTC".to_string(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            50_000.0,
            51_000.0,
            10.0,
            2.0,
            5.0,
            260.0,
            70.0,
            0.02,
        )
    }

    #[test]
    fn converging_basis_is_profit_regardless_of_direction() {
        let p = position();
        //spot rallies, futures converge to it
        assert_eq!(p.gross_pnl(55_000.0, 55_000.0), 10_000.0);
        //spot sells off, futures converge to it
        assert_eq!(p.gross_pnl(45_000.0, 45_000.0), 10_000.0);
        assert_eq!(p.spot_pnl(45_000.0), -50_000.0);
        assert_eq!(p.futures_pnl(45_000.0), 60_000.0);
    }

    #[test]
    fn split_off_conserves_size_and_costs() {
        let mut p = position();
        let slice = p.split_off(0.5);

        assert_eq!(slice.spot_qty, 5.0);
        assert_eq!(slice.futures_qty, 1.0);
        assert_eq!(slice.entry_commission, 130.0);
        assert_eq!(p.spot_qty + slice.spot_qty, 10.0);
        assert_eq!(p.entry_slippage + slice.entry_slippage, 70.0);
        assert_eq!(p.partial_exits, 1);
        assert_eq!(slice.entry_date, p.entry_date);
    }

    #[test]
    fn slices_keep_the_etf_spot_leg() {
        let mut p = position().with_etf_spot_leg(true);
        assert!(p.split_off(0.5).spot_via_etf);
        assert!(p.spot_via_etf);
        assert!(!position().spot_via_etf);
    }

    #[test]
    fn legs_are_valued_at_given_prices() {
        let p = position();
        let legs = p.entry_legs();
        assert_eq!(legs.spot_notional, 500_000.0);
        assert_eq!(legs.futures_notional, 510_000.0);
        assert_eq!(legs.contracts, 2.0);
        assert_eq!(p.holding_days(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()), 30);
    }
}
