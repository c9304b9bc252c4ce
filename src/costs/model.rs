use serde::{Deserialize, Serialize};

//commission charged per side of a trade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommissionSchedule {
    //fraction of spot notional
    pub spot_rate: f64,

    //floor on the spot commission per side
    pub spot_minimum: f64,

    //flat amount per futures contract per side
    pub futures_per_contract: f64,
}

impl Default for CommissionSchedule {
    fn default() -> Self {
        CommissionSchedule {
            spot_rate: 0.0005,
            spot_minimum: 1.0,
            futures_per_contract: 2.0,
        }
    }
}

//expected slippage as a fraction of notional per side
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlippageAssumption {
    pub spot_rate: f64,
    pub futures_rate: f64,
}

impl Default for SlippageAssumption {
    fn default() -> Self {
        SlippageAssumption {
            spot_rate: 0.0001,
            futures_rate: 0.0002,
        }
    }
}

//the two legs of one side of a basis trade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeLegs {
    pub spot_notional: f64,
    pub futures_notional: f64,
    pub contracts: f64,
}

impl TradeLegs {
    pub fn new(spot_notional: f64, futures_notional: f64, contracts: f64) -> Self {
        //sizes only, direction is irrelevant to cost
        TradeLegs {
            spot_notional: spot_notional.abs(),
            futures_notional: futures_notional.abs(),
            contracts: contracts.abs(),
        }
    }
}

//cost of one position lifecycle, every component non-negative
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub entry_commission: f64,
    pub exit_commission: f64,
    pub funding_cost: f64,
    pub slippage_cost: f64,

    //management fee of an etf held as the spot leg
    #[serde(default)]
    pub etf_expense: f64,

    pub total_cost: f64,
}

impl CostBreakdown {
    pub fn new(
        entry_commission: f64,
        exit_commission: f64,
        funding_cost: f64,
        slippage_cost: f64,
    ) -> Self {
        CostBreakdown {
            entry_commission,
            exit_commission,
            funding_cost,
            slippage_cost,
            etf_expense: 0.0,
            total_cost: entry_commission + exit_commission + funding_cost + slippage_cost,
        }
    }

    pub fn with_etf_expense(mut self, etf_expense: f64) -> Self {
        self.total_cost += etf_expense - self.etf_expense;
        self.etf_expense = etf_expense;
        self
    }

    //costs that accrue over the holding period
    pub fn holding_cost(&self) -> f64 {
        self.funding_cost + self.etf_expense
    }
}

//annual management fee of spot bitcoin etfs (ibit, fbtc)
pub const DEFAULT_ETF_EXPENSE_RATIO: f64 = 0.0025;

//deterministic commission, slippage, funding and etf fee calculator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub commission: CommissionSchedule,
    pub slippage: SlippageAssumption,
    pub etf_expense_ratio_annual: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel::new(CommissionSchedule::default(), SlippageAssumption::default())
    }
}

impl CostModel {
    pub fn new(commission: CommissionSchedule, slippage: SlippageAssumption) -> Self {
        CostModel {
            commission,
            slippage,
            etf_expense_ratio_annual: DEFAULT_ETF_EXPENSE_RATIO,
        }
    }

    pub fn with_etf_expense_ratio(mut self, ratio: f64) -> Self {
        self.etf_expense_ratio_annual = ratio;
        self
    }

    //commission for one side (entry or exit) of both legs
    pub fn commission(&self, legs: &TradeLegs) -> f64 {
        let spot = (legs.spot_notional * self.commission.spot_rate).max(self.commission.spot_minimum);
        let futures = legs.contracts * self.commission.futures_per_contract;
        spot + futures
    }

    //slippage for one side (entry or exit) of both legs
    pub fn slippage(&self, legs: &TradeLegs) -> f64 {
        legs.spot_notional * self.slippage.spot_rate
            + legs.futures_notional * self.slippage.futures_rate
    }

    //linear funding accrual on the financed notional
    //holding period is clamped to at least one day
    pub fn funding(&self, notional: f64, holding_days: i64, funding_rate_annual: f64) -> f64 {
        let days = holding_days.max(1) as f64;
        notional.abs() * (funding_rate_annual / 365.0) * days
    }

    //etf management fee on the spot notional, same day count as funding
    pub fn etf_expense(&self, notional: f64, holding_days: i64) -> f64 {
        let days = holding_days.max(1) as f64;
        notional.abs() * (self.etf_expense_ratio_annual / 365.0) * days
    }

    //full cost of entering, holding and exiting a position
    pub fn round_trip(
        &self,
        entry: &TradeLegs,
        exit: &TradeLegs,
        holding_days: i64,
        funding_rate_annual: f64,
    ) -> CostBreakdown {
        CostBreakdown::new(
            self.commission(entry),
            self.commission(exit),
            self.funding(entry.spot_notional, holding_days, funding_rate_annual),
            self.slippage(entry) + self.slippage(exit),
        )
    }

    //round trip with the spot leg held through an etf
    pub fn round_trip_via_etf(
        &self,
        entry: &TradeLegs,
        exit: &TradeLegs,
        holding_days: i64,
        funding_rate_annual: f64,
    ) -> CostBreakdown {
        self.round_trip(entry, exit, holding_days, funding_rate_annual)
            .with_etf_expense(self.etf_expense(entry.spot_notional, holding_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn one_btc_round_trip_matches_hand_calculation() {
        let model = CostModel::default();
        //one btc against 0.2 of a 5-btc contract
        let entry = TradeLegs::new(50_000.0, 51_000.0, 0.2);
        let exit = TradeLegs::new(50_000.0, 50_000.0, 0.2);

        let costs = model.round_trip(&entry, &exit, 30, 0.05);

        //25 spot + 0.4 futures per side
        assert!(close(costs.entry_commission, 25.4));
        assert!(close(costs.exit_commission, 25.4));
        //5 + 10.2 entry, 5 + 10 exit
        assert!(close(costs.slippage_cost, 30.2));
        assert!(close(costs.funding_cost, 50_000.0 * 0.05 / 365.0 * 30.0));
        assert!(close(
            costs.total_cost,
            costs.entry_commission + costs.exit_commission + costs.funding_cost + costs.slippage_cost
        ));
    }

    #[test]
    fn spot_commission_has_a_floor() {
        let model = CostModel::default();
        let tiny = TradeLegs::new(100.0, 100.0, 0.0);
        assert!(close(model.commission(&tiny), 1.0));
    }

    #[test]
    fn funding_days_are_clamped_to_one() {
        let model = CostModel::default();
        let same_day = model.funding(365_000.0, 0, 0.05);
        let negative = model.funding(365_000.0, -3, 0.05);
        assert!(close(same_day, 50.0));
        assert!(close(negative, 50.0));
        assert!(close(model.funding(365_000.0, 10, 0.05), 500.0));
    }

    #[test]
    fn total_cost_is_never_negative() {
        let model = CostModel::new(
            CommissionSchedule {
                spot_rate: 0.0,
                spot_minimum: 0.0,
                futures_per_contract: 0.0,
            },
            SlippageAssumption {
                spot_rate: 0.0,
                futures_rate: 0.0,
            },
        );
        let cases = [
            (TradeLegs::new(-10_000.0, -9_000.0, -2.0), -5, 0.0),
            (TradeLegs::new(0.0, 0.0, 0.0), 0, 0.05),
            (TradeLegs::new(1e9, 1e9, 100.0), 10_000, 0.2),
        ];

        for (legs, days, rate) in cases {
            let costs = model.round_trip(&legs, &legs, days, rate);
            assert!(costs.total_cost >= 0.0);
            assert!(costs.funding_cost >= 0.0);

            let default_costs = CostModel::default().round_trip(&legs, &legs, days, rate);
            assert!(default_costs.total_cost >= 0.0);
        }
    }

    #[test]
    fn etf_expense_accrues_like_funding() {
        let model = CostModel::default();
        assert!(close(model.etf_expense(365_000.0, 30), 365_000.0 * 0.0025 / 365.0 * 30.0));
        assert!(close(model.etf_expense(365_000.0, 0), 2.5));
        assert!(close(model.etf_expense(-365_000.0, -2), 2.5));

        let direct = model.with_etf_expense_ratio(0.0);
        assert_eq!(direct.etf_expense(365_000.0, 30), 0.0);
    }

    #[test]
    fn etf_expense_is_a_holding_cost_in_the_total() {
        let costs = CostBreakdown::new(10.0, 10.0, 40.0, 5.0).with_etf_expense(2.5);
        assert!(close(costs.holding_cost(), 42.5));
        assert!(close(costs.total_cost, 67.5));

        let model = CostModel::default();
        let legs = TradeLegs::new(50_000.0, 50_000.0, 0.2);
        let round_trip = model.round_trip(&legs, &legs, 30, 0.05);
        assert_eq!(round_trip.etf_expense, 0.0);
        let held = model.round_trip_via_etf(&legs, &legs, 30, 0.05);
        assert!(close(held.etf_expense, model.etf_expense(50_000.0, 30)));
        assert!(close(held.total_cost, round_trip.total_cost + held.etf_expense));
    }
}
