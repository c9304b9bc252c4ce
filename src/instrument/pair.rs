use crate::instrument::schedule::ExpiryRule;
use serde::{Deserialize, Serialize};

//a spot/futures pair traded as one basis position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasisPair {
    //pair identifier (eg btc, gold)
    pub pair_id: String,

    //futures root symbol (eg MBT, GC)
    pub futures_symbol: String,

    //instrument used for the spot leg (eg IBIT, GLD)
    pub spot_symbol: String,

    //exchange listing the futures
    pub exchange: String,

    //underlying units per futures contract
    pub contract_size: f64,

    //unit of the underlying (eg BTC, oz)
    pub unit: String,

    //expiry convention of the futures
    pub expiry_rule: ExpiryRule,
}

impl BasisPair {
    pub fn new(
        pair_id: &str,
        futures_symbol: &str,
        spot_symbol: &str,
        exchange: &str,
        contract_size: f64,
        unit: &str,
    ) -> Self {
        BasisPair {
            pair_id: pair_id.to_string(),
            futures_symbol: futures_symbol.to_string(),
            spot_symbol: spot_symbol.to_string(),
            exchange: exchange.to_string(),
            contract_size,
            unit: unit.to_string(),
            expiry_rule: ExpiryRule::LastFriday,
        }
    }

    //cme bitcoin futures against a spot bitcoin etf
    pub fn btc() -> Self {
        BasisPair::new("BTC", "BTC", "IBIT", "CME", 5.0, "BTC")
    }

    //cme ether futures
    pub fn eth() -> Self {
        BasisPair::new("ETH", "ETH", "ETHA", "CME", 50.0, "ETH")
    }

    //comex gold
    pub fn gold() -> Self {
        BasisPair::new("GOLD", "GC", "GLD", "COMEX", 100.0, "oz")
    }

    //comex silver
    pub fn silver() -> Self {
        BasisPair::new("SILVER", "SI", "SLV", "COMEX", 5000.0, "oz")
    }

    //nymex wti crude
    pub fn oil() -> Self {
        BasisPair::new("OIL", "CL", "USO", "NYMEX", 1000.0, "barrels")
    }

    //looks up a built-in pair by id
    pub fn preset(pair_id: &str) -> Option<Self> {
        match pair_id.to_uppercase().as_str() {
            "BTC" => Some(BasisPair::btc()),
            "ETH" => Some(BasisPair::eth()),
            "GOLD" | "GC" => Some(BasisPair::gold()),
            "SILVER" | "SI" => Some(BasisPair::silver()),
            "OIL" | "CL" => Some(BasisPair::oil()),
            _ => None,
        }
    }

    //a pair with no preset, one unit per contract unless told otherwise
    pub fn custom(pair_id: &str, contract_size: Option<f64>) -> Self {
        BasisPair::new(
            pair_id,
            pair_id,
            pair_id,
            "UNKNOWN",
            contract_size.unwrap_or(1.0),
            "units",
        )
    }

    //preset when known, otherwise a custom pair
    pub fn resolve(pair_id: &str) -> Self {
        BasisPair::preset(pair_id).unwrap_or_else(|| BasisPair::custom(pair_id, None))
    }

    pub fn with_expiry_rule(mut self, rule: ExpiryRule) -> Self {
        self.expiry_rule = rule;
        self
    }

    //whole contracts needed to hedge a quantity of the underlying, at least one
    pub fn contracts_for(&self, underlying_qty: f64) -> f64 {
        (underlying_qty / self.contract_size).round().max(1.0)
    }

    //underlying units covered by a number of contracts
    pub fn underlying_for(&self, contracts: f64) -> f64 {
        contracts * self.contract_size
    }

    //notional value of a futures leg
    pub fn futures_notional(&self, price: f64, contracts: f64) -> f64 {
        price * self.contract_size * contracts.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contracts_round_and_floor_at_one() {
        let btc = BasisPair::btc();
        assert_eq!(btc.contracts_for(1.0), 1.0);
        assert_eq!(btc.contracts_for(12.4), 2.0);
        assert_eq!(btc.contracts_for(13.0), 3.0);
        assert_eq!(btc.underlying_for(3.0), 15.0);
    }

    #[test]
    fn futures_notional_ignores_direction() {
        let gold = BasisPair::gold();
        assert_eq!(gold.futures_notional(2000.0, -2.0), 400_000.0);
    }

    #[test]
    fn resolve_falls_back_to_custom() {
        assert_eq!(BasisPair::resolve("gc").pair_id, "GOLD");
        let custom = BasisPair::resolve("XYZ");
        assert_eq!(custom.contract_size, 1.0);
        assert_eq!(custom.exchange, "UNKNOWN");
    }
}
