use crate::costs::{CommissionSchedule, CostModel, SlippageAssumption, DEFAULT_ETF_EXPENSE_RATIO};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },
    #[error("{field} = {value} is out of range, expected {expected}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
    #[error("{lower} ({lower_value}) must be below {upper} ({upper_value})")]
    ThresholdOrder {
        lower: &'static str,
        lower_value: f64,
        upper: &'static str,
        upper_value: f64,
    },
}

//monthly-basis thresholds of the signal engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalThresholds {
    pub stop_loss: f64,
    pub min_entry: f64,
    pub strong_entry: f64,
    pub partial_exit: f64,
    pub full_exit: f64,

    //largest tolerated etf discount to nav before entries are refused
    pub max_etf_discount: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        SignalThresholds {
            stop_loss: 0.002,
            min_entry: 0.005,
            strong_entry: 0.010,
            partial_exit: 0.025,
            full_exit: 0.035,
            max_etf_discount: 0.01,
        }
    }
}

impl SignalThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("stop_loss", self.stop_loss),
            ("min_entry", self.min_entry),
            ("strong_entry", self.strong_entry),
            ("partial_exit", self.partial_exit),
            ("full_exit", self.full_exit),
            ("max_etf_discount", self.max_etf_discount),
        ];
        for (field, value) in named {
            finite(field, value)?;
        }

        at_least("stop_loss", self.stop_loss, 0.0, "a non-negative monthly basis")?;
        at_least("max_etf_discount", self.max_etf_discount, 0.0, "a non-negative fraction")?;

        below("stop_loss", self.stop_loss, "min_entry", self.min_entry)?;
        if self.min_entry > self.strong_entry {
            return Err(ConfigError::ThresholdOrder {
                lower: "min_entry",
                lower_value: self.min_entry,
                upper: "strong_entry",
                upper_value: self.strong_entry,
            });
        }
        below("strong_entry", self.strong_entry, "partial_exit", self.partial_exit)?;
        below("partial_exit", self.partial_exit, "full_exit", self.full_exit)?;

        Ok(())
    }
}

//account size, leg allocation and financing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub account_size: f64,
    pub spot_allocation: f64,
    pub futures_allocation: f64,
    pub funding_cost_annual: f64,
    pub leverage: f64,
}

impl Default for AccountConfig {
    fn default() -> Self {
        AccountConfig {
            account_size: 200_000.0,
            spot_allocation: 0.5,
            futures_allocation: 0.5,
            funding_cost_annual: 0.05,
            leverage: 1.0,
        }
    }
}

impl AccountConfig {
    pub fn spot_target_amount(&self) -> f64 {
        self.account_size * self.spot_allocation
    }

    pub fn futures_target_amount(&self) -> f64 {
        self.account_size * self.futures_allocation
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        finite("account_size", self.account_size)?;
        finite("spot_allocation", self.spot_allocation)?;
        finite("futures_allocation", self.futures_allocation)?;
        finite("funding_cost_annual", self.funding_cost_annual)?;
        finite("leverage", self.leverage)?;

        if self.account_size <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "account_size",
                value: self.account_size,
                expected: "a positive amount",
            });
        }
        fraction("spot_allocation", self.spot_allocation)?;
        fraction("futures_allocation", self.futures_allocation)?;
        at_least("funding_cost_annual", self.funding_cost_annual, 0.0, "a non-negative rate")?;
        at_least("leverage", self.leverage, 1.0, "at least 1.0")?;

        Ok(())
    }
}

//how long positions may live and how they are scaled out
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoldingPolicy {
    pub max_holding_days: i64,

    //share of the open position realized on a partial exit
    pub partial_exit_fraction: f64,

    //partial exits allowed per position
    pub max_partial_exits: u32,
}

impl Default for HoldingPolicy {
    fn default() -> Self {
        HoldingPolicy {
            max_holding_days: 30,
            partial_exit_fraction: 0.5,
            max_partial_exits: 1,
        }
    }
}

impl HoldingPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_holding_days < 1 {
            return Err(ConfigError::OutOfRange {
                field: "max_holding_days",
                value: self.max_holding_days as f64,
                expected: "at least one day",
            });
        }

        finite("partial_exit_fraction", self.partial_exit_fraction)?;
        if self.partial_exit_fraction <= 0.0 || self.partial_exit_fraction >= 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "partial_exit_fraction",
                value: self.partial_exit_fraction,
                expected: "strictly between 0 and 1",
            });
        }

        Ok(())
    }
}

//where each snapshot's contract expiry comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirySource {
    //trust the expiry carried by the record
    #[default]
    Quoted,
    //reassign the front-month expiry from the pair's rolling schedule
    Rolling,
}

impl ExpirySource {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quoted" | "record" => Some(ExpirySource::Quoted),
            "rolling" | "front_month" => Some(ExpirySource::Rolling),
            _ => None,
        }
    }
}

//commission and slippage schedule, plus the fee of an etf spot leg
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub commission: CommissionSchedule,
    pub slippage: SlippageAssumption,

    //charged only while the spot leg is held through an etf
    pub etf_expense_ratio_annual: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        CostConfig {
            commission: CommissionSchedule::default(),
            slippage: SlippageAssumption::default(),
            etf_expense_ratio_annual: DEFAULT_ETF_EXPENSE_RATIO,
        }
    }
}

impl CostConfig {
    pub fn model(&self) -> CostModel {
        CostModel::new(self.commission, self.slippage)
            .with_etf_expense_ratio(self.etf_expense_ratio_annual)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let rates = [
            ("commission.spot_rate", self.commission.spot_rate),
            ("commission.spot_minimum", self.commission.spot_minimum),
            (
                "commission.futures_per_contract",
                self.commission.futures_per_contract,
            ),
            ("slippage.spot_rate", self.slippage.spot_rate),
            ("slippage.futures_rate", self.slippage.futures_rate),
            ("etf_expense_ratio_annual", self.etf_expense_ratio_annual),
        ];

        for (field, value) in rates {
            finite(field, value)?;
            at_least(field, value, 0.0, "a non-negative amount")?;
        }

        Ok(())
    }
}

//complete, read-only configuration shared by every component of a run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BasisConfig {
    pub thresholds: SignalThresholds,
    pub account: AccountConfig,
    pub holding: HoldingPolicy,
    pub costs: CostConfig,
    pub expiry_source: ExpirySource,
}

impl BasisConfig {
    //checks every section, first failure wins
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;
        self.account.validate()?;
        self.holding.validate()?;
        self.costs.validate()?;
        Ok(())
    }

    //load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: BasisConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    //save configuration to a JSON file
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite { field, value })
    }
}

fn at_least(
    field: &'static str,
    value: f64,
    min: f64,
    expected: &'static str,
) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            expected,
        });
    }
    Ok(())
}

fn fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value <= 0.0 || value > 1.0 {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            expected: "a fraction in (0, 1]",
        });
    }
    Ok(())
}

fn below(
    lower: &'static str,
    lower_value: f64,
    upper: &'static str,
    upper_value: f64,
) -> Result<(), ConfigError> {
    if lower_value >= upper_value {
        return Err(ConfigError::ThresholdOrder {
            lower,
            lower_value,
            upper,
            upper_value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(BasisConfig::default().validate(), Ok(()));
    }

    #[test]
    fn stop_loss_above_strong_entry_is_rejected() {
        let mut config = BasisConfig::default();
        config.thresholds.stop_loss = 0.012;

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ThresholdOrder {
                lower: "stop_loss",
                ..
            }
        ));
    }

    #[test]
    fn exit_thresholds_must_be_ordered() {
        let mut config = BasisConfig::default();
        config.thresholds.partial_exit = 0.04;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_finite_and_negative_values_are_rejected() {
        let mut config = BasisConfig::default();
        config.thresholds.full_exit = f64::INFINITY;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonFinite { field: "full_exit", .. })
        ));

        let mut config = BasisConfig::default();
        config.costs.slippage.futures_rate = -0.001;
        assert!(config.validate().is_err());

        let mut config = BasisConfig::default();
        config.account.account_size = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn holding_policy_bounds() {
        let mut config = BasisConfig::default();
        config.holding.max_holding_days = 0;
        assert!(config.validate().is_err());

        let mut config = BasisConfig::default();
        config.holding.partial_exit_fraction = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let json = r#"{ "thresholds": { "min_entry": 0.006 }, "expiry_source": "rolling" }"#;
        let config: BasisConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.thresholds.min_entry, 0.006);
        assert_eq!(config.thresholds.full_exit, 0.035);
        assert_eq!(config.expiry_source, ExpirySource::Rolling);
        assert_eq!(config.holding.max_holding_days, 30);
        assert_eq!(config.costs.etf_expense_ratio_annual, 0.0025);
    }

    #[test]
    fn etf_expense_ratio_reaches_the_cost_model() {
        let mut config = BasisConfig::default();
        config.costs.etf_expense_ratio_annual = 0.0012;
        assert_eq!(config.costs.model().etf_expense_ratio_annual, 0.0012);

        config.costs.etf_expense_ratio_annual = -0.001;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "etf_expense_ratio_annual", .. })
        ));
    }

    #[test]
    fn json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = BasisConfig::default();
        config.holding.max_holding_days = 45;
        config.to_json_file(&path).unwrap();

        let loaded = BasisConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn invalid_json_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "thresholds": { "stop_loss": 0.02 } }"#).unwrap();

        assert!(BasisConfig::from_json_file(&path).is_err());
    }
}
