use crate::basis::BasisMetrics;
use crate::config::BasisConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

//funding above this annual rate is considered elevated
const HIGH_FUNDING: f64 = 0.06;

//etf tracking within this band of nav is considered tight
const TIGHT_TRACKING: f64 = 0.002;

//contracts this close to expiry carry roll risk
const NEAR_EXPIRY_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn is_elevated(&self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskFactor {
    pub name: &'static str,
    pub level: RiskLevel,
    pub note: String,
}

//qualitative risk picture of a basis trade at one snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub factors: Vec<RiskFactor>,
    pub overall: RiskLevel,
}

impl RiskAssessment {
    pub fn factor(&self, name: &str) -> Option<&RiskFactor> {
        self.factors.iter().find(|f| f.name == name)
    }
}

pub fn assess_risk(
    metrics: &BasisMetrics,
    etf_discount_premium: Option<f64>,
    config: &BasisConfig,
) -> RiskAssessment {
    let mut factors = Vec::with_capacity(4);

    let funding = config.account.funding_cost_annual;
    factors.push(if funding > HIGH_FUNDING {
        factor("funding", RiskLevel::High, format!("funding cost elevated ({:.2}%)", funding * 100.0))
    } else {
        factor("funding", RiskLevel::Moderate, "normal funding environment".to_string())
    });

    factors.push(if metrics.monthly_basis < 0.0 {
        factor("basis", RiskLevel::Critical, "backwardation, negative carry".to_string())
    } else if metrics.monthly_basis < config.thresholds.min_entry {
        factor("basis", RiskLevel::High, "basis near zero".to_string())
    } else {
        factor("basis", RiskLevel::Low, "positive contango".to_string())
    });

    factors.push(match etf_discount_premium {
        Some(p) if p < -config.thresholds.max_etf_discount => factor(
            "liquidity",
            RiskLevel::High,
            format!("ETF trading at {:.2}% discount to NAV", -p * 100.0),
        ),
        Some(p) if p.abs() < TIGHT_TRACKING => {
            factor("liquidity", RiskLevel::Low, "ETF tracking NAV closely".to_string())
        }
        _ => factor("liquidity", RiskLevel::Moderate, "normal ETF tracking".to_string()),
    });

    factors.push(if metrics.days_to_expiry < NEAR_EXPIRY_DAYS {
        factor(
            "operational",
            RiskLevel::High,
            format!("{} days to expiry, roll soon", metrics.days_to_expiry),
        )
    } else {
        factor("operational", RiskLevel::Low, "sufficient time to expiry".to_string())
    });

    let elevated = factors.iter().filter(|f| f.level.is_elevated()).count();
    let overall = match elevated {
        0 => RiskLevel::Low,
        1 | 2 => RiskLevel::Moderate,
        _ => RiskLevel::High,
    };

    RiskAssessment { factors, overall }
}

fn factor(name: &'static str, level: RiskLevel, note: String) -> RiskFactor {
    RiskFactor { name, level, note }
}
