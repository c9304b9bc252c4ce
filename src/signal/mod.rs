pub mod risk;

use crate::basis::BasisMetrics;
use crate::config::SignalThresholds;
use serde::{Deserialize, Serialize};
use std::fmt;

//trading signal for the basis trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    StrongEntry,
    AcceptableEntry,
    NoEntry,
    PartialExit,
    FullExit,
    StopLoss,
}

impl Signal {
    pub fn is_entry(&self) -> bool {
        matches!(self, Signal::StrongEntry | Signal::AcceptableEntry)
    }

    pub fn is_exit(&self) -> bool {
        matches!(
            self,
            Signal::PartialExit | Signal::FullExit | Signal::StopLoss
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::StrongEntry => "STRONG_ENTRY",
            Signal::AcceptableEntry => "ACCEPTABLE_ENTRY",
            Signal::NoEntry => "NO_ENTRY",
            Signal::PartialExit => "PARTIAL_EXIT",
            Signal::FullExit => "FULL_EXIT",
            Signal::StopLoss => "STOP_LOSS",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//the rule that produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalRule {
    Backwardation,
    Compressed,
    FullExit,
    PartialExit,
    StrongEntry,
    AcceptableEntry,
    BelowMinimum,
    FundingExceedsBasis,
    EtfDiscount,
}

//a signal together with the rule that fired and a readable reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDecision {
    pub signal: Signal,
    pub rule: SignalRule,
    pub reason: String,
}

impl SignalDecision {
    fn new(signal: Signal, rule: SignalRule, reason: String) -> Self {
        SignalDecision {
            signal,
            rule,
            reason,
        }
    }

    //downgrade overrides replace an entry with no entry
    pub fn is_override(&self) -> bool {
        matches!(
            self.rule,
            SignalRule::FundingExceedsBasis | SignalRule::EtfDiscount
        )
    }
}

impl fmt::Display for SignalDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.signal, self.reason)
    }
}

//market conditions outside the basis itself that can veto an entry
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskContext {
    pub funding_cost_annual: f64,

    //etf premium (positive) or discount (negative) to nav
    pub etf_discount_premium: Option<f64>,
}

impl RiskContext {
    pub fn new(funding_cost_annual: f64, etf_discount_premium: Option<f64>) -> Self {
        RiskContext {
            funding_cost_annual,
            etf_discount_premium,
        }
    }
}

//stateless threshold evaluator
//knows nothing about open positions, callers gate entries and exits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalEngine {
    thresholds: SignalThresholds,
}

impl SignalEngine {
    pub fn new(thresholds: SignalThresholds) -> Self {
        SignalEngine { thresholds }
    }

    //first matching threshold rule, then risk overrides on entries
    pub fn evaluate(&self, metrics: &BasisMetrics, risk: &RiskContext) -> SignalDecision {
        let decision = self.threshold_decision(metrics);

        if !decision.signal.is_entry() {
            return decision;
        }

        if risk.funding_cost_annual > metrics.annualized_basis {
            return SignalDecision::new(
                Signal::NoEntry,
                SignalRule::FundingExceedsBasis,
                format!(
                    "funding cost {:.2}% exceeds annualized basis {:.2}%, entry refused",
                    risk.funding_cost_annual * 100.0,
                    metrics.annualized_basis * 100.0
                ),
            );
        }

        if let Some(premium) = risk.etf_discount_premium {
            if premium < -self.thresholds.max_etf_discount {
                return SignalDecision::new(
                    Signal::NoEntry,
                    SignalRule::EtfDiscount,
                    format!(
                        "ETF discount {:.2}% to NAV beyond {:.2}%, liquidity risk",
                        -premium * 100.0,
                        self.thresholds.max_etf_discount * 100.0
                    ),
                );
            }
        }

        decision
    }

    fn threshold_decision(&self, metrics: &BasisMetrics) -> SignalDecision {
        let t = &self.thresholds;
        let monthly = metrics.monthly_basis;
        let pct = monthly * 100.0;

        if monthly < 0.0 {
            return SignalDecision::new(
                Signal::StopLoss,
                SignalRule::Backwardation,
                format!("backwardation detected, monthly basis {:.3}%", pct),
            );
        }

        if monthly < t.stop_loss {
            let detail = if metrics.zero_duration {
                " (no days left to expiry)"
            } else {
                ""
            };
            return SignalDecision::new(
                Signal::StopLoss,
                SignalRule::Compressed,
                format!(
                    "basis compressed to {:.3}% monthly, below {:.2}%{}",
                    pct,
                    t.stop_loss * 100.0,
                    detail
                ),
            );
        }

        if monthly >= t.full_exit {
            return SignalDecision::new(
                Signal::FullExit,
                SignalRule::FullExit,
                format!(
                    "basis at peak levels {:.3}% monthly (>= {:.2}%), take profit",
                    pct,
                    t.full_exit * 100.0
                ),
            );
        }

        if monthly >= t.partial_exit {
            return SignalDecision::new(
                Signal::PartialExit,
                SignalRule::PartialExit,
                format!(
                    "elevated basis {:.3}% monthly (>= {:.2}%), partial exit",
                    pct,
                    t.partial_exit * 100.0
                ),
            );
        }

        if monthly >= t.strong_entry {
            return SignalDecision::new(
                Signal::StrongEntry,
                SignalRule::StrongEntry,
                format!(
                    "strong basis {:.3}% monthly (>= {:.2}%)",
                    pct,
                    t.strong_entry * 100.0
                ),
            );
        }

        if monthly >= t.min_entry {
            return SignalDecision::new(
                Signal::AcceptableEntry,
                SignalRule::AcceptableEntry,
                format!(
                    "acceptable basis {:.3}% monthly ({:.2}%-{:.2}%)",
                    pct,
                    t.min_entry * 100.0,
                    t.strong_entry * 100.0
                ),
            );
        }

        SignalDecision::new(
            Signal::NoEntry,
            SignalRule::BelowMinimum,
            format!(
                "basis too low {:.3}% monthly, minimum {:.2}%",
                pct,
                t.min_entry * 100.0
            ),
        )
    }
}
