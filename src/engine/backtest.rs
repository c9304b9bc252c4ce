use crate::basis::BasisMetrics;
use crate::config::{BasisConfig, ConfigError, ExpirySource};
use crate::costs::{CostBreakdown, CostModel};
use crate::data::{MarketSnapshot, SnapshotError, SnapshotRecord};
use crate::engine::ledger::{ExitReason, Trade};
use crate::instrument::{BasisPair, ContractSchedule};
use crate::metrics::BacktestResult;
use crate::portfolio::{Position, PositionSizing, PositionStatus};
use crate::signal::{RiskContext, Signal, SignalDecision, SignalEngine};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Span};

//what the engine did with the position on one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionAction {
    Opened,
    Reduced,
    Closed(ExitReason),
}

//result of feeding one record to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    //record failed validation and was skipped
    Rejected(SnapshotError),
    Evaluated {
        date: NaiveDate,
        metrics: BasisMetrics,
        decision: SignalDecision,
        actions: Vec<PositionAction>,
    },
}

impl StepOutcome {
    pub fn actions(&self) -> &[PositionAction] {
        match self {
            StepOutcome::Rejected(_) => &[],
            StepOutcome::Evaluated { actions, .. } => actions,
        }
    }
}

//a record skipped during the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedSnapshot {
    pub date: NaiveDate,
    pub error: String,
}

//everything a finished run produces for one pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRun {
    pub pair_id: String,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub snapshots: usize,
    pub rejected: Vec<RejectedSnapshot>,
    pub trades: Vec<Trade>,
    pub result: BacktestResult,
}

//per-pair backtest state machine
//one engine owns at most one open position and appends to its own ledger
pub struct BacktestEngine {
    config: Arc<BasisConfig>,
    pair: BasisPair,
    signals: SignalEngine,
    costs: CostModel,
    schedule: ContractSchedule,
    span: Span,
    position: Option<Position>,
    ledger: Vec<Trade>,
    rejected: Vec<RejectedSnapshot>,
    first_date: Option<NaiveDate>,
    last_snapshot: Option<MarketSnapshot>,
    last_metrics: Option<BasisMetrics>,
    current_expiry: Option<NaiveDate>,
    snapshots: usize,
}

impl BacktestEngine {
    //creates a new engine, rejecting an invalid configuration before any data is seen
    pub fn new(config: Arc<BasisConfig>, pair: BasisPair) -> Result<Self, ConfigError> {
        config.validate()?;

        if !pair.contract_size.is_finite() || pair.contract_size <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "contract_size",
                value: pair.contract_size,
                expected: "a positive number of units per contract",
            });
        }

        let span = info_span!("backtest", pair = %pair.pair_id);

        Ok(BacktestEngine {
            signals: SignalEngine::new(config.thresholds),
            costs: config.costs.model(),
            schedule: ContractSchedule::new(pair.expiry_rule),
            config,
            pair,
            span,
            position: None,
            ledger: Vec::new(),
            rejected: Vec::new(),
            first_date: None,
            last_snapshot: None,
            last_metrics: None,
            current_expiry: None,
            snapshots: 0,
        })
    }

    //replaces the span every log line of this engine is recorded under
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn pair(&self) -> &BasisPair {
        &self.pair
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn status(&self) -> PositionStatus {
        match self.position {
            Some(_) => PositionStatus::Open,
            None => PositionStatus::Flat,
        }
    }

    pub fn ledger(&self) -> &[Trade] {
        &self.ledger
    }

    pub fn rejected(&self) -> &[RejectedSnapshot] {
        &self.rejected
    }

    //runs a whole series and closes out whatever is left
    pub fn run<I>(mut self, records: I) -> BacktestRun
    where
        I: IntoIterator<Item = SnapshotRecord>,
    {
        for record in records {
            self.step(record);
        }
        self.finish()
    }

    //processes one record
    pub fn step(&mut self, record: SnapshotRecord) -> StepOutcome {
        let span = self.span.clone();
        let _entered = span.enter();

        let previous = self.last_snapshot.as_ref().map(|s| s.date);
        let snapshot = match MarketSnapshot::after(record.clone(), previous) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(date = %record.date, error = %err, "skipping malformed snapshot");
                self.rejected.push(RejectedSnapshot {
                    date: record.date,
                    error: err.to_string(),
                });
                return StepOutcome::Rejected(err);
            }
        };

        let snapshot = self.resolve_expiry(snapshot);
        let metrics = BasisMetrics::from_snapshot(&snapshot);
        let risk = RiskContext::new(
            self.config.account.funding_cost_annual,
            snapshot.etf_discount_premium(),
        );
        let decision = self.signals.evaluate(&metrics, &risk);

        //a veto only matters while flat, an open position ignores entries anyway
        if decision.is_override() && self.position.is_none() {
            info!(date = %snapshot.date, rule = ?decision.rule, reason = %decision.reason, "entry vetoed");
        } else {
            debug!(
                date = %snapshot.date,
                monthly_basis = metrics.monthly_basis,
                signal = %decision.signal,
                reason = %decision.reason,
                "signal"
            );
        }

        let mut actions = Vec::new();

        if let Some(action) = self.manage_open_position(&snapshot, &metrics, &decision) {
            actions.push(action);
        }

        //entries only while flat, a position closed above may be replaced on the same snapshot
        if self.position.is_none()
            && decision.signal.is_entry()
            && metrics.monthly_basis >= self.config.thresholds.min_entry
        {
            self.open_position(&snapshot, &metrics);
            actions.push(PositionAction::Opened);
        }

        self.snapshots += 1;
        self.first_date.get_or_insert(snapshot.date);
        let date = snapshot.date;
        self.last_snapshot = Some(snapshot);
        self.last_metrics = Some(metrics);

        StepOutcome::Evaluated {
            date,
            metrics,
            decision,
            actions,
        }
    }

    //force-closes any open position at the last valid snapshot and computes the aggregate
    pub fn finish(mut self) -> BacktestRun {
        let span = self.span.clone();
        let _entered = span.enter();

        if let Some(last) = self.last_snapshot.clone() {
            if let Some(position) = self.position.take() {
                let exit_basis = self.last_metrics.map(|m| m.monthly_basis).unwrap_or(0.0);
                let trade = self.realize(&position, &last, exit_basis, ExitReason::EndOfData);
                self.record(trade);
            }
        }

        let result = BacktestResult::from_ledger(&self.ledger, self.config.account.account_size);

        info!(
            trades = result.trade_count,
            rejected = self.rejected.len(),
            total_return = result.total_return,
            "backtest finished"
        );

        BacktestRun {
            pair_id: self.pair.pair_id,
            first_date: self.first_date,
            last_date: self.last_snapshot.map(|s| s.date),
            snapshots: self.snapshots,
            rejected: self.rejected,
            trades: self.ledger,
            result,
        }
    }

    //applies the configured expiry source and tracks contract rolls
    fn resolve_expiry(&mut self, snapshot: MarketSnapshot) -> MarketSnapshot {
        let snapshot = match self.config.expiry_source {
            ExpirySource::Quoted => snapshot,
            ExpirySource::Rolling => {
                let front = self.schedule.front_month_for(snapshot.date);
                if front.expiry != snapshot.futures_expiry {
                    debug!(
                        date = %snapshot.date,
                        quoted = %snapshot.futures_expiry,
                        front_month = %front.expiry,
                        "expiry reassigned to front month"
                    );
                }
                snapshot.with_expiry(front.expiry)
            }
        };

        if self.current_expiry != Some(snapshot.futures_expiry) {
            if let Some(previous) = self.current_expiry {
                info!(
                    date = %snapshot.date,
                    from = %previous,
                    to = %snapshot.futures_expiry,
                    "contract roll"
                );
            }
            self.current_expiry = Some(snapshot.futures_expiry);
        }

        snapshot
    }

    //exit handling while open, signal exits first then the holding limit
    fn manage_open_position(
        &mut self,
        snapshot: &MarketSnapshot,
        metrics: &BasisMetrics,
        decision: &SignalDecision,
    ) -> Option<PositionAction> {
        let holding = &self.config.holding;
        let (holding_days, partial_exits) = match &self.position {
            Some(position) => (position.holding_days(snapshot.date), position.partial_exits),
            None => return None,
        };

        let close_reason = match decision.signal {
            Signal::FullExit => Some(ExitReason::FullExit),
            Signal::StopLoss => Some(ExitReason::StopLoss),
            _ if holding_days >= holding.max_holding_days => Some(ExitReason::MaxHolding),
            _ => None,
        };

        if let Some(reason) = close_reason {
            let position = self.position.take()?;
            let trade = self.realize(&position, snapshot, metrics.monthly_basis, reason);
            self.record(trade);
            return Some(PositionAction::Closed(reason));
        }

        if decision.signal == Signal::PartialExit && partial_exits < holding.max_partial_exits {
            let fraction = holding.partial_exit_fraction;
            let slice = self.position.as_mut()?.split_off(fraction);
            let trade = self.realize(&slice, snapshot, metrics.monthly_basis, ExitReason::PartialExit);
            self.record(trade);
            return Some(PositionAction::Reduced);
        }

        None
    }

    //sizes the futures leg first, then matches the spot leg to the same underlying quantity
    fn open_position(&mut self, snapshot: &MarketSnapshot, metrics: &BasisMetrics) {
        let sizing = PositionSizing::compute(
            &self.pair,
            &self.config.account,
            snapshot.spot_price,
            snapshot.etf_price,
        );
        if !sizing.within_spot_budget() {
            debug!(
                spot_value = sizing.spot_value,
                spot_budget = sizing.spot_budget,
                "minimum contract size exceeds the spot allocation"
            );
        }

        let mut position = Position::open(
            self.pair.pair_id.clone(),
            snapshot.date,
            snapshot.spot_price,
            snapshot.futures_price,
            sizing.units,
            sizing.contracts,
            self.pair.contract_size,
            0.0,
            0.0,
            metrics.monthly_basis,
        )
        .with_etf_spot_leg(snapshot.etf_price.is_some());

        let legs = position.entry_legs();
        position.entry_commission = self.costs.commission(&legs);
        position.entry_slippage = self.costs.slippage(&legs);

        info!(
            date = %snapshot.date,
            spot = snapshot.spot_price,
            futures = snapshot.futures_price,
            contracts = sizing.contracts,
            spot_qty = sizing.units,
            etf_shares = ?sizing.etf_shares,
            monthly_basis = metrics.monthly_basis,
            "position opened"
        );

        self.position = Some(position);
    }

    //charges exit costs, funding and any etf fee against a slice and builds its trade
    fn realize(
        &self,
        slice: &Position,
        snapshot: &MarketSnapshot,
        exit_monthly_basis: f64,
        reason: ExitReason,
    ) -> Trade {
        let exit_legs = slice.legs_at(snapshot.spot_price, snapshot.futures_price);
        let holding_days = slice.holding_days(snapshot.date);
        let funding = self.costs.funding(
            slice.entry_spot_notional(),
            holding_days,
            self.config.account.funding_cost_annual,
        );

        let mut costs = CostBreakdown::new(
            slice.entry_commission,
            self.costs.commission(&exit_legs),
            funding,
            slice.entry_slippage + self.costs.slippage(&exit_legs),
        );
        if slice.spot_via_etf {
            costs = costs.with_etf_expense(
                self.costs.etf_expense(slice.entry_spot_notional(), holding_days),
            );
        }

        Trade::realize(
            slice,
            snapshot.date,
            snapshot.spot_price,
            snapshot.futures_price,
            exit_monthly_basis,
            reason,
            costs,
        )
    }

    fn record(&mut self, trade: Trade) {
        info!(
            date = %trade.exit_date,
            reason = %trade.exit_reason,
            holding_days = trade.holding_days,
            gross_pnl = trade.gross_pnl,
            total_cost = trade.total_cost,
            net_pnl = trade.net_pnl,
            "trade realized"
        );
        self.ledger.push(trade);
    }
}
