use anyhow::{Context, Result};
use basis_carry::prelude::*;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use prettytable::{Cell, Row, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "basis-carry")]
#[command(about = "A Rust-based cash-and-carry basis trade backtester for futures", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    //backtest one or more pairs
    Run {
        //path to csv snapshot file (omit to use a synthetic series)
        #[arg(long)]
        data: Option<PathBuf>,

        //pair for rows without a pair column, or the synthetic pair
        #[arg(long, default_value = "BTC")]
        pair: String,

        //only backtest these pairs (comma separated)
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,

        //json configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        //expiry source (quoted, rolling), overrides the config file
        #[arg(long)]
        expiry_source: Option<String>,

        //expiry rule for the rolling schedule (last_friday, last_calendar_day)
        #[arg(long)]
        expiry_rule: Option<String>,

        //units per futures contract for pairs without a preset
        #[arg(long)]
        contract_size: Option<f64>,

        //synthetic series options
        //first date of the synthetic series
        #[arg(long, default_value = "2024-01-01")]
        start: String,

        //number of daily snapshots to generate
        #[arg(long, default_value = "365")]
        days: usize,

        //rng seed
        #[arg(long, default_value = "42")]
        seed: u64,

        //starting spot price
        #[arg(long, default_value = "50000")]
        start_price: f64,

        //output options
        //output path for trades csv
        #[arg(long)]
        output_trades_csv: Option<PathBuf>,

        //output path for equity curve csv
        #[arg(long)]
        output_equity_csv: Option<PathBuf>,

        //output path for the full run as json
        #[arg(long)]
        output_json: Option<PathBuf>,

        //save the generated synthetic series as csv
        #[arg(long)]
        save_data: Option<PathBuf>,
    },

    //print the monthly expiry schedule for a date range
    Schedule {
        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,

        //expiry rule (last_friday, last_calendar_day)
        #[arg(long, default_value = "last_friday")]
        rule: String,
    },

    //signal, carry and risk assessment for the latest snapshot of a pair
    Analyze {
        //path to csv snapshot file
        #[arg(long)]
        data: PathBuf,

        #[arg(long, default_value = "BTC")]
        pair: String,

        //json configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            pair,
            only,
            config,
            expiry_source,
            expiry_rule,
            contract_size,
            start,
            days,
            seed,
            start_price,
            output_trades_csv,
            output_equity_csv,
            output_json,
            save_data,
        } => {
            let config = load_config(config.as_deref(), expiry_source.as_deref())?;
            let rule = parse_rule(expiry_rule.as_deref())?;

            let source: Box<dyn SnapshotSource> = match data {
                Some(path) => {
                    info!(path = ?path, "loading snapshots");
                    Box::new(CsvSource::new(path, &pair))
                }
                None => {
                    let start = parse_day(&start)?;
                    let params = SyntheticParams::new(&pair, start, days, seed)
                        .with_start_price(start_price);
                    info!(pair = %params.pair_id, days, seed, "generating synthetic series");
                    Box::new(SyntheticSource::new(params))
                }
            };

            let mut series = source.load_all()?;
            if !only.is_empty() {
                let wanted: Vec<String> = only.iter().map(|p| p.to_uppercase()).collect();
                series.retain(|pair_id, _| wanted.contains(pair_id));
            }
            if series.is_empty() {
                anyhow::bail!("No snapshot data to backtest");
            }

            if let Some(path) = save_data {
                save_csv(&series, &path)?;
                println!("Snapshots saved to {:?}", path);
            }

            let outputs = RunOutputs {
                trades_csv: output_trades_csv,
                equity_csv: output_equity_csv,
                json: output_json,
            };
            run_backtest(config, series, rule, contract_size, outputs)?;
        }
        Commands::Schedule { start, end, rule } => {
            let rule = parse_rule(Some(rule.as_str()))?;
            print_schedule(parse_day(&start)?, parse_day(&end)?, rule)?;
        }
        Commands::Analyze { data, pair, config } => {
            let config = load_config(config.as_deref(), None)?;
            analyze_latest(&data, &pair, &config)?;
        }
    }

    Ok(())
}

struct RunOutputs {
    trades_csv: Option<PathBuf>,
    equity_csv: Option<PathBuf>,
    json: Option<PathBuf>,
}

fn load_config(path: Option<&Path>, expiry_source: Option<&str>) -> Result<BasisConfig> {
    let mut config = match path {
        Some(path) => BasisConfig::from_json_file(path)?,
        None => BasisConfig::default(),
    };

    if let Some(source) = expiry_source {
        config.expiry_source = ExpirySource::parse(source)
            .ok_or_else(|| anyhow::anyhow!("Unknown expiry source: {}", source))?;
    }

    config.validate()?;
    Ok(config)
}

fn parse_rule(rule: Option<&str>) -> Result<Option<ExpiryRule>> {
    match rule {
        Some(s) => ExpiryRule::parse(s)
            .map(Some)
            .ok_or_else(|| anyhow::anyhow!("Unknown expiry rule: {}", s)),
        None => Ok(None),
    }
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    basis_carry::data::parse_date(s).context(format!("Invalid date: {}", s))
}

fn resolve_pair(pair_id: &str, rule: Option<ExpiryRule>, contract_size: Option<f64>) -> BasisPair {
    let pair = match BasisPair::preset(pair_id) {
        Some(pair) => pair,
        None => BasisPair::custom(pair_id, contract_size),
    };
    match rule {
        Some(rule) => pair.with_expiry_rule(rule),
        None => pair,
    }
}

fn run_backtest(
    config: BasisConfig,
    series: IndexMap<String, Vec<SnapshotRecord>>,
    rule: Option<ExpiryRule>,
    contract_size: Option<f64>,
    outputs: RunOutputs,
) -> Result<()> {
    println!("Basis Carry Backtesting Engine");
    println!("==============================\n");

    for (pair_id, records) in &series {
        let pair = resolve_pair(pair_id, rule, contract_size);
        println!(
            "{}: {} snapshots, {} x {} {} per contract ({})",
            pair_id,
            records.len(),
            pair.futures_symbol,
            pair.contract_size,
            pair.unit,
            pair.exchange
        );
    }
    println!(
        "\nAccount: ${:.2} ({:.0}% spot / {:.0}% futures), funding {:.2}%",
        config.account.account_size,
        config.account.spot_allocation * 100.0,
        config.account.futures_allocation * 100.0,
        config.account.funding_cost_annual * 100.0
    );
    println!("Expiry source: {:?}\n", config.expiry_source);

    let runs = run_pairs(Arc::new(config), series, |id| {
        resolve_pair(id, rule, contract_size)
    })?;

    for (pair_id, run) in &runs {
        println!("\n{} ({} to {})", pair_id, fmt_date(run.first_date), fmt_date(run.last_date));
        if !run.rejected.is_empty() {
            println!("Skipped {} malformed snapshot(s)", run.rejected.len());
        }
        run.result.pretty_print_table(&format!("{} Results", pair_id));
        print_trades(&run.trades);
    }

    let trades: Vec<&Trade> = runs.values().flat_map(|run| run.trades.iter()).collect();

    if let Some(path) = outputs.trades_csv {
        save_trades_csv(&trades, &path)?;
        println!("\nTrades saved to {:?}", path);
    }

    if let Some(path) = outputs.equity_csv {
        save_equity_csv(&runs, &path)?;
        println!("Equity curve saved to {:?}", path);
    }

    if let Some(path) = outputs.json {
        let json = serde_json::to_string_pretty(&runs)?;
        std::fs::write(&path, json).context(format!("Failed to write {:?}", path))?;
        println!("Run saved to {:?}", path);
    }

    Ok(())
}

fn fmt_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}

fn print_trades(trades: &[Trade]) {
    if trades.is_empty() {
        println!("No trades");
        return;
    }

    let mut table = Table::new();
    table.add_row(Row::new(
        ["Entry", "Exit", "Reason", "Days", "Entry Basis", "Gross", "Costs", "Net"]
            .iter()
            .map(|h| Cell::new(h))
            .collect(),
    ));

    for trade in trades {
        table.add_row(Row::new(vec![
            Cell::new(&trade.entry_date.to_string()),
            Cell::new(&trade.exit_date.to_string()),
            Cell::new(trade.exit_reason.as_str()),
            Cell::new(&trade.holding_days.to_string()),
            Cell::new(&format!("{:.3}%", trade.entry_monthly_basis * 100.0)),
            Cell::new(&format!("${:.2}", trade.gross_pnl)),
            Cell::new(&format!("${:.2}", trade.total_cost)),
            Cell::new(&format!("${:.2}", trade.net_pnl)),
        ]));
    }

    table.printstd();
}

fn print_schedule(start: NaiveDate, end: NaiveDate, rule: Option<ExpiryRule>) -> Result<()> {
    if end < start {
        anyhow::bail!("End date {} is before start date {}", end, start);
    }

    let schedule = generate_schedule(start, end, rule.unwrap_or_default());

    println!("Expiry rule: {:?}", schedule.rule());

    let mut table = Table::new();
    table.add_row(Row::new(vec![Cell::new("Contract"), Cell::new("Expiry")]));
    for entry in schedule.entries() {
        table.add_row(Row::new(vec![
            Cell::new(&entry.month.to_string()),
            Cell::new(&entry.expiry.format("%Y-%m-%d (%a)").to_string()),
        ]));
    }
    table.printstd();

    Ok(())
}

fn analyze_latest(data: &Path, pair_id: &str, config: &BasisConfig) -> Result<()> {
    let records = CsvSource::new(data, pair_id).load(pair_id)?;
    let latest = records
        .into_iter()
        .max_by_key(|r| r.date)
        .ok_or_else(|| anyhow::anyhow!("No snapshots for {}", pair_id))?;

    let pair = BasisPair::resolve(pair_id);
    let mut snapshot = MarketSnapshot::new(latest)?;
    if config.expiry_source == ExpirySource::Rolling {
        let expiry = ContractSchedule::new(pair.expiry_rule).front_month_expiry(snapshot.date);
        snapshot = snapshot.with_expiry(expiry);
    }

    let metrics = BasisMetrics::from_snapshot(&snapshot);
    let risk_context = RiskContext::new(
        config.account.funding_cost_annual,
        snapshot.etf_discount_premium(),
    );
    let decision = SignalEngine::new(config.thresholds).evaluate(&metrics, &risk_context);
    let carry = net_return(
        metrics.basis_percent,
        metrics.days_to_expiry,
        config.account.funding_cost_annual,
        config.account.leverage,
    );
    let risk = assess_risk(&metrics, snapshot.etf_discount_premium(), config);

    //cost of entering now and holding to expiry at today's prices
    let sizing = PositionSizing::compute(
        &pair,
        &config.account,
        snapshot.spot_price,
        snapshot.etf_price,
    );
    let legs = TradeLegs::new(
        sizing.spot_value,
        pair.futures_notional(snapshot.futures_price, sizing.contracts),
        sizing.contracts,
    );
    let model = config.costs.model();
    let funding = config.account.funding_cost_annual;
    let costs = match sizing.etf_shares {
        Some(_) => model.round_trip_via_etf(&legs, &legs, metrics.days_to_expiry, funding),
        None => model.round_trip(&legs, &legs, metrics.days_to_expiry, funding),
    };
    let spot_leg = match sizing.etf_shares {
        Some(shares) => format!("{:.0} ETF shares (${:.2})", shares, sizing.spot_value),
        None => format!("{} {} (${:.2})", sizing.units, pair.unit, sizing.spot_value),
    };

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new(&format!("{} {}", pair_id.to_uppercase(), snapshot.date)),
        Cell::new("Value"),
    ]));

    let rows = [
        ("Spot", format!("${:.2}", snapshot.spot_price)),
        ("Futures", format!("${:.2}", snapshot.futures_price)),
        ("Expiry", snapshot.futures_expiry.to_string()),
        ("Days to Expiry", metrics.days_to_expiry.to_string()),
        (
            "Basis",
            format!("${:.2} ({:.3}%)", metrics.basis_absolute, metrics.basis_percent * 100.0),
        ),
        ("Monthly Basis", format!("{:.3}%", metrics.monthly_basis * 100.0)),
        ("Annualized Basis", format!("{:.2}%", metrics.annualized_basis * 100.0)),
        ("Net Annualized", format!("{:.2}%", carry.net_annualized * 100.0)),
        ("Leveraged Return", format!("{:.2}%", carry.leveraged_return * 100.0)),
        ("Contracts", format!("{} x {} {}", sizing.contracts, pair.contract_size, pair.unit)),
        ("Spot Leg", spot_leg),
        (
            "Spot Budget",
            format!(
                "${:.2}{}",
                sizing.spot_budget,
                if sizing.within_spot_budget() { "" } else { " (exceeded)" }
            ),
        ),
        ("Total Exposure", format!("${:.2}", sizing.total_exposure())),
        (
            "Delta Neutral",
            if sizing.is_delta_neutral() { "yes" } else { "no" }.to_string(),
        ),
        ("Est. Round Trip Cost", format!("${:.2}", costs.total_cost)),
        ("Est. Holding Cost", format!("${:.2}", costs.holding_cost())),
        ("Signal", decision.signal.to_string()),
        ("Reason", decision.reason.clone()),
    ];
    for (label, value) in rows {
        table.add_row(Row::new(vec![Cell::new(label), Cell::new(&value)]));
    }
    for factor in &risk.factors {
        table.add_row(Row::new(vec![
            Cell::new(&format!("Risk: {}", factor.name)),
            Cell::new(&format!("{} ({})", factor.level, factor.note)),
        ]));
    }
    table.add_row(Row::new(vec![
        Cell::new("Overall Risk"),
        Cell::new(&risk.overall.to_string()),
    ]));
    table.printstd();

    Ok(())
}

fn save_trades_csv(trades: &[&Trade], path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).context(format!("Failed to create {:?}", path))?;

    writer.write_record([
        "pair",
        "entry_date",
        "exit_date",
        "exit_reason",
        "entry_spot_price",
        "entry_futures_price",
        "exit_spot_price",
        "exit_futures_price",
        "spot_qty",
        "futures_qty",
        "entry_monthly_basis",
        "exit_monthly_basis",
        "holding_days",
        "gross_pnl",
        "commission",
        "funding_cost",
        "slippage_cost",
        "etf_expense",
        "total_cost",
        "net_pnl",
        "return_pct",
    ])?;

    for t in trades {
        writer.write_record([
            t.pair_id.clone(),
            t.entry_date.to_string(),
            t.exit_date.to_string(),
            t.exit_reason.to_string(),
            t.entry_spot_price.to_string(),
            t.entry_futures_price.to_string(),
            t.exit_spot_price.to_string(),
            t.exit_futures_price.to_string(),
            t.spot_qty.to_string(),
            t.futures_qty.to_string(),
            t.entry_monthly_basis.to_string(),
            t.exit_monthly_basis.to_string(),
            t.holding_days.to_string(),
            t.gross_pnl.to_string(),
            (t.costs.entry_commission + t.costs.exit_commission).to_string(),
            t.costs.funding_cost.to_string(),
            t.costs.slippage_cost.to_string(),
            t.costs.etf_expense.to_string(),
            t.total_cost.to_string(),
            t.net_pnl.to_string(),
            t.return_pct.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn save_equity_csv(runs: &IndexMap<String, BacktestRun>, path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).context(format!("Failed to create {:?}", path))?;
    writer.write_record(["pair", "date", "equity", "drawdown", "cumulative_return"])?;

    for (pair_id, run) in runs {
        for point in calculate_equity_curve(&run.trades, run.result.initial_capital) {
            writer.write_record([
                pair_id.clone(),
                point.date.to_string(),
                point.equity.to_string(),
                point.drawdown.to_string(),
                point.cumulative_return.to_string(),
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}
