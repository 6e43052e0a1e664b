use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use momentum_screener::config::ScreenerConfig;
use momentum_screener::export::NumberStyle;
use momentum_screener::portfolio::validate_capital;
use momentum_screener::{export, logging, pipeline, IexCloudProvider, RunReport, Strategy, Universe};

#[derive(Parser, Debug)]
#[command(name = "momentum-screener", version, about = "Screen a stock universe and size an equal-weight trade list")]
struct Cli {
    /// CSV file listing the candidate tickers
    #[arg(short, long, default_value = "sp_500_stocks.csv")]
    universe: PathBuf,

    /// Portfolio value to allocate; prompted for when omitted
    #[arg(short, long)]
    capital: Option<f64>,

    /// Screen to run (overrides the config file)
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Rows kept by the momentum screens (overrides the config file)
    #[arg(long)]
    top_n: Option<usize>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Trade list CSV path; defaults to a per-strategy file name
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the full run report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write plain decimals instead of $ and % formatted numbers
    #[arg(long)]
    raw_numbers: bool,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long, default_value = "pretty", value_parser = ["pretty", "json"])]
    log_format: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    EqualWeight,
    Momentum,
    Hqm,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::EqualWeight => Strategy::EqualWeight,
            StrategyArg::Momentum => Strategy::Momentum,
            StrategyArg::Hqm => Strategy::HighQualityMomentum,
        }
    }
}

fn default_output(strategy: Strategy) -> PathBuf {
    match strategy {
        Strategy::EqualWeight => "recommended_trades.csv",
        Strategy::Momentum => "momentum_strategy.csv",
        Strategy::HighQualityMomentum => "hqm_strategy.csv",
    }
    .into()
}

/// Ask on stdin until a positive number is entered.
fn prompt_capital() -> Result<f64> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("Enter the value of your portfolio: ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            bail!("no portfolio value entered");
        };
        match line?.trim().parse::<f64>() {
            Ok(value) if validate_capital(value).is_ok() => return Ok(value),
            _ => println!("That's not a positive number! Please try again."),
        }
    }
}

fn print_summary(report: &RunReport) {
    let summary = &report.summary;
    println!(
        "{} screen: {} of {} symbols selected",
        summary.strategy, summary.selected, summary.universe_size
    );
    for position in &report.plan.positions {
        println!(
            "  {:<8} {:>10.2}  x {}",
            position.row.symbol, position.row.price, position.shares_to_buy
        );
    }
    println!(
        "Total cost: {:.2}  Uninvested: {:.2}",
        summary.total_cost, summary.uninvested
    );
    if !report.omissions.is_empty() {
        println!("{} symbols omitted:", report.omissions.len());
        for omission in &report.omissions {
            println!("  {omission}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level, &cli.log_format);

    let mut config = match &cli.config {
        Some(path) => ScreenerConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ScreenerConfig::default(),
    };
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy.into();
    }
    if let Some(top_n) = cli.top_n {
        config.top_n = top_n;
    }
    config.validate()?;

    let universe = Universe::from_csv_path(&cli.universe)?;
    let token = std::env::var(&config.provider.token_env)
        .with_context(|| format!("{} is not set", config.provider.token_env))?;

    let capital = match cli.capital {
        Some(capital) => capital,
        None => prompt_capital()?,
    };

    let provider = IexCloudProvider::new(config.provider.base_url.clone(), token, config.timeout())?;
    let report = pipeline::run(&universe, capital, &provider, &config).await?;

    let output = cli.output.unwrap_or_else(|| default_output(config.strategy));
    let style = if cli.raw_numbers {
        NumberStyle::Raw
    } else {
        NumberStyle::Formatted
    };
    export::write_csv(&output, &report, style)
        .with_context(|| format!("writing {}", output.display()))?;
    if let Some(path) = &cli.json {
        export::write_json(path, &report)?;
    }

    if report.summary.uninvested > report.plan.allocation_per_position {
        warn!(
            uninvested = %format!("{:.2}", report.summary.uninvested),
            "more than one position's worth of capital left uninvested"
        );
    }
    info!(path = %output.display(), "done");
    print_summary(&report);
    Ok(())
}
