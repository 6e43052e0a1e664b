//! Trade-list export: CSV for spreadsheets, JSON for the full run report.
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! failed write never leaves a truncated output behind.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::pipeline::RunReport;
use crate::portfolio::{PortfolioPlan, Position};
use crate::stocks::Period;
use crate::table::Strategy;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to flush CSV writer: {0}")]
    Flush(String),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Column headers for a strategy's trade list.
pub fn headers(strategy: Strategy) -> Vec<String> {
    let mut cols = vec!["Ticker".to_string(), "Price".to_string()];
    match strategy {
        Strategy::EqualWeight => {
            cols.push("Market Capitalization".into());
            cols.push("Number of Shares to Buy".into());
        }
        Strategy::Momentum => {
            cols.push("One-Year Price Return".into());
            cols.push("Number of Shares to Buy".into());
        }
        Strategy::HighQualityMomentum => {
            cols.push("Number of Shares to Buy".into());
            for period in Period::ALL {
                cols.push(format!("{} Price Return", period.label()));
                cols.push(format!("{} Return Percentile", period.label()));
            }
            cols.push("HQM Score".into());
        }
    }
    cols
}

/// How numbers are rendered in the CSV trade list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberStyle {
    /// Dollar amounts as `$0.00`, returns and percentiles as `0.0%`.
    #[default]
    Formatted,
    /// Plain decimals: two places for amounts, six for fractions.
    Raw,
}

impl NumberStyle {
    fn dollars(self, value: f64) -> String {
        match self {
            NumberStyle::Formatted => format!("${value:.2}"),
            NumberStyle::Raw => format!("{value:.2}"),
        }
    }

    fn fraction(self, value: f64) -> String {
        match self {
            NumberStyle::Formatted => format!("{:.1}%", value * 100.0),
            NumberStyle::Raw => format!("{value:.6}"),
        }
    }
}

fn record(position: &Position, strategy: Strategy, style: NumberStyle) -> Vec<String> {
    let row = &position.row;
    let dollars = |v: Option<f64>| v.map(|v| style.dollars(v)).unwrap_or_default();
    let fraction = |v: Option<f64>| v.map(|v| style.fraction(v)).unwrap_or_default();

    let shares = position.shares_to_buy.to_string();
    let mut cells = vec![row.symbol.clone(), style.dollars(row.price)];
    match strategy {
        Strategy::EqualWeight => {
            cells.push(dollars(row.market_cap));
            cells.push(shares);
        }
        Strategy::Momentum => {
            cells.push(fraction(row.period_return(Period::OneYear)));
            cells.push(shares);
        }
        Strategy::HighQualityMomentum => {
            cells.push(shares);
            for period in Period::ALL {
                cells.push(fraction(row.period_return(period)));
                cells.push(fraction(row.percentile(period)));
            }
            cells.push(fraction(row.composite_score));
        }
    }
    cells
}

/// Render the plan as CSV text.
pub fn plan_to_csv(
    plan: &PortfolioPlan,
    strategy: Strategy,
    style: NumberStyle,
) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(headers(strategy))?;
    for position in &plan.positions {
        wtr.write_record(record(position, strategy, style))?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| ExportError::Flush(e.to_string()))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// Write the report's trade list as CSV.
pub fn write_csv(path: &Path, report: &RunReport, style: NumberStyle) -> Result<(), ExportError> {
    let text = plan_to_csv(&report.plan, report.summary.strategy, style)?;
    write_atomically(path, text.as_bytes())?;
    info!(path = %path.display(), rows = report.plan.len(), "trade list written");
    Ok(())
}

/// Write the full report as pretty JSON.
pub fn write_json(path: &Path, report: &RunReport) -> Result<(), ExportError> {
    let text = serde_json::to_string_pretty(report)?;
    write_atomically(path, text.as_bytes())?;
    info!(path = %path.display(), "run report written");
    Ok(())
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)
}
