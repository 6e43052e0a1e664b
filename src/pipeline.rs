//! End-to-end screening run.
//!
//! `run` validates inputs, fetches the universe and hands the merged quotes to
//! `plan_from_quotes`, which is pure and can be replayed on the same data.
//! Portfolio capital is always an explicit argument.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::ScreenerConfig;
use crate::error::{Omission, ScreenerError, ValidationError};
use crate::fetcher::{fetch_all, FetchOutcome};
use crate::portfolio::{size_positions, validate_capital, PortfolioPlan};
use crate::scoring::score_percentiles;
use crate::selector::{select_top, SortKey};
use crate::stocks::{Period, QuoteProvider};
use crate::table::{build_rows, Strategy};
use crate::universe::Universe;

/// Counts and totals describing a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub strategy: Strategy,
    pub universe_size: usize,
    pub chunks: usize,
    /// Symbols the provider returned data for.
    pub fetched: usize,
    /// Rows that entered ranking (or sizing, for equal weight).
    pub scored: usize,
    pub selected: usize,
    pub omitted: usize,
    pub total_cost: f64,
    pub uninvested: f64,
    pub generated_at: DateTime<Utc>,
}

/// Everything a run produces: the plan, what was dropped and why, and a summary.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub plan: PortfolioPlan,
    pub omissions: Vec<Omission>,
    pub summary: RunSummary,
}

/// Fetch `universe` through `provider` and build the trade plan.
pub async fn run(
    universe: &Universe,
    capital: f64,
    provider: &dyn QuoteProvider,
    config: &ScreenerConfig,
) -> Result<RunReport, ScreenerError> {
    validate_capital(capital)?;
    config
        .validate()
        .map_err(|e| ValidationError::InvalidConfig(e.to_string()))?;

    info!(
        strategy = %config.strategy,
        symbols = universe.len(),
        capital,
        "starting screen"
    );

    let fetched = fetch_all(
        universe.symbols(),
        config.fetch.chunk_size,
        provider,
        &config.fetch_options(),
    )
    .await?;

    plan_from_quotes(fetched, capital, config)
}

/// Build, score, select and size from already fetched quotes.
pub fn plan_from_quotes(
    fetched: FetchOutcome,
    capital: f64,
    config: &ScreenerConfig,
) -> Result<RunReport, ScreenerError> {
    validate_capital(capital)?;
    let strategy = config.strategy;
    let universe_size = fetched.quotes.len() + fetched.omissions.len();
    let mut omissions = fetched.omissions;

    let table = build_rows(&fetched.quotes, strategy);
    omissions.extend(table.omissions);

    let (scored, candidates) = match strategy {
        Strategy::EqualWeight => (table.rows.len(), table.rows),
        Strategy::Momentum => {
            let scored = table.rows.len();
            let top = select_top(table.rows, SortKey::Return(Period::OneYear), config.top_n)?;
            (scored, top)
        }
        Strategy::HighQualityMomentum => {
            let outcome = score_percentiles(table.rows, strategy.periods(), config.scoring);
            omissions.extend(outcome.omissions);
            let scored = outcome.rows.len();
            let top = select_top(outcome.rows, SortKey::CompositeScore, config.top_n)?;
            (scored, top)
        }
    };

    let plan = size_positions(candidates, capital)?;

    let summary = RunSummary {
        strategy,
        universe_size,
        chunks: fetched.chunks,
        fetched: fetched.quotes.len(),
        scored,
        selected: plan.len(),
        omitted: omissions.len(),
        total_cost: plan.total_cost(),
        uninvested: plan.uninvested(),
        generated_at: Utc::now(),
    };

    if !omissions.is_empty() {
        info!(omitted = omissions.len(), "some symbols were left out; see report");
    }
    info!(
        selected = summary.selected,
        scored = summary.scored,
        total_cost = %format!("{:.2}", summary.total_cost),
        "screen complete"
    );

    Ok(RunReport {
        plan,
        omissions,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OmissionReason;
    use crate::fetcher::MergedQuotes;
    use crate::stocks::QuoteRecord;
    use std::collections::HashMap;

    fn quote(price: f64, one_year: f64) -> QuoteRecord {
        let mut record = QuoteRecord {
            price: Some(price),
            market_cap: Some(price * 1e6),
            ..Default::default()
        };
        record.returns.insert(Period::OneYear, one_year);
        record
    }

    fn outcome(universe: &[&str], records: Vec<(&str, QuoteRecord)>) -> FetchOutcome {
        let universe: Vec<String> = universe.iter().map(|s| s.to_string()).collect();
        let present: HashMap<String, QuoteRecord> = records
            .into_iter()
            .map(|(s, r)| (s.to_string(), r))
            .collect();
        let omissions = universe
            .iter()
            .filter(|s| !present.contains_key(s.as_str()))
            .map(|s| Omission::new(s.as_str(), OmissionReason::NoData))
            .collect();
        FetchOutcome {
            quotes: MergedQuotes::new(&universe, present),
            omissions,
            chunks: 1,
        }
    }

    fn config(strategy: Strategy, top_n: usize) -> ScreenerConfig {
        ScreenerConfig {
            strategy,
            top_n,
            ..Default::default()
        }
    }

    #[test]
    fn equal_weight_sizes_every_row() {
        let fetched = outcome(
            &["A", "B", "C"],
            vec![("A", quote(50.0, 0.1)), ("B", quote(200.0, 0.2))],
        );
        let report = plan_from_quotes(fetched, 10_000.0, &config(Strategy::EqualWeight, 50)).unwrap();

        let shares: Vec<u64> = report.plan.positions.iter().map(|p| p.shares_to_buy).collect();
        assert_eq!(shares, vec![100, 25]);
        assert_eq!(report.summary.universe_size, 3);
        assert_eq!(report.summary.fetched, 2);
        assert_eq!(report.summary.omitted, 1);
        assert_eq!(report.omissions[0].symbol, "C");
        assert_eq!(report.summary.total_cost, 10_000.0);
    }

    #[test]
    fn momentum_keeps_top_n_by_one_year_return() {
        let fetched = outcome(
            &["A", "B", "C"],
            vec![
                ("A", quote(10.0, 0.1)),
                ("B", quote(10.0, 0.9)),
                ("C", quote(10.0, 0.5)),
            ],
        );
        let report = plan_from_quotes(fetched, 1_000.0, &config(Strategy::Momentum, 2)).unwrap();
        let symbols: Vec<&str> = report.plan.positions.iter().map(|p| p.row.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["B", "C"]);
        assert_eq!(report.summary.scored, 3);
        assert_eq!(report.summary.selected, 2);
    }

    #[test]
    fn hqm_drops_rows_missing_periods_by_default() {
        let mut full = quote(20.0, 0.4);
        for p in [Period::SixMonth, Period::ThreeMonth, Period::OneMonth] {
            full.returns.insert(p, 0.1);
        }
        let fetched = outcome(&["FULL", "PART"], vec![("FULL", full), ("PART", quote(20.0, 0.9))]);
        let report =
            plan_from_quotes(fetched, 1_000.0, &config(Strategy::HighQualityMomentum, 50)).unwrap();

        assert_eq!(report.plan.len(), 1);
        assert_eq!(report.plan.positions[0].row.symbol, "FULL");
        assert!(matches!(
            report.omissions[0].reason,
            OmissionReason::MissingPeriods(_)
        ));
    }

    #[test]
    fn nothing_usable_is_an_error() {
        let fetched = outcome(&["A"], vec![]);
        let err = plan_from_quotes(fetched, 1_000.0, &config(Strategy::EqualWeight, 50)).unwrap_err();
        assert!(matches!(err, ScreenerError::EmptyRowSet));
    }

    #[test]
    fn bad_capital_is_rejected() {
        let fetched = outcome(&["A"], vec![("A", quote(10.0, 0.1))]);
        let err = plan_from_quotes(fetched, 0.0, &config(Strategy::EqualWeight, 50)).unwrap_err();
        assert!(matches!(
            err,
            ScreenerError::InputValidation(ValidationError::InvalidCapital(_))
        ));
    }

    #[test]
    fn invalid_config_message_names_the_field() {
        let mut cfg = config(Strategy::EqualWeight, 50);
        cfg.fetch.chunk_size = 250;
        let err = cfg
            .validate()
            .map_err(|e| ValidationError::InvalidConfig(e.to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("fetch.chunk_size"));
    }

    #[test]
    fn report_serializes_with_summary() {
        let fetched = outcome(&["A"], vec![("A", quote(10.0, 0.1))]);
        let report = plan_from_quotes(fetched, 100.0, &config(Strategy::EqualWeight, 50)).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["summary"]["strategy"], "equal_weight");
        assert_eq!(json["plan"]["positions"][0]["symbol"], "A");
        assert_eq!(json["plan"]["positions"][0]["shares_to_buy"], 10);
    }
}
