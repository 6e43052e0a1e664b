//! Per-strategy row construction from merged quotes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Field, Omission, OmissionReason};
use crate::fetcher::MergedQuotes;
use crate::stocks::{Period, QuoteRecord};

/// Which screen to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Every priced symbol, equal notional each.
    #[default]
    EqualWeight,
    /// Top symbols by one-year price return.
    Momentum,
    /// Top symbols by mean return percentile over all tracked horizons.
    HighQualityMomentum,
}

impl Strategy {
    /// Return horizons a row of this strategy carries.
    pub fn periods(&self) -> &'static [Period] {
        match self {
            Strategy::EqualWeight => &[],
            Strategy::Momentum => &[Period::OneYear],
            Strategy::HighQualityMomentum => &Period::ALL,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::EqualWeight => write!(f, "equal-weight"),
            Strategy::Momentum => write!(f, "momentum"),
            Strategy::HighQualityMomentum => write!(f, "high-quality-momentum"),
        }
    }
}

/// One candidate purchase. Price is always finite and positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub symbol: String,
    pub price: f64,
    pub market_cap: Option<f64>,
    pub returns: BTreeMap<Period, f64>,
    /// Filled in by the percentile scorer; values in [0, 1].
    #[serde(default)]
    pub percentiles: BTreeMap<Period, f64>,
    #[serde(default)]
    pub composite_score: Option<f64>,
}

impl Row {
    pub fn new(symbol: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            market_cap: None,
            returns: BTreeMap::new(),
            percentiles: BTreeMap::new(),
            composite_score: None,
        }
    }

    pub fn with_return(mut self, period: Period, value: f64) -> Self {
        self.returns.insert(period, value);
        self
    }

    pub fn period_return(&self, period: Period) -> Option<f64> {
        self.returns.get(&period).copied()
    }

    pub fn percentile(&self, period: Period) -> Option<f64> {
        self.percentiles.get(&period).copied()
    }
}

/// Rows built for a strategy plus the symbols that could not be used.
#[derive(Debug, Clone, PartialEq)]
pub struct TableOutcome {
    pub rows: Vec<Row>,
    pub omissions: Vec<Omission>,
}

/// Build the strategy's rows in one pass, in universe order.
///
/// Symbols without a usable price are dropped and reported. The single-horizon
/// momentum screen also drops symbols without a one-year return; the
/// high-quality screen keeps whatever returns are present and leaves missing
/// horizons to the scorer.
pub fn build_rows(quotes: &MergedQuotes, strategy: Strategy) -> TableOutcome {
    let mut rows = Vec::with_capacity(quotes.len());
    let mut omissions = Vec::new();

    for (symbol, record) in quotes.iter() {
        match build_row(symbol, record, strategy) {
            Ok(row) => rows.push(row),
            Err(reason) => {
                warn!(%symbol, %reason, "dropping row");
                omissions.push(Omission::new(symbol, reason));
            }
        }
    }

    debug!(%strategy, rows = rows.len(), dropped = omissions.len(), "table built");
    TableOutcome { rows, omissions }
}

fn build_row(symbol: &str, record: &QuoteRecord, strategy: Strategy) -> Result<Row, OmissionReason> {
    let price = match record.price {
        None => return Err(OmissionReason::MissingField(Field::Price)),
        Some(p) if !p.is_finite() || p <= 0.0 => {
            return Err(OmissionReason::InvalidField(Field::Price))
        }
        Some(p) => p,
    };

    let mut row = Row::new(symbol, price);

    match strategy {
        Strategy::EqualWeight => {
            row.market_cap = record.market_cap.filter(|c| c.is_finite() && *c >= 0.0);
        }
        Strategy::Momentum => {
            let field = Field::Return(Period::OneYear);
            match record.period_return(Period::OneYear) {
                None => return Err(OmissionReason::MissingField(field)),
                Some(r) if !r.is_finite() => return Err(OmissionReason::InvalidField(field)),
                Some(r) => {
                    row.returns.insert(Period::OneYear, r);
                }
            }
        }
        Strategy::HighQualityMomentum => {
            row.returns = Period::ALL
                .iter()
                .filter_map(|p| record.period_return(*p).map(|r| (*p, r)))
                .filter(|(_, r)| r.is_finite())
                .collect();
        }
    }

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn merged(entries: Vec<(&str, QuoteRecord)>) -> MergedQuotes {
        let universe: Vec<String> = entries.iter().map(|(s, _)| s.to_string()).collect();
        let records: HashMap<String, QuoteRecord> = entries
            .into_iter()
            .map(|(s, r)| (s.to_string(), r))
            .collect();
        MergedQuotes::new(&universe, records)
    }

    fn record(price: Option<f64>, market_cap: Option<f64>, returns: &[(Period, f64)]) -> QuoteRecord {
        QuoteRecord {
            price,
            market_cap,
            returns: returns.iter().copied().collect(),
        }
    }

    #[test]
    fn equal_weight_keeps_price_and_market_cap() {
        let quotes = merged(vec![
            ("AAPL", record(Some(150.0), Some(2.5e12), &[])),
            ("NEG", record(Some(10.0), Some(-5.0), &[])),
        ]);
        let table = build_rows(&quotes, Strategy::EqualWeight);

        assert!(table.omissions.is_empty());
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].symbol, "AAPL");
        assert_eq!(table.rows[0].market_cap, Some(2.5e12));
        assert_eq!(table.rows[1].market_cap, None);
        assert!(table.rows[0].returns.is_empty());
    }

    #[test]
    fn unusable_prices_are_omitted_never_zeroed() {
        let quotes = merged(vec![
            ("NONE", record(None, Some(1.0), &[])),
            ("ZERO", record(Some(0.0), None, &[])),
            ("NAN", record(Some(f64::NAN), None, &[])),
            ("OK", record(Some(5.0), None, &[])),
        ]);
        let table = build_rows(&quotes, Strategy::EqualWeight);

        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].symbol, "OK");
        assert_eq!(
            table.omissions,
            vec![
                Omission::new("NONE", OmissionReason::MissingField(Field::Price)),
                Omission::new("ZERO", OmissionReason::InvalidField(Field::Price)),
                Omission::new("NAN", OmissionReason::InvalidField(Field::Price)),
            ]
        );
    }

    #[test]
    fn momentum_requires_one_year_return() {
        let quotes = merged(vec![
            ("A", record(Some(10.0), None, &[(Period::OneYear, 0.4), (Period::OneMonth, 0.1)])),
            ("B", record(Some(10.0), None, &[(Period::SixMonth, 0.2)])),
        ]);
        let table = build_rows(&quotes, Strategy::Momentum);

        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].period_return(Period::OneYear), Some(0.4));
        assert_eq!(table.rows[0].returns.len(), 1);
        assert_eq!(
            table.omissions,
            vec![Omission::new(
                "B",
                OmissionReason::MissingField(Field::Return(Period::OneYear))
            )]
        );
    }

    #[test]
    fn high_quality_momentum_keeps_available_returns() {
        let quotes = merged(vec![
            (
                "FULL",
                record(
                    Some(20.0),
                    None,
                    &[
                        (Period::OneYear, 0.5),
                        (Period::SixMonth, 0.3),
                        (Period::ThreeMonth, 0.1),
                        (Period::OneMonth, 0.02),
                    ],
                ),
            ),
            ("PART", record(Some(20.0), None, &[(Period::OneYear, 0.5), (Period::OneMonth, f64::INFINITY)])),
        ]);
        let table = build_rows(&quotes, Strategy::HighQualityMomentum);

        assert!(table.omissions.is_empty());
        assert_eq!(table.rows[0].returns.len(), 4);
        assert_eq!(table.rows[1].returns.len(), 1);
        assert_eq!(table.rows[1].period_return(Period::OneMonth), None);
    }

    #[test]
    fn strategy_periods() {
        assert!(Strategy::EqualWeight.periods().is_empty());
        assert_eq!(Strategy::Momentum.periods(), &[Period::OneYear]);
        assert_eq!(Strategy::HighQualityMomentum.periods().len(), 4);
    }
}
